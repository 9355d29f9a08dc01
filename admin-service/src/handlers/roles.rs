use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{
    dtos::{
        admin::{CreateRoleRequest, UpdateRoleRequest},
        ListQuery, MessageResponse,
    },
    middleware::CurrentActor,
    models::{Paginated, Permission, Role, RoleWithPermissions},
    utils::ValidatedJson,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/v1/roles",
    params(ListQuery),
    responses((status = 200, description = "Paginated roles")),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
pub async fn list_roles(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paginated<Role>>, AppError> {
    let params = query.to_list_params(actor.tenant_id);
    Ok(Json(state.roles.list(&params).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/roles",
    request_body = CreateRoleRequest,
    responses(
        (status = 201, description = "Role created", body = RoleWithPermissions),
        (status = 409, description = "Role name already exists", body = ErrorResponse)
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
pub async fn create_role(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ValidatedJson(req): ValidatedJson<CreateRoleRequest>,
) -> Result<(StatusCode, Json<RoleWithPermissions>), AppError> {
    let role = state.roles.create(&actor, req).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

#[utoipa::path(
    get,
    path = "/api/v1/roles/{id}",
    params(("id" = Uuid, Path, description = "Role id")),
    responses(
        (status = 200, description = "Role with its permissions", body = RoleWithPermissions),
        (status = 404, description = "Role not found", body = ErrorResponse)
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
pub async fn get_role(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<Json<RoleWithPermissions>, AppError> {
    Ok(Json(state.roles.get(actor.tenant_id, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/roles/{id}",
    params(("id" = Uuid, Path, description = "Role id")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = RoleWithPermissions),
        (status = 403, description = "System role", body = ErrorResponse),
        (status = 409, description = "Role name already exists", body = ErrorResponse)
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
pub async fn update_role(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateRoleRequest>,
) -> Result<Json<RoleWithPermissions>, AppError> {
    Ok(Json(state.roles.update(&actor, id, req).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/roles/{id}",
    params(("id" = Uuid, Path, description = "Role id")),
    responses(
        (status = 200, description = "Role deleted", body = MessageResponse),
        (status = 403, description = "System role", body = ErrorResponse),
        (status = 404, description = "Role not found", body = ErrorResponse)
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
pub async fn delete_role(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    state.roles.delete(&actor, id).await?;
    Ok(Json(MessageResponse::new("Role deleted successfully")))
}

#[utoipa::path(
    get,
    path = "/api/v1/roles/{id}/permissions",
    params(("id" = Uuid, Path, description = "Role id")),
    responses((status = 200, description = "Permissions of the role", body = [Permission])),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
pub async fn get_role_permissions(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Permission>>, AppError> {
    Ok(Json(state.roles.permissions_of(actor.tenant_id, id).await?))
}

/// Every global permission
#[utoipa::path(
    get,
    path = "/api/v1/permissions",
    responses((status = 200, description = "All permissions", body = [Permission])),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
pub async fn list_permissions(
    State(state): State<AppState>,
) -> Result<Json<Vec<Permission>>, AppError> {
    Ok(Json(state.roles.all_permissions().await?))
}
