use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{
    dtos::{
        admin::{CreateFeatureFlagRequest, UpdateFeatureFlagRequest},
        MessageResponse,
    },
    middleware::CurrentActor,
    models::FeatureFlag,
    utils::ValidatedJson,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/v1/feature-flags",
    responses((status = 200, description = "Feature flags of the tenant", body = [FeatureFlag])),
    tag = "Feature Flags",
    security(("bearer_auth" = []))
)]
pub async fn list_flags(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<FeatureFlag>>, AppError> {
    Ok(Json(state.flags.list(actor.tenant_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/feature-flags",
    request_body = CreateFeatureFlagRequest,
    responses(
        (status = 201, description = "Feature flag created", body = FeatureFlag),
        (status = 409, description = "Key already exists", body = ErrorResponse)
    ),
    tag = "Feature Flags",
    security(("bearer_auth" = []))
)]
pub async fn create_flag(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ValidatedJson(req): ValidatedJson<CreateFeatureFlagRequest>,
) -> Result<(StatusCode, Json<FeatureFlag>), AppError> {
    let flag = state.flags.create(&actor, req).await?;
    Ok((StatusCode::CREATED, Json(flag)))
}

#[utoipa::path(
    get,
    path = "/api/v1/feature-flags/{id}",
    params(("id" = Uuid, Path, description = "Feature flag id")),
    responses(
        (status = 200, description = "Feature flag", body = FeatureFlag),
        (status = 404, description = "Feature flag not found", body = ErrorResponse)
    ),
    tag = "Feature Flags",
    security(("bearer_auth" = []))
)]
pub async fn get_flag(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<Json<FeatureFlag>, AppError> {
    Ok(Json(state.flags.get(actor.tenant_id, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/feature-flags/{id}",
    params(("id" = Uuid, Path, description = "Feature flag id")),
    request_body = UpdateFeatureFlagRequest,
    responses(
        (status = 200, description = "Feature flag updated", body = FeatureFlag),
        (status = 404, description = "Feature flag not found", body = ErrorResponse)
    ),
    tag = "Feature Flags",
    security(("bearer_auth" = []))
)]
pub async fn update_flag(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateFeatureFlagRequest>,
) -> Result<Json<FeatureFlag>, AppError> {
    Ok(Json(state.flags.update(&actor, id, req).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/feature-flags/{id}",
    params(("id" = Uuid, Path, description = "Feature flag id")),
    responses(
        (status = 200, description = "Feature flag deleted", body = MessageResponse),
        (status = 404, description = "Feature flag not found", body = ErrorResponse)
    ),
    tag = "Feature Flags",
    security(("bearer_auth" = []))
)]
pub async fn delete_flag(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    state.flags.delete(&actor, id).await?;
    Ok(Json(MessageResponse::new("Feature flag deleted successfully")))
}

/// Flip the enabled bit
#[utoipa::path(
    post,
    path = "/api/v1/feature-flags/{id}/toggle",
    params(("id" = Uuid, Path, description = "Feature flag id")),
    responses(
        (status = 200, description = "Feature flag toggled", body = FeatureFlag),
        (status = 404, description = "Feature flag not found", body = ErrorResponse)
    ),
    tag = "Feature Flags",
    security(("bearer_auth" = []))
)]
pub async fn toggle_flag(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<Json<FeatureFlag>, AppError> {
    Ok(Json(state.flags.toggle(&actor, id).await?))
}
