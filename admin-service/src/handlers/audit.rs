use axum::{
    extract::{Query, State},
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::ListQuery,
    middleware::CurrentActor,
    models::{AuditLog, Paginated},
    AppState,
};

/// Audit trail of the caller's tenant, newest first
#[utoipa::path(
    get,
    path = "/api/v1/audit-logs",
    params(ListQuery),
    responses(
        (status = 200, description = "Paginated audit log"),
        (status = 403, description = "Missing audit_logs:read", body = ErrorResponse)
    ),
    tag = "Audit",
    security(("bearer_auth" = []))
)]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paginated<AuditLog>>, AppError> {
    let params = query.to_list_params(actor.tenant_id);
    Ok(Json(state.audit.list(&params).await?))
}
