use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::{dtos::admin::DashboardStats, middleware::CurrentActor, AppState};

#[utoipa::path(
    get,
    path = "/api/v1/dashboard/stats",
    responses(
        (status = 200, description = "Tenant statistics", body = DashboardStats),
        (status = 403, description = "Missing dashboard:read", body = ErrorResponse)
    ),
    tag = "Dashboard",
    security(("bearer_auth" = []))
)]
pub async fn stats(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<DashboardStats>, AppError> {
    Ok(Json(state.dashboard.stats(actor.tenant_id).await?))
}
