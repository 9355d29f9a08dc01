use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::AppState;

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Store unreachable")
    ),
    tag = "Observability"
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let (status, store) = match &state.db {
        Some(db) => match db.health_check().await {
            Ok(()) => (StatusCode::OK, "up"),
            Err(e) => {
                tracing::error!(error = %e, "PostgreSQL health check failed");
                (StatusCode::SERVICE_UNAVAILABLE, "down")
            }
        },
        None => (StatusCode::OK, "memory"),
    };

    let body = json!({
        "status": if status == StatusCode::OK { "healthy" } else { "unhealthy" },
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "store": store
        }
    });
    (status, Json(body))
}
