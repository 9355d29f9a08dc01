pub mod admin;
pub mod auth;

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Body of every error response (see `service_core::error::AppError`).
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "Invalid email or password")]
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    #[schema(example = "Logged out successfully")]
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Query string accepted by every paginated listing.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    #[param(example = 1)]
    pub page: Option<i64>,
    #[param(example = 20)]
    pub per_page: Option<i64>,
    pub search: Option<String>,
    /// Users only.
    pub status: Option<String>,
    /// Audit logs only.
    pub action: Option<String>,
    /// Audit logs only.
    pub resource: Option<String>,
}

impl ListQuery {
    pub fn to_list_params(self, tenant_id: uuid::Uuid) -> crate::models::ListParams {
        crate::models::ListParams::new(tenant_id, self.page, self.per_page)
            .search(self.search)
            .status(self.status)
            .action(self.action)
            .resource(self.resource)
    }
}
