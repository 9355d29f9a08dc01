//! Feature flag model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Tenant-scoped feature flag. `key` is unique within a tenant.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct FeatureFlag {
    pub id: Uuid,
    pub tenant_id: Uuid,
    #[schema(example = "new_dashboard")]
    pub key: String,
    pub name: String,
    pub description: String,
    pub enabled: bool,
    #[schema(value_type = Object)]
    pub metadata: sqlx::types::Json<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FeatureFlag {
    pub fn new(
        tenant_id: Uuid,
        key: String,
        name: String,
        description: String,
        enabled: bool,
        metadata: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            key,
            name,
            description,
            enabled,
            metadata: sqlx::types::Json(metadata),
            created_at: now,
            updated_at: now,
        }
    }
}
