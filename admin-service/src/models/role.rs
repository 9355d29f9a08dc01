//! Role and permission models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Tenant-scoped role. System roles cannot be modified or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Role {
    pub id: Uuid,
    pub tenant_id: Uuid,
    #[schema(example = "admin")]
    pub name: String,
    pub description: String,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    pub fn new(tenant_id: Uuid, name: String, description: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name,
            description,
            is_system: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn system(mut self) -> Self {
        self.is_system = true;
        self
    }
}

/// Global `(resource, action)` grant.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Permission {
    pub id: Uuid,
    #[schema(example = "users.read")]
    pub name: String,
    #[schema(example = "users")]
    pub resource: String,
    #[schema(example = "read")]
    pub action: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Permission {
    pub fn new(resource: &str, action: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: format!("{}.{}", resource, action),
            resource: resource.to_string(),
            action: action.to_string(),
            description: String::new(),
            created_at: Utc::now(),
        }
    }

    /// Cache key form, `resource:action`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.resource, self.action)
    }
}

/// Role together with its permissions.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoleWithPermissions {
    #[serde(flatten)]
    pub role: Role,
    pub permissions: Vec<Permission>,
}
