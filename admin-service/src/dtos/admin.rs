//! Request and response bodies of the management API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::UserStatus;

// ==================== Users ====================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "new.user@example.com")]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(example = "password123", min_length = 8)]
    pub password: String,

    #[validate(length(min = 1, max = 100))]
    #[schema(example = "Jane")]
    pub first_name: String,

    #[validate(length(min = 1, max = 100))]
    #[schema(example = "Doe")]
    pub last_name: String,

    #[serde(default)]
    pub role_ids: Vec<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,

    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,

    pub status: Option<UserStatus>,

    /// Replaces the user's roles when present.
    pub role_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(min_length = 8)]
    pub new_password: String,
}

// ==================== Roles ====================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateRoleRequest {
    #[validate(length(min = 1, max = 100))]
    #[schema(example = "support")]
    pub name: String,

    #[validate(length(max = 500))]
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub permission_ids: Vec<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateRoleRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,

    #[validate(length(max = 500))]
    pub description: Option<String>,

    /// Replaces the role's permissions when present.
    pub permission_ids: Option<Vec<Uuid>>,
}

// ==================== Feature flags ====================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateFeatureFlagRequest {
    #[validate(length(min = 1, max = 100))]
    #[schema(example = "new_dashboard")]
    pub key: String,

    #[validate(length(min = 1, max = 255))]
    #[schema(example = "New dashboard")]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub enabled: bool,

    #[schema(value_type = Object, nullable)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateFeatureFlagRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub enabled: bool,

    #[schema(value_type = Object, nullable)]
    pub metadata: Option<serde_json::Value>,
}

// ==================== Dashboard ====================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ActivityItem {
    pub action: String,
    pub resource: String,
    pub user_email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DashboardStats {
    pub total_users: i64,
    pub active_users: i64,
    pub total_roles: i64,
    /// Logins over the last 24 hours.
    pub recent_logins: i64,
    pub users_by_status: HashMap<String, i64>,
    pub recent_activity: Vec<ActivityItem>,
}
