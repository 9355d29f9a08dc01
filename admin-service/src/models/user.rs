//! User model - tenant-scoped back-office accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Account status. Only `Active` users may log in or refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
    Suspended,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
            UserStatus::Suspended => "suspended",
        }
    }

    pub fn all() -> [UserStatus; 3] {
        [UserStatus::Active, UserStatus::Inactive, UserStatus::Suspended]
    }
}

impl std::str::FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(UserStatus::Active),
            "inactive" => Ok(UserStatus::Inactive),
            "suspended" => Ok(UserStatus::Suspended),
            _ => Err(format!("Invalid user status: {}", s)),
        }
    }
}

/// User entity.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub status: String,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new active user. The email is stored lowercased.
    pub fn new(
        tenant_id: Uuid,
        email: &str,
        password_hash: String,
        first_name: String,
        last_name: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            email: normalize_email(email),
            password_hash,
            first_name,
            last_name,
            status: UserStatus::Active.as_str().to_string(),
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: UserStatus) -> Self {
        self.status = status.as_str().to_string();
        self
    }

    /// Unknown status strings are treated as not active.
    pub fn status(&self) -> Option<UserStatus> {
        self.status.parse().ok()
    }

    pub fn is_active(&self) -> bool {
        self.status() == Some(UserStatus::Active)
    }
}

/// Lowercase and trim an email address for lookups and storage.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// User as returned by the API (no password hash).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub tenant_id: Uuid,
    #[schema(example = "admin@example.com")]
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[schema(example = "active")]
    pub status: String,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            tenant_id: u.tenant_id,
            email: u.email,
            first_name: u.first_name,
            last_name: u.last_name,
            status: u.status,
            last_login_at: u.last_login_at,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_is_active_with_normalized_email() {
        let user = User::new(
            Uuid::new_v4(),
            "  Admin@Example.COM ",
            "hash".to_string(),
            "Ada".to_string(),
            "Lovelace".to_string(),
        );
        assert_eq!(user.email, "admin@example.com");
        assert!(user.is_active());
    }

    #[test]
    fn unknown_status_is_not_active() {
        let mut user = User::new(
            Uuid::new_v4(),
            "a@b.c",
            "hash".to_string(),
            "A".to_string(),
            "B".to_string(),
        );
        user.status = "pending".to_string();
        assert!(!user.is_active());
        assert!(!user.clone().with_status(UserStatus::Suspended).is_active());
    }
}
