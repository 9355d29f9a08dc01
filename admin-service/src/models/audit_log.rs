//! Audit log model - append-only record of security relevant actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::ClientInfo;

/// Audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Login,
    Logout,
    RefreshTokenReuse,
    Create,
    Update,
    Delete,
    Toggle,
    ResetPassword,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Login => "login",
            AuditAction::Logout => "logout",
            AuditAction::RefreshTokenReuse => "refresh_token_reuse",
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
            AuditAction::Toggle => "toggle",
            AuditAction::ResetPassword => "reset_password",
        }
    }
}

/// Audit log entry. Never mutated once written.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AuditLog {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Option<Uuid>,
    #[schema(example = "login")]
    pub action: String,
    #[schema(example = "auth")]
    pub resource: String,
    pub resource_id: Option<Uuid>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub ip_address: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
}

impl AuditLog {
    pub fn new(tenant_id: Uuid, user_id: Option<Uuid>, action: AuditAction, resource: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            user_id,
            action: action.as_str().to_string(),
            resource: resource.to_string(),
            resource_id: None,
            old_value: None,
            new_value: None,
            ip_address: String::new(),
            user_agent: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn resource_id(mut self, id: Uuid) -> Self {
        self.resource_id = Some(id);
        self
    }

    pub fn client(mut self, client: &ClientInfo) -> Self {
        self.ip_address = client.ip_address.clone();
        self.user_agent = client.user_agent.clone();
        self
    }

    pub fn values(mut self, old_value: Option<String>, new_value: Option<String>) -> Self {
        self.old_value = old_value;
        self.new_value = new_value;
        self
    }
}
