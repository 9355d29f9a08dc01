//! Storage seams.
//!
//! Every collaborator the services need from the data layer is an
//! `async_trait` here, implemented by [`Database`] (PostgreSQL) and
//! [`MemoryStore`] (in-process, used by tests and local runs).

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::Database;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{AuditLog, FeatureFlag, ListParams, Permission, Role, Session, SessionRotation, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unique constraint violated: {0}")]
    Conflict(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Run a store call under `limit`. Elapsed calls fail with [`StoreError::Timeout`].
pub async fn bounded<T, F>(limit: Duration, call: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| StoreError::Timeout(limit))?
}

/// User persistence.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Lookup across tenants; emails are globally unique and stored lowercased.
    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn get_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn update_last_login(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;
    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> StoreResult<()>;
    async fn create_user(&self, user: &User) -> StoreResult<()>;
    async fn update_user(&self, user: &User) -> StoreResult<()>;
    async fn delete_user(&self, id: Uuid) -> StoreResult<bool>;
    async fn list_users(&self, params: &ListParams) -> StoreResult<(Vec<User>, i64)>;
    async fn count_users_by_status(&self, tenant_id: Uuid) -> StoreResult<HashMap<String, i64>>;
}

/// Role, permission and assignment persistence.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Distinct union of permissions over every role assigned to the user.
    async fn get_user_permissions(&self, user_id: Uuid) -> StoreResult<Vec<Permission>>;
    async fn get_user_roles(&self, user_id: Uuid) -> StoreResult<Vec<Role>>;
    /// Replace the user's role set.
    async fn set_user_roles(&self, user_id: Uuid, role_ids: &[Uuid]) -> StoreResult<()>;
    async fn users_with_role(&self, role_id: Uuid) -> StoreResult<Vec<Uuid>>;
    async fn create_role(&self, role: &Role) -> StoreResult<()>;
    async fn get_role(&self, id: Uuid) -> StoreResult<Option<Role>>;
    async fn get_role_by_name(&self, tenant_id: Uuid, name: &str) -> StoreResult<Option<Role>>;
    async fn update_role(&self, role: &Role) -> StoreResult<()>;
    async fn delete_role(&self, id: Uuid) -> StoreResult<()>;
    async fn list_roles(&self, params: &ListParams) -> StoreResult<(Vec<Role>, i64)>;
    async fn count_roles(&self, tenant_id: Uuid) -> StoreResult<i64>;
    async fn get_role_permissions(&self, role_id: Uuid) -> StoreResult<Vec<Permission>>;
    /// Replace the role's permission set.
    async fn set_role_permissions(&self, role_id: Uuid, permission_ids: &[Uuid]) -> StoreResult<()>;
    async fn list_permissions(&self) -> StoreResult<Vec<Permission>>;
}

/// Refresh session persistence, keyed by token digest.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, session: &Session) -> StoreResult<()>;
    async fn get_session_by_token(&self, token_hash: &str) -> StoreResult<Option<Session>>;
    /// Atomically retire the current row and insert its successor.
    /// Returns `false` when the current row was already rotated or revoked.
    async fn rotate_session(&self, rotation: &SessionRotation) -> StoreResult<bool>;
    async fn revoke_session(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;
    async fn revoke_user_sessions(&self, user_id: Uuid, at: DateTime<Utc>) -> StoreResult<u64>;
    async fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

/// Append-only audit sink.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn log_audit_event(&self, entry: &AuditLog) -> StoreResult<()>;
    async fn list_audit_logs(&self, params: &ListParams) -> StoreResult<(Vec<AuditLog>, i64)>;
    async fn count_recent_logins(&self, tenant_id: Uuid, since: DateTime<Utc>) -> StoreResult<i64>;
    async fn recent_activity(&self, tenant_id: Uuid, limit: i64) -> StoreResult<Vec<AuditLog>>;
}

#[async_trait]
pub trait FeatureFlagStore: Send + Sync {
    async fn list_flags(&self, tenant_id: Uuid) -> StoreResult<Vec<FeatureFlag>>;
    async fn get_flag(&self, id: Uuid) -> StoreResult<Option<FeatureFlag>>;
    async fn get_flag_by_key(&self, tenant_id: Uuid, key: &str) -> StoreResult<Option<FeatureFlag>>;
    async fn create_flag(&self, flag: &FeatureFlag) -> StoreResult<()>;
    async fn update_flag(&self, flag: &FeatureFlag) -> StoreResult<()>;
    async fn delete_flag(&self, id: Uuid) -> StoreResult<()>;
}

/// Handles to every store, shared by the services.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub roles: Arc<dyn RoleStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub audit: Arc<dyn AuditStore>,
    pub flags: Arc<dyn FeatureFlagStore>,
}

impl Stores {
    pub fn postgres(db: Database) -> Self {
        let db = Arc::new(db);
        Self {
            users: db.clone(),
            roles: db.clone(),
            sessions: db.clone(),
            audit: db.clone(),
            flags: db,
        }
    }

    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            users: store.clone(),
            roles: store.clone(),
            sessions: store.clone(),
            audit: store.clone(),
            flags: store,
        }
    }
}
