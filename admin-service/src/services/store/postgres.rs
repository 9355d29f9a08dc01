//! PostgreSQL implementation of the store traits.
//!
//! Uses sqlx runtime queries; the schema is managed outside this service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use super::{
    AuditStore, FeatureFlagStore, RoleStore, SessionStore, StoreError, StoreResult, UserStore,
};
use crate::config::DatabaseConfig;
use crate::models::{
    AuditLog, FeatureFlag, ListParams, Permission, Role, Session, SessionRotation, User,
};

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);
const IDLE_TIMEOUT: Duration = Duration::from_secs(600);
const MAX_LIFETIME: Duration = Duration::from_secs(1800);

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool sized by `config` and wrap it.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .idle_timeout(IDLE_TIMEOUT)
            .max_lifetime(MAX_LIFETIME)
            .connect(&config.url)
            .await?;

        tracing::info!("Connected to PostgreSQL");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Health check - ping the database.
    pub async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn map_err(e: sqlx::Error) -> StoreError {
    let unique = e
        .as_database_error()
        .map(|d| d.is_unique_violation())
        .unwrap_or(false);
    if unique {
        StoreError::Conflict(e.to_string())
    } else {
        StoreError::Database(e)
    }
}

fn like_pattern(term: &str) -> String {
    format!("%{}%", term.replace('%', "\\%").replace('_', "\\_"))
}

const USER_COLUMNS: &str = "id, tenant_id, email, password_hash, first_name, last_name, status, \
                            last_login_at, created_at, updated_at";
const SESSION_COLUMNS: &str = "id, user_id, refresh_token_hash, ip_address, user_agent, expires_at, \
                               created_at, rotated_at, replaced_by_token_hash, revoked_at";

// ==================== User Operations ====================

#[async_trait]
impl UserStore for Database {
    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)
    }

    async fn get_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)
    }

    async fn update_last_login(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE users SET last_login_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> StoreResult<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn create_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, tenant_id, email, password_hash, first_name, last_name,
                               status, last_login_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(user.id)
        .bind(user.tenant_id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.status)
        .bind(user.last_login_at)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET email = $2, first_name = $3, last_name = $4, status = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.status)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;
        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;
        tx.commit().await.map_err(map_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_users(&self, params: &ListParams) -> StoreResult<(Vec<User>, i64)> {
        let search = params.search.as_deref().map(like_pattern);
        let filter = r#"
            WHERE tenant_id = $1
              AND ($2::text IS NULL OR email ILIKE $2 OR first_name ILIKE $2 OR last_name ILIKE $2)
              AND ($3::text IS NULL OR status = $3)
        "#;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM users {}", filter))
            .bind(params.tenant_id)
            .bind(&search)
            .bind(&params.status)
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)?;

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users {} ORDER BY created_at DESC LIMIT $4 OFFSET $5",
            USER_COLUMNS, filter
        ))
        .bind(params.tenant_id)
        .bind(&search)
        .bind(&params.status)
        .bind(params.per_page)
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;

        Ok((users, total))
    }

    async fn count_users_by_status(&self, tenant_id: Uuid) -> StoreResult<HashMap<String, i64>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM users WHERE tenant_id = $1 GROUP BY status",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(rows.into_iter().collect())
    }
}

// ==================== Role & Permission Operations ====================

#[async_trait]
impl RoleStore for Database {
    async fn get_user_permissions(&self, user_id: Uuid) -> StoreResult<Vec<Permission>> {
        sqlx::query_as::<_, Permission>(
            r#"
            SELECT DISTINCT p.id, p.name, p.resource, p.action, p.description, p.created_at
            FROM permissions p
            INNER JOIN role_permissions rp ON rp.permission_id = p.id
            INNER JOIN user_roles ur ON ur.role_id = rp.role_id
            WHERE ur.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)
    }

    async fn get_user_roles(&self, user_id: Uuid) -> StoreResult<Vec<Role>> {
        sqlx::query_as::<_, Role>(
            r#"
            SELECT r.id, r.tenant_id, r.name, r.description, r.is_system, r.created_at, r.updated_at
            FROM roles r
            INNER JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            ORDER BY r.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)
    }

    async fn set_user_roles(&self, user_id: Uuid, role_ids: &[Uuid]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;
        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;
        for role_id in role_ids {
            sqlx::query(
                "INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(user_id)
            .bind(role_id)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;
        }
        tx.commit().await.map_err(map_err)?;
        Ok(())
    }

    async fn users_with_role(&self, role_id: Uuid) -> StoreResult<Vec<Uuid>> {
        sqlx::query_scalar("SELECT user_id FROM user_roles WHERE role_id = $1")
            .bind(role_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)
    }

    async fn create_role(&self, role: &Role) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO roles (id, tenant_id, name, description, is_system, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(role.id)
        .bind(role.tenant_id)
        .bind(&role.name)
        .bind(&role.description)
        .bind(role.is_system)
        .bind(role.created_at)
        .bind(role.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn get_role(&self, id: Uuid) -> StoreResult<Option<Role>> {
        sqlx::query_as::<_, Role>(
            "SELECT id, tenant_id, name, description, is_system, created_at, updated_at \
             FROM roles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)
    }

    async fn get_role_by_name(&self, tenant_id: Uuid, name: &str) -> StoreResult<Option<Role>> {
        sqlx::query_as::<_, Role>(
            "SELECT id, tenant_id, name, description, is_system, created_at, updated_at \
             FROM roles WHERE tenant_id = $1 AND name = $2",
        )
        .bind(tenant_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)
    }

    async fn update_role(&self, role: &Role) -> StoreResult<()> {
        sqlx::query("UPDATE roles SET name = $2, description = $3, updated_at = $4 WHERE id = $1")
            .bind(role.id)
            .bind(&role.name)
            .bind(&role.description)
            .bind(role.updated_at)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn delete_role(&self, id: Uuid) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;
        sqlx::query("DELETE FROM user_roles WHERE role_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;
        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;
        sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;
        tx.commit().await.map_err(map_err)?;
        Ok(())
    }

    async fn list_roles(&self, params: &ListParams) -> StoreResult<(Vec<Role>, i64)> {
        let search = params.search.as_deref().map(like_pattern);
        let filter = "WHERE tenant_id = $1 AND ($2::text IS NULL OR name ILIKE $2 OR description ILIKE $2)";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM roles {}", filter))
            .bind(params.tenant_id)
            .bind(&search)
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)?;

        let roles = sqlx::query_as::<_, Role>(&format!(
            "SELECT id, tenant_id, name, description, is_system, created_at, updated_at \
             FROM roles {} ORDER BY name LIMIT $3 OFFSET $4",
            filter
        ))
        .bind(params.tenant_id)
        .bind(&search)
        .bind(params.per_page)
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;

        Ok((roles, total))
    }

    async fn count_roles(&self, tenant_id: Uuid) -> StoreResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM roles WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)
    }

    async fn get_role_permissions(&self, role_id: Uuid) -> StoreResult<Vec<Permission>> {
        sqlx::query_as::<_, Permission>(
            r#"
            SELECT p.id, p.name, p.resource, p.action, p.description, p.created_at
            FROM permissions p
            INNER JOIN role_permissions rp ON rp.permission_id = p.id
            WHERE rp.role_id = $1
            ORDER BY p.resource, p.action
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)
    }

    async fn set_role_permissions(&self, role_id: Uuid, permission_ids: &[Uuid]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;
        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;
        for permission_id in permission_ids {
            sqlx::query(
                "INSERT INTO role_permissions (role_id, permission_id) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(role_id)
            .bind(permission_id)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;
        }
        tx.commit().await.map_err(map_err)?;
        Ok(())
    }

    async fn list_permissions(&self) -> StoreResult<Vec<Permission>> {
        sqlx::query_as::<_, Permission>(
            "SELECT id, name, resource, action, description, created_at FROM permissions \
             ORDER BY resource, action",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)
    }
}

// ==================== Session Operations ====================

#[async_trait]
impl SessionStore for Database {
    async fn create_session(&self, session: &Session) -> StoreResult<()> {
        insert_session(&self.pool, session).await
    }

    async fn get_session_by_token(&self, token_hash: &str) -> StoreResult<Option<Session>> {
        sqlx::query_as::<_, Session>(&format!(
            "SELECT {} FROM sessions WHERE refresh_token_hash = $1",
            SESSION_COLUMNS
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)
    }

    async fn rotate_session(&self, rotation: &SessionRotation) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;

        let retired = sqlx::query(
            r#"
            UPDATE sessions
            SET rotated_at = $3, replaced_by_token_hash = $4
            WHERE id = $1
              AND refresh_token_hash = $2
              AND rotated_at IS NULL
              AND revoked_at IS NULL
            "#,
        )
        .bind(rotation.current_id)
        .bind(&rotation.current_token_hash)
        .bind(rotation.rotated_at)
        .bind(&rotation.successor.refresh_token_hash)
        .execute(&mut *tx)
        .await
        .map_err(map_err)?;

        if retired.rows_affected() != 1 {
            tx.rollback().await.map_err(map_err)?;
            return Ok(false);
        }

        insert_session(&mut *tx, &rotation.successor).await?;
        tx.commit().await.map_err(map_err)?;
        Ok(true)
    }

    async fn revoke_session(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE sessions SET revoked_at = $2 WHERE id = $1 AND revoked_at IS NULL")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn revoke_user_sessions(&self, user_id: Uuid, at: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE sessions SET revoked_at = $2 WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(result.rows_affected())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(result.rows_affected())
    }
}

async fn insert_session<'e, E>(executor: E, session: &Session) -> StoreResult<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO sessions (id, user_id, refresh_token_hash, ip_address, user_agent,
                              expires_at, created_at, rotated_at, replaced_by_token_hash, revoked_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(session.id)
    .bind(session.user_id)
    .bind(&session.refresh_token_hash)
    .bind(&session.ip_address)
    .bind(&session.user_agent)
    .bind(session.expires_at)
    .bind(session.created_at)
    .bind(session.rotated_at)
    .bind(&session.replaced_by_token_hash)
    .bind(session.revoked_at)
    .execute(executor)
    .await
    .map_err(map_err)?;
    Ok(())
}

// ==================== Audit Operations ====================

const AUDIT_COLUMNS: &str = "id, tenant_id, user_id, action, resource, resource_id, old_value, \
                             new_value, ip_address, user_agent, created_at";

#[async_trait]
impl AuditStore for Database {
    async fn log_audit_event(&self, entry: &AuditLog) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, tenant_id, user_id, action, resource, resource_id,
                                    old_value, new_value, ip_address, user_agent, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(entry.id)
        .bind(entry.tenant_id)
        .bind(entry.user_id)
        .bind(&entry.action)
        .bind(&entry.resource)
        .bind(entry.resource_id)
        .bind(&entry.old_value)
        .bind(&entry.new_value)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn list_audit_logs(&self, params: &ListParams) -> StoreResult<(Vec<AuditLog>, i64)> {
        let search = params.search.as_deref().map(like_pattern);
        let filter = r#"
            WHERE tenant_id = $1
              AND ($2::text IS NULL OR action ILIKE $2 OR resource ILIKE $2)
              AND ($3::text IS NULL OR action = $3)
              AND ($4::text IS NULL OR resource = $4)
        "#;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM audit_logs {}", filter))
            .bind(params.tenant_id)
            .bind(&search)
            .bind(&params.action)
            .bind(&params.resource)
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)?;

        let logs = sqlx::query_as::<_, AuditLog>(&format!(
            "SELECT {} FROM audit_logs {} ORDER BY created_at DESC LIMIT $5 OFFSET $6",
            AUDIT_COLUMNS, filter
        ))
        .bind(params.tenant_id)
        .bind(&search)
        .bind(&params.action)
        .bind(&params.resource)
        .bind(params.per_page)
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;

        Ok((logs, total))
    }

    async fn count_recent_logins(&self, tenant_id: Uuid, since: DateTime<Utc>) -> StoreResult<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM audit_logs WHERE tenant_id = $1 AND action = 'login' AND created_at >= $2",
        )
        .bind(tenant_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(map_err)
    }

    async fn recent_activity(&self, tenant_id: Uuid, limit: i64) -> StoreResult<Vec<AuditLog>> {
        sqlx::query_as::<_, AuditLog>(&format!(
            "SELECT {} FROM audit_logs WHERE tenant_id = $1 ORDER BY created_at DESC LIMIT $2",
            AUDIT_COLUMNS
        ))
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)
    }
}

// ==================== Feature Flag Operations ====================

const FLAG_COLUMNS: &str =
    "id, tenant_id, key, name, description, enabled, metadata, created_at, updated_at";

#[async_trait]
impl FeatureFlagStore for Database {
    async fn list_flags(&self, tenant_id: Uuid) -> StoreResult<Vec<FeatureFlag>> {
        sqlx::query_as::<_, FeatureFlag>(&format!(
            "SELECT {} FROM feature_flags WHERE tenant_id = $1 ORDER BY key",
            FLAG_COLUMNS
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)
    }

    async fn get_flag(&self, id: Uuid) -> StoreResult<Option<FeatureFlag>> {
        sqlx::query_as::<_, FeatureFlag>(&format!(
            "SELECT {} FROM feature_flags WHERE id = $1",
            FLAG_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)
    }

    async fn get_flag_by_key(&self, tenant_id: Uuid, key: &str) -> StoreResult<Option<FeatureFlag>> {
        sqlx::query_as::<_, FeatureFlag>(&format!(
            "SELECT {} FROM feature_flags WHERE tenant_id = $1 AND key = $2",
            FLAG_COLUMNS
        ))
        .bind(tenant_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)
    }

    async fn create_flag(&self, flag: &FeatureFlag) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO feature_flags (id, tenant_id, key, name, description, enabled, metadata,
                                       created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(flag.id)
        .bind(flag.tenant_id)
        .bind(&flag.key)
        .bind(&flag.name)
        .bind(&flag.description)
        .bind(flag.enabled)
        .bind(&flag.metadata)
        .bind(flag.created_at)
        .bind(flag.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn update_flag(&self, flag: &FeatureFlag) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE feature_flags
            SET name = $2, description = $3, enabled = $4, metadata = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(flag.id)
        .bind(&flag.name)
        .bind(&flag.description)
        .bind(flag.enabled)
        .bind(&flag.metadata)
        .bind(flag.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn delete_flag(&self, id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM feature_flags WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }
}
