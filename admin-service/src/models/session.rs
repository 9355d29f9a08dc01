//! Refresh session model - one row per issued refresh token.

use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Refresh session entity. Only the SHA-256 digest of the token is stored.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub refresh_token_hash: String,
    pub ip_address: String,
    pub user_agent: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub rotated_at: Option<DateTime<Utc>>,
    pub replaced_by_token_hash: Option<String>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(
        user_id: Uuid,
        refresh_token_hash: String,
        ttl: Duration,
        ip_address: String,
        user_agent: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            refresh_token_hash,
            ip_address,
            user_agent,
            expires_at: now + ttl,
            created_at: now,
            rotated_at: None,
            replaced_by_token_hash: None,
            revoked_at: None,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_rotated(&self) -> bool {
        self.rotated_at.is_some()
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Neither rotated, revoked nor expired.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_rotated() && !self.is_revoked() && !self.is_expired_at(now)
    }
}

/// Compare-and-set rotation of `current_id` into `successor`.
///
/// Applies only while the current row still carries `current_token_hash`
/// and is neither rotated nor revoked.
#[derive(Debug, Clone)]
pub struct SessionRotation {
    pub current_id: Uuid,
    pub current_token_hash: String,
    pub successor: Session,
    pub rotated_at: DateTime<Utc>,
}

/// Caller metadata recorded on sessions and audit rows.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: String,
    pub user_agent: String,
}

impl ClientInfo {
    pub fn new(ip_address: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            ip_address: ip_address.into(),
            user_agent: user_agent.into(),
        }
    }
}

/// Authenticated caller of a management operation.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub client: ClientInfo,
}
