use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::audit::AuditService;
use super::error::AuthError;
use super::store::{bounded, SessionStore, UserStore};
use super::token::{hash_refresh_token, TokenClaims, TokenEngine, TokenKind, TokenPair};
use crate::models::{AuditAction, AuditLog, ClientInfo, Session, SessionRotation, User};

/// A freshly persisted session and the tokens bound to it.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub session: Session,
    pub tokens: TokenPair,
}

/// Binds refresh tokens to revocable, single-use session rows.
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<dyn SessionStore>,
    users: Arc<dyn UserStore>,
    tokens: TokenEngine,
    audit: AuditService,
    reuse_detection: bool,
    reuse_grace: Duration,
    timeout: Duration,
}

impl SessionManager {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn UserStore>,
        tokens: TokenEngine,
        audit: AuditService,
        reuse_detection: bool,
        timeout: Duration,
    ) -> Self {
        Self {
            sessions,
            users,
            tokens,
            audit,
            reuse_detection,
            reuse_grace: Duration::ZERO,
            timeout,
        }
    }

    /// Treat a replay arriving within `grace` of its rotation as a duplicate
    /// submit: it fails without revoking the user's other sessions.
    pub fn with_reuse_grace(mut self, grace: Duration) -> Self {
        self.reuse_grace = grace;
        self
    }

    /// Mint a token pair and persist the session row for its refresh token.
    #[tracing::instrument(skip(self, user, client), fields(user_id = %user.id))]
    pub async fn create(&self, user: &User, client: &ClientInfo) -> Result<IssuedSession, AuthError> {
        let tokens = self.tokens.issue_pair(user)?;
        let session = Session::new(
            user.id,
            hash_refresh_token(&tokens.refresh_token),
            self.tokens.refresh_ttl(),
            client.ip_address.clone(),
            client.user_agent.clone(),
        );

        bounded(self.timeout, self.sessions.create_session(&session)).await?;
        Ok(IssuedSession { session, tokens })
    }

    /// Exchange a refresh token for a new pair, retiring the presented one.
    #[tracing::instrument(skip_all)]
    pub async fn refresh(
        &self,
        refresh_token: &str,
        client: &ClientInfo,
    ) -> Result<TokenPair, AuthError> {
        let claims = self.tokens.validate_as(refresh_token, TokenKind::Refresh)?;
        let token_hash = hash_refresh_token(refresh_token);

        let session = bounded(self.timeout, self.sessions.get_session_by_token(&token_hash))
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if session.user_id != claims.user_id {
            tracing::warn!(
                session_id = %session.id,
                claimed_user = %claims.user_id,
                "Refresh token claims do not match session owner"
            );
            return Err(AuthError::InvalidToken);
        }

        if session.is_rotated() {
            if self.within_reuse_grace(&session, Utc::now()) {
                tracing::debug!(session_id = %session.id, "Duplicate refresh within grace window");
                return Err(AuthError::InvalidToken);
            }
            self.on_reuse(&session, &claims, client).await;
            return Err(AuthError::InvalidToken);
        }

        if session.is_revoked() {
            return Err(AuthError::InvalidToken);
        }

        let now = Utc::now();
        if session.is_expired_at(now) {
            return Err(AuthError::TokenExpired);
        }

        let user = bounded(self.timeout, self.users.get_user_by_id(claims.user_id))
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if !user.is_active() {
            return Err(AuthError::UserInactive);
        }

        let tokens = self.tokens.issue_pair(&user)?;
        let rotation = SessionRotation {
            current_id: session.id,
            current_token_hash: token_hash,
            successor: Session::new(
                user.id,
                hash_refresh_token(&tokens.refresh_token),
                self.tokens.refresh_ttl(),
                client.ip_address.clone(),
                client.user_agent.clone(),
            ),
            rotated_at: now,
        };

        if !bounded(self.timeout, self.sessions.rotate_session(&rotation)).await? {
            tracing::debug!(session_id = %session.id, "Lost refresh rotation race");
            return Err(AuthError::InvalidToken);
        }

        tracing::debug!(
            user_id = %user.id,
            retired = %session.id,
            successor = %rotation.successor.id,
            "Refresh session rotated"
        );
        Ok(tokens)
    }

    fn within_reuse_grace(&self, session: &Session, now: DateTime<Utc>) -> bool {
        if self.reuse_grace.is_zero() {
            return false;
        }
        let Ok(grace) = chrono::Duration::from_std(self.reuse_grace) else {
            return false;
        };
        session.rotated_at.is_some_and(|at| now - at < grace)
    }

    /// A rotated-away token came back: someone holds a copy they should not.
    async fn on_reuse(&self, session: &Session, claims: &TokenClaims, client: &ClientInfo) {
        tracing::warn!(
            user_id = %session.user_id,
            session_id = %session.id,
            reuse_detection = self.reuse_detection,
            "Rotated refresh token presented again"
        );

        if !self.reuse_detection {
            return;
        }

        match bounded(
            self.timeout,
            self.sessions.revoke_user_sessions(session.user_id, Utc::now()),
        )
        .await
        {
            Ok(revoked) => {
                tracing::warn!(user_id = %session.user_id, revoked, "Revoked all sessions after token reuse")
            }
            Err(e) => {
                tracing::error!(user_id = %session.user_id, error = %e, "Failed to revoke sessions after token reuse")
            }
        }

        self.audit.record(
            AuditLog::new(
                claims.tenant_id,
                Some(session.user_id),
                AuditAction::RefreshTokenReuse,
                "session",
            )
            .resource_id(session.id)
            .client(client),
        );
    }

    /// Revoke every live session of the user. Returns how many were revoked.
    #[tracing::instrument(skip(self))]
    pub async fn revoke(&self, user_id: Uuid) -> Result<u64, AuthError> {
        Ok(bounded(
            self.timeout,
            self.sessions.revoke_user_sessions(user_id, Utc::now()),
        )
        .await?)
    }

    /// Revoke a single session row.
    pub async fn revoke_session(&self, session_id: Uuid) -> Result<(), AuthError> {
        Ok(bounded(
            self.timeout,
            self.sessions.revoke_session(session_id, Utc::now()),
        )
        .await?)
    }

    /// Delete rows past their expiry. Safe alongside live traffic.
    pub async fn purge_expired(&self) -> Result<u64, AuthError> {
        Ok(bounded(self.timeout, self.sessions.purge_expired(Utc::now())).await?)
    }

    /// Run [`Self::purge_expired`] every `every` until the runtime shuts down.
    pub fn spawn_purge_task(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match manager.purge_expired().await {
                    Ok(0) => {}
                    Ok(purged) => tracing::info!(purged, "Purged expired sessions"),
                    Err(e) => tracing::warn!(error = %e, "Session purge failed"),
                }
            }
        })
    }
}
