use axum::http::{header, HeaderMap};
use axum_extra::extract::CookieJar;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use super::audit::AuditService;
use super::error::AuthError;
use super::permissions::PermissionEvaluator;
use super::sessions::SessionManager;
use super::store::{bounded, UserStore};
use super::token::{TokenClaims, TokenEngine, TokenKind, TokenPair};
use crate::models::{normalize_email, AuditAction, AuditLog, ClientInfo, User};
use crate::utils::{Password, PasswordHasherSet, Verification};

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub tokens: TokenPair,
}

/// Composes tokens, sessions and permissions into the login lifecycle.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    tokens: TokenEngine,
    sessions: SessionManager,
    permissions: PermissionEvaluator,
    hashers: PasswordHasherSet,
    audit: AuditService,
    timeout: Duration,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: TokenEngine,
        sessions: SessionManager,
        permissions: PermissionEvaluator,
        hashers: PasswordHasherSet,
        audit: AuditService,
        timeout: Duration,
    ) -> Self {
        Self {
            users,
            tokens,
            sessions,
            permissions,
            hashers,
            audit,
            timeout,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn permissions(&self) -> &PermissionEvaluator {
        &self.permissions
    }

    pub fn hashers(&self) -> &PasswordHasherSet {
        &self.hashers
    }

    #[tracing::instrument(skip(self, password, client), fields(ip = %client.ip_address))]
    pub async fn login(
        &self,
        email: &str,
        password: Password,
        client: ClientInfo,
    ) -> Result<LoginOutcome, AuthError> {
        let email = normalize_email(email);
        let user = bounded(self.timeout, self.users.get_user_by_email(&email)).await?;

        let Some(user) = user else {
            self.burn_verification(password).await?;
            return Err(AuthError::InvalidCredentials);
        };

        let verification = self.check_password(password.clone(), &user.password_hash).await?;
        let Verification::Valid { needs_rehash } = verification else {
            tracing::info!(user_id = %user.id, "Login rejected: bad password");
            return Err(AuthError::InvalidCredentials);
        };

        if !user.is_active() {
            tracing::info!(user_id = %user.id, status = user.status.as_str(), "Login rejected: user not active");
            return Err(AuthError::UserInactive);
        }

        let issued = self.sessions.create(&user, &client).await?;

        if let Err(e) = bounded(self.timeout, self.users.update_last_login(user.id, Utc::now())).await {
            // Tokens must not leave without a consistent session record.
            if let Err(revoke_err) = self.sessions.revoke_session(issued.session.id).await {
                tracing::error!(
                    session_id = %issued.session.id,
                    error = %revoke_err,
                    "Failed to revoke session after aborted login"
                );
            }
            return Err(AuthError::Internal(
                anyhow::Error::new(e).context("Failed to record last login"),
            ));
        }

        if needs_rehash {
            self.upgrade_hash(&user, password);
        }

        self.audit.record(
            AuditLog::new(user.tenant_id, Some(user.id), AuditAction::Login, "auth").client(&client),
        );
        tracing::info!(user_id = %user.id, tenant_id = %user.tenant_id, "User logged in");

        Ok(LoginOutcome {
            user,
            tokens: issued.tokens,
        })
    }

    /// Revoke every session of the caller. Calling it twice is fine.
    #[tracing::instrument(skip(self, claims, client), fields(user_id = %claims.user_id))]
    pub async fn logout(&self, claims: &TokenClaims, client: ClientInfo) -> Result<(), AuthError> {
        let revoked = self.sessions.revoke(claims.user_id).await?;

        self.audit.record(
            AuditLog::new(
                claims.tenant_id,
                Some(claims.user_id),
                AuditAction::Logout,
                "auth",
            )
            .client(&client),
        );
        tracing::info!(revoked, "User logged out");
        Ok(())
    }

    /// Validate the bearer token, falling back to the access token cookie.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<TokenClaims, AuthError> {
        let token = bearer_token(headers)
            .or_else(|| {
                CookieJar::from_headers(headers)
                    .get(ACCESS_TOKEN_COOKIE)
                    .map(|c| c.value().to_string())
            })
            .ok_or(AuthError::InvalidToken)?;

        self.tokens.validate_as(&token, TokenKind::Access)
    }

    pub async fn authorize(
        &self,
        claims: &TokenClaims,
        resource: &str,
        action: &str,
    ) -> Result<bool, AuthError> {
        self.permissions
            .has_permission(claims.user_id, resource, action)
            .await
    }

    pub async fn refresh_tokens(
        &self,
        refresh_token: &str,
        client: ClientInfo,
    ) -> Result<TokenPair, AuthError> {
        self.sessions.refresh(refresh_token, &client).await
    }

    async fn check_password(&self, password: Password, stored_hash: &str) -> Result<Verification, AuthError> {
        let hashers = self.hashers.clone();
        let stored_hash = stored_hash.to_string();
        tokio::task::spawn_blocking(move || hashers.verify(&password, &stored_hash))
            .await
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("Password verification task failed: {}", e)))
    }

    async fn burn_verification(&self, password: Password) -> Result<(), AuthError> {
        let hashers = self.hashers.clone();
        tokio::task::spawn_blocking(move || hashers.verify_dummy(&password))
            .await
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("Password verification task failed: {}", e)))
    }

    /// Re-hash a legacy credential with the preferred scheme, off the request path.
    fn upgrade_hash(&self, user: &User, password: Password) {
        let users = self.users.clone();
        let hashers = self.hashers.clone();
        let timeout = self.timeout;
        let user_id = user.id;

        tokio::spawn(async move {
            let hashed = tokio::task::spawn_blocking(move || hashers.hash_password(&password)).await;
            let hash = match hashed {
                Ok(Ok(hash)) => hash,
                Ok(Err(e)) => {
                    tracing::warn!(%user_id, error = %e, "Failed to rehash legacy password");
                    return;
                }
                Err(e) => {
                    tracing::warn!(%user_id, error = %e, "Rehash task failed");
                    return;
                }
            };

            match bounded(timeout, users.update_password_hash(user_id, hash.as_str())).await {
                Ok(()) => tracing::info!(%user_id, "Upgraded legacy password hash"),
                Err(e) => tracing::warn!(%user_id, error = %e, "Failed to store upgraded password hash"),
            }
        });
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}
