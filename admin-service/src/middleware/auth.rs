use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;
use std::net::SocketAddr;

use crate::models::{Actor, ClientInfo};
use crate::services::{AuthError, TokenClaims};
use crate::AppState;

/// Middleware to require authentication. Claims land in request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = state.auth.authenticate(req.headers()).map_err(|e| {
        match &e {
            AuthError::TokenExpired => tracing::debug!("Access token expired"),
            _ => tracing::debug!(error = %e, "Request not authenticated"),
        }
        AppError::from(e)
    })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// State of one `require_permission` layer.
#[derive(Clone)]
pub struct PermissionGate {
    state: AppState,
    resource: &'static str,
    action: &'static str,
}

impl PermissionGate {
    pub fn new(state: AppState, resource: &'static str, action: &'static str) -> Self {
        Self {
            state,
            resource,
            action,
        }
    }
}

/// Rejects with 403 unless the caller holds `resource:action`. Runs after [`auth_middleware`].
pub async fn require_permission(
    State(gate): State<PermissionGate>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = req.extensions().get::<TokenClaims>().ok_or_else(|| {
        AppError::InternalError(anyhow::anyhow!("Auth claims missing from request extensions"))
    })?;

    let allowed = gate
        .state
        .auth
        .authorize(claims, gate.resource, gate.action)
        .await?;

    if !allowed {
        tracing::warn!(
            user_id = %claims.user_id,
            resource = gate.resource,
            action = gate.action,
            "Permission denied"
        );
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Missing permission {}:{}",
            gate.resource,
            gate.action
        )));
    }

    Ok(next.run(req).await)
}

/// Extractor to easily get claims in handlers
pub struct AuthUser(pub TokenClaims);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts.extensions.get::<TokenClaims>().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!("Auth claims missing from request extensions"))
        })?;

        Ok(AuthUser(claims.clone()))
    }
}

/// Caller address and user agent.
///
/// The address is the first `x-forwarded-for` hop, else the socket peer.
pub struct RequestClient(pub ClientInfo);

#[axum::async_trait]
impl<S> FromRequestParts<S> for RequestClient
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequestClient(client_info(parts)))
    }
}

/// Authenticated caller plus client metadata, for management handlers.
pub struct CurrentActor(pub Actor);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        Ok(CurrentActor(Actor {
            user_id: claims.user_id,
            tenant_id: claims.tenant_id,
            client: client_info(parts),
        }))
    }
}

fn client_info(parts: &Parts) -> ClientInfo {
    let forwarded = parts
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty());

    let ip_address = forwarded
        .or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string());

    let user_agent = parts
        .headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    ClientInfo::new(ip_address, user_agent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;

    #[test]
    fn forwarded_for_wins_over_peer() {
        let (mut parts, _) = HttpRequest::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .header(header::USER_AGENT, "curl/8")
            .body(())
            .unwrap()
            .into_parts();
        parts
            .extensions
            .insert(ConnectInfo(SocketAddr::from(([10, 1, 1, 1], 4000))));

        let client = client_info(&parts);
        assert_eq!(client.ip_address, "203.0.113.7");
        assert_eq!(client.user_agent, "curl/8");
    }

    #[test]
    fn falls_back_to_peer_then_unknown() {
        let (mut parts, _) = HttpRequest::builder().body(()).unwrap().into_parts();
        assert_eq!(client_info(&parts).ip_address, "unknown");

        parts
            .extensions
            .insert(ConnectInfo(SocketAddr::from(([10, 1, 1, 1], 4000))));
        assert_eq!(client_info(&parts).ip_address, "10.1.1.1");
    }
}
