use axum::{body::Bytes, extract::State, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use service_core::error::AppError;

use crate::{
    dtos::{
        auth::{LoginRequest, LoginResponse, MeResponse, RefreshRequest, RefreshResponse},
        MessageResponse,
    },
    middleware::{AuthUser, RequestClient},
    services::{TokenPair, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE},
    utils::{Password, ValidatedJson},
    AppState,
};

/// Login with email and password
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 403, description = "Account not active", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    RequestClient(client): RequestClient,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    let outcome = state
        .auth
        .login(&req.email, Password::new(req.password), client)
        .await?;

    let jar = with_session_cookies(jar, &outcome.tokens, &state);
    Ok((
        jar,
        Json(LoginResponse {
            user: outcome.user.into(),
            tokens: outcome.tokens,
        }),
    ))
}

/// Exchange a refresh token for a new token pair
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token refreshed successfully", body = RefreshResponse),
        (status = 400, description = "Malformed body", body = ErrorResponse),
        (status = 401, description = "Invalid or expired token", body = ErrorResponse),
        (status = 403, description = "Account not active", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn refresh(
    State(state): State<AppState>,
    RequestClient(client): RequestClient,
    jar: CookieJar,
    body: Bytes,
) -> Result<(CookieJar, Json<RefreshResponse>), AppError> {
    // The body is optional; browsers rely on the cookie.
    let req: RefreshRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RefreshRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid request body: {}", e)))?
    };

    let refresh_token = req
        .refresh_token
        .filter(|t| !t.is_empty())
        .or_else(|| jar.get(REFRESH_TOKEN_COOKIE).map(|c| c.value().to_string()))
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Refresh token is required")))?;

    let tokens = state.auth.refresh_tokens(&refresh_token, client).await?;

    let jar = with_session_cookies(jar, &tokens, &state);
    Ok((jar, Json(RefreshResponse { tokens })))
}

/// Revoke every session of the caller
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    responses(
        (status = 200, description = "Logged out successfully", body = MessageResponse),
        (status = 401, description = "Invalid token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    RequestClient(client): RequestClient,
    jar: CookieJar,
) -> Result<(CookieJar, Json<MessageResponse>), AppError> {
    state.auth.logout(&claims, client).await?;

    let jar = jar
        .remove(Cookie::build((ACCESS_TOKEN_COOKIE, "")).path("/"))
        .remove(Cookie::build((REFRESH_TOKEN_COOKIE, "")).path("/"));
    Ok((jar, Json(MessageResponse::new("Logged out successfully"))))
}

/// Identity of the caller
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Current identity", body = MeResponse),
        (status = 401, description = "Invalid token", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn me(AuthUser(claims): AuthUser) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: claims.user_id,
        tenant_id: claims.tenant_id,
        email: claims.email,
    })
}

fn with_session_cookies(jar: CookieJar, tokens: &TokenPair, state: &AppState) -> CookieJar {
    let secure = state.config.security.secure_cookies;
    let access_ttl = state.config.jwt.access_token_expiry_minutes;
    let refresh_ttl = state.config.jwt.refresh_token_expiry_days;

    jar.add(
        Cookie::build((ACCESS_TOKEN_COOKIE, tokens.access_token.clone()))
            .path("/")
            .http_only(true)
            .secure(secure)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::minutes(access_ttl))
            .build(),
    )
    .add(
        Cookie::build((REFRESH_TOKEN_COOKIE, tokens.refresh_token.clone()))
            .path("/")
            .http_only(true)
            .secure(secure)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::days(refresh_ttl))
            .build(),
    )
}
