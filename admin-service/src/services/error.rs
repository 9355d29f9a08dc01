use service_core::error::AppError;
use thiserror::Error;

use super::store::StoreError;

/// Outcomes of the auth core. Everything except `Internal` is an expected, user-facing result.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("User is not active")]
    UserInactive,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::Internal(anyhow::Error::new(err))
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => {
                AppError::Unauthorized(anyhow::anyhow!("Invalid email or password"))
            }
            AuthError::UserNotFound => AppError::Unauthorized(anyhow::anyhow!("User not found")),
            AuthError::UserInactive => AppError::Forbidden(anyhow::anyhow!("Account is not active")),
            AuthError::TokenExpired => AppError::Unauthorized(anyhow::anyhow!("Token has expired")),
            AuthError::InvalidToken => AppError::Unauthorized(anyhow::anyhow!("Invalid token")),
            AuthError::Internal(e) => AppError::InternalError(e),
        }
    }
}

/// Errors of the management services (users, roles, feature flags).
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    SystemRole(&'static str),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Client-facing text for a unique violation raised by the store itself.
pub const STORE_CONFLICT_MESSAGE: &str = "Resource already exists";

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(what) => AppError::NotFound(anyhow::anyhow!("{} not found", what)),
            ServiceError::Conflict(msg) => AppError::Conflict(anyhow::anyhow!(msg)),
            ServiceError::SystemRole(msg) => AppError::Forbidden(anyhow::anyhow!(msg)),
            ServiceError::ValidationError(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            ServiceError::Auth(e) => e.into(),
            ServiceError::Store(StoreError::Conflict(detail)) => {
                // Constraint names and values stay in the server log.
                tracing::warn!(detail = %detail, "Store rejected write with unique violation");
                AppError::Conflict(anyhow::anyhow!(STORE_CONFLICT_MESSAGE))
            }
            ServiceError::Store(e) => AppError::DatabaseError(anyhow::Error::new(e)),
        }
    }
}
