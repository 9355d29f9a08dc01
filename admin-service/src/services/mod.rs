//! Services layer for admin-service.
//!
//! The auth core (tokens, sessions, permissions and the orchestrator) plus
//! the tenant-scoped management services built on the same stores.

pub mod audit;
pub mod auth;
pub mod dashboard;
pub mod error;
pub mod feature_flags;
pub mod permissions;
pub mod roles;
pub mod sessions;
pub mod store;
pub mod token;
pub mod users;

pub use audit::AuditService;
pub use auth::{AuthService, LoginOutcome, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
pub use dashboard::DashboardService;
pub use error::{AuthError, ServiceError};
pub use feature_flags::FeatureFlagService;
pub use permissions::{InMemoryPermissionCache, PermissionCache, PermissionEvaluator, PermissionSet};
pub use roles::RoleService;
pub use sessions::{IssuedSession, SessionManager};
pub use store::{Database, MemoryStore, StoreError, Stores};
pub use token::{hash_refresh_token, TokenClaims, TokenEngine, TokenKind, TokenPair, TOKEN_ISSUER};
pub use users::UserService;
