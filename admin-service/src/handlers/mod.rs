//! HTTP handlers for admin-service.

pub mod audit;
pub mod auth;
pub mod dashboard;
pub mod feature_flags;
pub mod health;
pub mod roles;
pub mod users;

pub use audit::*;
pub use auth::*;
pub use dashboard::*;
pub use feature_flags::*;
pub use health::*;
pub use roles::*;
pub use users::*;
