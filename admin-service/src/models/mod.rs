pub mod audit_log;
pub mod feature_flag;
pub mod role;
pub mod session;
pub mod user;

pub use audit_log::{AuditAction, AuditLog};
pub use feature_flag::FeatureFlag;
pub use role::{Permission, Role, RoleWithPermissions};
pub use session::{Actor, ClientInfo, Session, SessionRotation};
pub use user::{normalize_email, User, UserResponse, UserStatus};

use serde::Serialize;
use uuid::Uuid;

pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 100;
/// Highest page a listing will seek to.
pub const MAX_PAGE: i64 = 1_000_000;

/// Tenant-scoped list query shared by every paginated store call.
#[derive(Debug, Clone)]
pub struct ListParams {
    pub tenant_id: Uuid,
    pub page: i64,
    pub per_page: i64,
    pub search: Option<String>,
    pub status: Option<String>,
    pub action: Option<String>,
    pub resource: Option<String>,
}

impl ListParams {
    /// Clamps `page` to `1..=MAX_PAGE` and `per_page` to `1..=MAX_PER_PAGE`.
    pub fn new(tenant_id: Uuid, page: Option<i64>, per_page: Option<i64>) -> Self {
        Self {
            tenant_id,
            page: page.unwrap_or(1).clamp(1, MAX_PAGE),
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
            search: None,
            status: None,
            action: None,
            resource: None,
        }
    }

    pub fn search(mut self, search: Option<String>) -> Self {
        self.search = search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        self
    }

    pub fn status(mut self, status: Option<String>) -> Self {
        self.status = status.filter(|s| !s.is_empty());
        self
    }

    pub fn action(mut self, action: Option<String>) -> Self {
        self.action = action.filter(|s| !s.is_empty());
        self
    }

    pub fn resource(mut self, resource: Option<String>) -> Self {
        self.resource = resource.filter(|s| !s.is_empty());
        self
    }

    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.per_page.max(0))
    }

    /// Lowercased search term for case-insensitive matching.
    pub fn search_lower(&self) -> Option<String> {
        self.search.as_ref().map(|s| s.to_lowercase())
    }
}

/// One page of results.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, total: i64, params: &ListParams) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            (total + params.per_page - 1) / params.per_page
        };
        Self {
            data,
            total,
            page: params.page,
            per_page: params.per_page,
            total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            data: self.data.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            total_pages: self.total_pages,
        }
    }
}
