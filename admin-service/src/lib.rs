pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put, MethodRouter},
    Json, Router,
};
use service_core::middleware::{
    security_headers::security_headers_middleware, tracing::request_id_middleware,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{openapi::security::SecurityScheme, Modify, OpenApi};

use crate::config::AdminConfig;
use crate::middleware::{auth_middleware, require_permission, PermissionGate};
use crate::services::{
    AuditService, AuthService, Database, DashboardService, FeatureFlagService,
    InMemoryPermissionCache, PermissionCache, PermissionEvaluator, RoleService, SessionManager,
    Stores, TokenEngine, UserService,
};
use crate::utils::PasswordHasherSet;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::auth::login,
        handlers::auth::refresh,
        handlers::auth::logout,
        handlers::auth::me,
        handlers::dashboard::stats,
        handlers::users::list_users,
        handlers::users::create_user,
        handlers::users::get_user,
        handlers::users::update_user,
        handlers::users::delete_user,
        handlers::users::reset_password,
        handlers::users::get_user_roles,
        handlers::roles::list_roles,
        handlers::roles::create_role,
        handlers::roles::get_role,
        handlers::roles::update_role,
        handlers::roles::delete_role,
        handlers::roles::get_role_permissions,
        handlers::roles::list_permissions,
        handlers::audit::list_audit_logs,
        handlers::feature_flags::list_flags,
        handlers::feature_flags::create_flag,
        handlers::feature_flags::get_flag,
        handlers::feature_flags::update_flag,
        handlers::feature_flags::delete_flag,
        handlers::feature_flags::toggle_flag,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::MessageResponse,
            dtos::auth::LoginRequest,
            dtos::auth::LoginResponse,
            dtos::auth::RefreshRequest,
            dtos::auth::RefreshResponse,
            dtos::auth::MeResponse,
            dtos::admin::CreateUserRequest,
            dtos::admin::UpdateUserRequest,
            dtos::admin::ResetPasswordRequest,
            dtos::admin::CreateRoleRequest,
            dtos::admin::UpdateRoleRequest,
            dtos::admin::CreateFeatureFlagRequest,
            dtos::admin::UpdateFeatureFlagRequest,
            dtos::admin::ActivityItem,
            dtos::admin::DashboardStats,
            services::TokenPair,
            models::UserResponse,
            models::UserStatus,
            models::Role,
            models::Permission,
            models::RoleWithPermissions,
            models::AuditLog,
            models::FeatureFlag,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Login, token refresh and logout"),
        (name = "Dashboard", description = "Tenant statistics"),
        (name = "Users", description = "User management"),
        (name = "Roles", description = "Roles and permissions"),
        (name = "Audit", description = "Audit trail"),
        (name = "Feature Flags", description = "Per-tenant feature flags"),
        (name = "Observability", description = "Service health"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: AdminConfig,
    pub auth: AuthService,
    pub users: UserService,
    pub roles: RoleService,
    pub flags: FeatureFlagService,
    pub audit: AuditService,
    pub dashboard: DashboardService,
    /// Present when backed by PostgreSQL; used by the health check.
    pub db: Option<Database>,
}

impl AppState {
    pub fn new(
        config: AdminConfig,
        stores: Stores,
        db: Option<Database>,
    ) -> Result<Self, anyhow::Error> {
        Self::with_permission_cache(config, stores, db, Arc::new(InMemoryPermissionCache::new()))
    }

    /// Wire every service over `stores`, sharing one permission cache.
    pub fn with_permission_cache(
        config: AdminConfig,
        stores: Stores,
        db: Option<Database>,
        cache: Arc<dyn PermissionCache>,
    ) -> Result<Self, anyhow::Error> {
        let timeout = config.store.timeout();
        let tokens = TokenEngine::new(&config.jwt)?;
        let hashers = PasswordHasherSet::from_config(&config.password)?;
        let audit = AuditService::new(stores.audit.clone(), timeout);

        let sessions = SessionManager::new(
            stores.sessions.clone(),
            stores.users.clone(),
            tokens.clone(),
            audit.clone(),
            config.session.reuse_detection,
            timeout,
        )
        .with_reuse_grace(Duration::from_secs(config.session.reuse_grace_seconds));
        let permissions = PermissionEvaluator::new(stores.roles.clone(), cache, timeout);

        let auth = AuthService::new(
            stores.users.clone(),
            tokens,
            sessions.clone(),
            permissions.clone(),
            hashers.clone(),
            audit.clone(),
            timeout,
        );
        let users = UserService::new(
            stores.users.clone(),
            stores.roles.clone(),
            sessions,
            permissions.clone(),
            hashers,
            audit.clone(),
            timeout,
        );
        let roles = RoleService::new(stores.roles.clone(), permissions, audit.clone(), timeout);
        let flags = FeatureFlagService::new(stores.flags.clone(), audit.clone(), timeout);
        let dashboard = DashboardService::new(
            stores.users.clone(),
            stores.roles.clone(),
            stores.audit.clone(),
            timeout,
        );

        Ok(Self {
            config,
            auth,
            users,
            roles,
            flags,
            audit,
            dashboard,
            db,
        })
    }
}

/// Guard one route with `resource:action`.
fn guarded(
    state: &AppState,
    resource: &'static str,
    action: &'static str,
    route: MethodRouter<AppState>,
) -> MethodRouter<AppState> {
    route.route_layer(from_fn_with_state(
        PermissionGate::new(state.clone(), resource, action),
        require_permission,
    ))
}

pub fn build_router(state: AppState) -> Router {
    let s = &state;

    let management = Router::new()
        .route(
            "/dashboard/stats",
            guarded(s, "dashboard", "read", get(handlers::stats)),
        )
        // Users
        .route("/users", guarded(s, "users", "read", get(handlers::list_users)))
        .route("/users", guarded(s, "users", "create", post(handlers::create_user)))
        .route("/users/:id", guarded(s, "users", "read", get(handlers::get_user)))
        .route(
            "/users/:id",
            guarded(s, "users", "update", put(handlers::update_user)),
        )
        .route(
            "/users/:id",
            guarded(s, "users", "delete", delete(handlers::delete_user)),
        )
        .route(
            "/users/:id/reset-password",
            guarded(s, "users", "update", post(handlers::reset_password)),
        )
        .route(
            "/users/:id/roles",
            guarded(s, "users", "read", get(handlers::get_user_roles)),
        )
        // Roles
        .route("/roles", guarded(s, "roles", "read", get(handlers::list_roles)))
        .route("/roles", guarded(s, "roles", "create", post(handlers::create_role)))
        .route("/roles/:id", guarded(s, "roles", "read", get(handlers::get_role)))
        .route(
            "/roles/:id",
            guarded(s, "roles", "update", put(handlers::update_role)),
        )
        .route(
            "/roles/:id",
            guarded(s, "roles", "delete", delete(handlers::delete_role)),
        )
        .route(
            "/roles/:id/permissions",
            guarded(s, "roles", "read", get(handlers::get_role_permissions)),
        )
        .route(
            "/permissions",
            guarded(s, "roles", "read", get(handlers::list_permissions)),
        )
        // Audit
        .route(
            "/audit-logs",
            guarded(s, "audit_logs", "read", get(handlers::list_audit_logs)),
        )
        // Feature flags
        .route(
            "/feature-flags",
            guarded(s, "feature_flags", "read", get(handlers::list_flags)),
        )
        .route(
            "/feature-flags",
            guarded(s, "feature_flags", "create", post(handlers::create_flag)),
        )
        .route(
            "/feature-flags/:id",
            guarded(s, "feature_flags", "read", get(handlers::get_flag)),
        )
        .route(
            "/feature-flags/:id",
            guarded(
                s,
                "feature_flags",
                "update",
                put(handlers::update_flag),
            ),
        )
        .route(
            "/feature-flags/:id",
            guarded(
                s,
                "feature_flags",
                "delete",
                delete(handlers::delete_flag),
            ),
        )
        .route(
            "/feature-flags/:id/toggle",
            guarded(s, "feature_flags", "update", post(handlers::toggle_flag)),
        )
        // Session routes need identity only
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/me", get(handlers::me))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let api = Router::new()
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh))
        .route("/openapi.json", get(openapi_json))
        .merge(management);

    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api)
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(service_core::middleware::REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Credentialed CORS; origins must be explicit.
fn cors_layer(config: &AdminConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .security
        .allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(origin) if o != "*" => Some(origin),
            Ok(_) => {
                tracing::warn!("Ignoring wildcard CORS origin; credentials require explicit origins");
                None
            }
            Err(e) => {
                tracing::error!(origin = %o, error = %e, "Invalid CORS origin, skipping");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-request-id"),
        ])
}
