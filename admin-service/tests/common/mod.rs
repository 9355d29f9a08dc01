//! Shared fixtures for admin-service integration tests.
//!
//! Every test gets its own in-memory store seeded with one tenant, a system
//! `admin` role granting `*:*`, and two active users: `admin@example.com`
//! holding that role and `plain@example.com` holding nothing.

#![allow(dead_code)]

use admin_service::{
    build_router,
    config::{
        AdminConfig, DatabaseConfig, Environment, JwtConfig, PasswordConfig, SecurityConfig,
        SessionConfig, StoreConfig,
    },
    models::{Permission, Role, User},
    services::{
        store::{RoleStore, UserStore},
        MemoryStore, Stores,
    },
    utils::{Password, PasswordHasherSet},
    AppState,
};
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;
use uuid::Uuid;

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const PLAIN_EMAIL: &str = "plain@example.com";
pub const PASSWORD: &str = "correct-horse-battery";

pub fn test_config() -> AdminConfig {
    AdminConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "admin-service".to_string(),
        service_version: "test".to_string(),
        log_level: "error".to_string(),
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
            min_connections: 1,
        },
        jwt: JwtConfig {
            secret: "integration-test-secret-that-is-long-enough".to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        },
        session: SessionConfig {
            purge_interval_seconds: 3600,
            reuse_detection: true,
            reuse_grace_seconds: 0,
        },
        password: PasswordConfig {
            argon2_memory_kib: 1024,
            argon2_iterations: 1,
            argon2_parallelism: 1,
        },
        store: StoreConfig { timeout_ms: 2000 },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            secure_cookies: false,
        },
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub tenant_id: Uuid,
    pub admin: User,
    pub plain: User,
    pub admin_role: Role,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let config = test_config();
        let hashers = PasswordHasherSet::from_config(&config.password)
            .expect("Failed to build password hashers");
        let hash = hashers
            .hash_password(&Password::new(PASSWORD.to_string()))
            .expect("Failed to hash password")
            .into_string();

        let store = Arc::new(MemoryStore::new());
        let tenant_id = Uuid::new_v4();

        let wildcard = Permission::new("*", "*");
        store.insert_permission(wildcard.clone()).await;
        for (resource, action) in [
            ("users", "read"),
            ("users", "create"),
            ("roles", "read"),
            ("feature_flags", "read"),
        ] {
            store.insert_permission(Permission::new(resource, action)).await;
        }

        let admin_role = Role::new(tenant_id, "admin".to_string(), "Everything".to_string()).system();
        store.create_role(&admin_role).await.expect("Failed to seed role");
        store
            .set_role_permissions(admin_role.id, &[wildcard.id])
            .await
            .expect("Failed to seed role permissions");

        let admin = User::new(tenant_id, ADMIN_EMAIL, hash.clone(), "Ada".into(), "Admin".into());
        let plain = User::new(tenant_id, PLAIN_EMAIL, hash, "Pat".into(), "Plain".into());
        store.create_user(&admin).await.expect("Failed to seed admin");
        store.create_user(&plain).await.expect("Failed to seed user");
        store
            .set_user_roles(admin.id, &[admin_role.id])
            .await
            .expect("Failed to assign admin role");

        let state = AppState::new(config, Stores::memory(store.clone()), None)
            .expect("Failed to build state");

        Self {
            router: build_router(state),
            store,
            tenant_id,
            admin,
            plain,
            admin_role,
        }
    }

    pub async fn send(&self, req: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Router failed");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Log in and return the access token.
    pub async fn login(&self, email: &str) -> String {
        let res = self.login_full(email, PASSWORD).await;
        assert_eq!(res.status, StatusCode::OK, "login failed: {}", res.body);
        res.body["tokens"]["access_token"]
            .as_str()
            .expect("access token missing")
            .to_string()
    }

    pub async fn login_full(&self, email: &str, password: &str) -> TestResponse {
        self.send(json_request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            serde_json::json!({ "email": email, "password": password }),
        ))
        .await
    }

    pub async fn get(&self, uri: &str, token: &str) -> TestResponse {
        self.send(
            Request::builder()
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> TestResponse {
        self.send(
            Request::builder()
                .method(Method::DELETE)
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Audit writes land on a spawned task; poll until `count` rows match.
    pub async fn wait_for_audit(&self, action: &str, count: usize) -> bool {
        for _ in 0..50 {
            let found = self
                .store
                .audit_entries()
                .await
                .iter()
                .filter(|e| e.action == action)
                .count();
            if found >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect()
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        let prefix = format!("{}=", name);
        self.set_cookies().into_iter().find_map(|c| {
            c.strip_prefix(&prefix)
                .map(|rest| rest.split(';').next().unwrap_or_default().to_string())
        })
    }
}

pub fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}
