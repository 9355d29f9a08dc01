mod common;

use admin_service::models::UserStatus;
use admin_service::services::store::UserStore;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::{json_request, TestApp, ADMIN_EMAIL, PASSWORD, PLAIN_EMAIL};
use serde_json::json;

fn refresh_with_cookie(refresh_token: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/v1/auth/refresh")
        .header(header::COOKIE, format!("refresh_token={}", refresh_token))
        .body(Body::empty())
        .unwrap()
}

fn refresh_with_body(refresh_token: &str) -> Request<Body> {
    json_request(
        Method::POST,
        "/api/v1/auth/refresh",
        None,
        json!({ "refresh_token": refresh_token }),
    )
}

#[tokio::test]
async fn login_returns_tokens_and_sets_cookies() {
    let app = TestApp::spawn().await;

    let res = app.login_full(ADMIN_EMAIL, PASSWORD).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["user"]["email"], ADMIN_EMAIL);
    assert!(res.body["user"].get("password_hash").is_none());
    assert_eq!(res.body["tokens"]["token_type"], "Bearer");
    assert_eq!(res.body["tokens"]["expires_in"], 900);

    let access = res.body["tokens"]["access_token"].as_str().unwrap();
    assert_eq!(res.cookie("access_token").as_deref(), Some(access));
    assert!(res.cookie("refresh_token").is_some());
    for cookie in res.set_cookies() {
        assert!(cookie.contains("HttpOnly"), "cookie not HttpOnly: {}", cookie);
        assert!(cookie.contains("SameSite=Lax"), "cookie not Lax: {}", cookie);
        assert!(cookie.contains("Path=/"), "cookie path missing: {}", cookie);
    }

    assert!(app.wait_for_audit("login", 1).await);
    let user = app.store.get_user_by_id(app.admin.id).await.unwrap().unwrap();
    assert!(user.last_login_at.is_some());
}

#[tokio::test]
async fn login_is_case_insensitive_on_email() {
    let app = TestApp::spawn().await;
    let res = app.login_full("ADMIN@Example.COM", PASSWORD).await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn wrong_password_and_unknown_email_look_the_same() {
    let app = TestApp::spawn().await;

    let wrong = app.login_full(ADMIN_EMAIL, "not-the-password").await;
    let unknown = app.login_full("nobody@example.com", PASSWORD).await;

    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.body, unknown.body);
    assert_eq!(wrong.body["error"], "Invalid email or password");
    assert!(wrong.set_cookies().is_empty());
    assert!(app.store.sessions_for_user(app.admin.id).await.is_empty());
}

#[tokio::test]
async fn suspended_user_is_forbidden_only_with_the_right_password() {
    let app = TestApp::spawn().await;
    let suspended = app.plain.clone().with_status(UserStatus::Suspended);
    app.store.update_user(&suspended).await.unwrap();

    let res = app.login_full(PLAIN_EMAIL, PASSWORD).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app.login_full(PLAIN_EMAIL, "guess").await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_login_bodies_are_rejected() {
    let app = TestApp::spawn().await;

    let res = app
        .send(json_request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            json!({ "email": "not-an-email", "password": "x" }),
        ))
        .await;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);

    let res = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn me_accepts_bearer_or_cookie() {
    let app = TestApp::spawn().await;
    let token = app.login(PLAIN_EMAIL).await;

    let res = app.get("/api/v1/auth/me", &token).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["email"], PLAIN_EMAIL);
    assert_eq!(res.body["user_id"], app.plain.id.to_string());
    assert_eq!(res.body["tenant_id"], app.tenant_id.to_string());

    let res = app
        .send(
            Request::builder()
                .uri("/api/v1/auth/me")
                .header(header::COOKIE, format!("access_token={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn bearer_header_wins_over_cookie() {
    let app = TestApp::spawn().await;
    let token = app.login(PLAIN_EMAIL).await;

    let res = app
        .send(
            Request::builder()
                .uri("/api/v1/auth/me")
                .header(header::AUTHORIZATION, "Bearer garbage")
                .header(header::COOKIE, format!("access_token={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_or_bad_credentials_are_401() {
    let app = TestApp::spawn().await;

    let res = app
        .send(
            Request::builder()
                .uri("/api/v1/auth/me")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["error"], "Invalid token");

    let res = app.get("/api/v1/users", "not.a.jwt").await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_rotates_the_pair() {
    let app = TestApp::spawn().await;
    let login = app.login_full(PLAIN_EMAIL, PASSWORD).await;
    let first = login.body["tokens"]["refresh_token"].as_str().unwrap().to_string();

    let res = app.send(refresh_with_body(&first)).await;
    assert_eq!(res.status, StatusCode::OK);
    let second = res.body["tokens"]["refresh_token"].as_str().unwrap().to_string();
    assert_ne!(first, second);
    assert_eq!(res.cookie("refresh_token").as_deref(), Some(second.as_str()));

    let access = res.body["tokens"]["access_token"].as_str().unwrap();
    assert_eq!(app.get("/api/v1/auth/me", access).await.status, StatusCode::OK);
}

#[tokio::test]
async fn tokens_only_work_for_their_own_purpose() {
    let app = TestApp::spawn().await;
    let login = app.login_full(PLAIN_EMAIL, PASSWORD).await;
    let access = login.body["tokens"]["access_token"].as_str().unwrap().to_string();
    let refresh = login.body["tokens"]["refresh_token"].as_str().unwrap().to_string();

    let res = app.get("/api/v1/auth/me", &refresh).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["error"], "Invalid token");

    let res = app.send(refresh_with_body(&access)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    assert_eq!(app.get("/api/v1/auth/me", &access).await.status, StatusCode::OK);
}

#[tokio::test]
async fn refresh_reads_the_cookie_when_the_body_is_empty() {
    let app = TestApp::spawn().await;
    let login = app.login_full(PLAIN_EMAIL, PASSWORD).await;
    let refresh = login.cookie("refresh_token").unwrap();

    let res = app.send(refresh_with_cookie(&refresh)).await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn refresh_rejects_bad_input() {
    let app = TestApp::spawn().await;

    let res = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/auth/refresh")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/auth/refresh")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{oops"))
                .unwrap(),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app.send(refresh_with_body("unknown-token")).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn replaying_a_rotated_token_revokes_the_family() {
    let app = TestApp::spawn().await;
    let login = app.login_full(PLAIN_EMAIL, PASSWORD).await;
    let first = login.body["tokens"]["refresh_token"].as_str().unwrap().to_string();

    let rotated = app.send(refresh_with_body(&first)).await;
    assert_eq!(rotated.status, StatusCode::OK);
    let second = rotated.body["tokens"]["refresh_token"].as_str().unwrap().to_string();

    let replay = app.send(refresh_with_body(&first)).await;
    assert_eq!(replay.status, StatusCode::UNAUTHORIZED);

    // The legitimate successor died with the family.
    let res = app.send(refresh_with_body(&second)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert!(app.wait_for_audit("refresh_token_reuse", 1).await);
}

#[tokio::test]
async fn refresh_fails_once_the_user_is_suspended() {
    let app = TestApp::spawn().await;
    let login = app.login_full(PLAIN_EMAIL, PASSWORD).await;
    let refresh = login.body["tokens"]["refresh_token"].as_str().unwrap().to_string();

    let suspended = app.plain.clone().with_status(UserStatus::Inactive);
    app.store.update_user(&suspended).await.unwrap();

    let res = app.send(refresh_with_body(&refresh)).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn logout_revokes_sessions_and_clears_cookies() {
    let app = TestApp::spawn().await;
    let login = app.login_full(PLAIN_EMAIL, PASSWORD).await;
    let access = login.body["tokens"]["access_token"].as_str().unwrap().to_string();
    let refresh = login.body["tokens"]["refresh_token"].as_str().unwrap().to_string();

    let res = app
        .send(json_request(
            Method::POST,
            "/api/v1/auth/logout",
            Some(&access),
            json!({}),
        ))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["message"], "Logged out successfully");
    assert_eq!(res.cookie("access_token").as_deref(), Some(""));
    assert_eq!(res.cookie("refresh_token").as_deref(), Some(""));

    let res = app.send(refresh_with_body(&refresh)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    // Logging out again is harmless.
    let res = app
        .send(json_request(
            Method::POST,
            "/api/v1/auth/logout",
            Some(&access),
            json!({}),
        ))
        .await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn logout_requires_authentication() {
    let app = TestApp::spawn().await;
    let res = app
        .send(json_request(Method::POST, "/api/v1/auth/logout", None, json!({})))
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}
