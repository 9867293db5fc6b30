use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use blog_api::{
    AppConfig, AppState, InMemoryRepository, create_router, repository::RepositoryState,
};
use chrono::Utc;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

// --- Test App ---

const TEST_JWT_SECRET: &str = "api-test-secret";

fn test_config() -> AppConfig {
    AppConfig {
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    }
}

fn spawn_app_with(repo: InMemoryRepository) -> Router {
    let repo = Arc::new(repo) as RepositoryState;
    create_router(AppState::new(repo, test_config()))
}

fn spawn_app_with_config(config: AppConfig) -> Router {
    let repo = Arc::new(InMemoryRepository::new()) as RepositoryState;
    create_router(AppState::new(repo, config))
}

fn spawn_app() -> Router {
    spawn_app_with(InMemoryRepository::new())
}

/// Sends one request through the router and returns the status plus the decoded envelope.
async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn register(app: &Router, username: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "secret1"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "register failed: {body}");
    body["data"]["token"].as_str().unwrap().to_string()
}

async fn create_post(app: &Router, token: &str, title: &str) -> i64 {
    let (status, body) = send(
        app,
        Method::POST,
        "/posts/saveOrUpdate",
        Some(token),
        Some(json!({ "title": title, "content": "body text" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "create failed: {body}");
    body["data"]["id"].as_i64().unwrap()
}

fn assert_envelope(body: &Value, code: u16) {
    assert_eq!(body["code"], code, "unexpected envelope: {body}");
    assert!(body["message"].is_string());
    assert!(body.get("data").is_some(), "data key must always be present");
}

// --- Health ---

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app();

    let (status, body) = send(&app, Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_envelope(&body, 200);
    assert_eq!(body["message"], "success");
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["message"], "Blog API is running");
}

// --- Auth ---

#[tokio::test]
async fn test_register_then_duplicate() {
    let app = spawn_app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({ "username": "alice", "email": "a@x.io", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_envelope(&body, 200);
    assert!(body["data"]["token"].as_str().unwrap().split('.').count() == 3);
    assert_eq!(body["data"]["user"]["username"], "alice");
    assert!(body["data"]["user"].get("password_hash").is_none());
    assert!(body["data"]["user"].get("password").is_none());

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({ "username": "alice", "email": "b@x.io", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_envelope(&body, 400);
    assert!(body["message"].as_str().unwrap().contains("already exists"));
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn test_register_invalid_input() {
    let app = spawn_app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({ "username": "al", "email": "not-an-email", "password": "123" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_envelope(&body, 400);
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("username"));
    assert!(message.contains("email"));
    assert!(message.contains("password"));
}

#[tokio::test]
async fn test_malformed_json_is_enveloped() {
    let app = spawn_app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_envelope(&body, 400);
}

#[tokio::test]
async fn test_login_round_trip() {
    let app = spawn_app();
    register(&app, "alice").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "username": "alice", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let (status, body) = send(&app, Method::GET, "/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "alice");

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "username": "alice", "password": "nope-nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_envelope(&body, 401);
}

#[tokio::test]
async fn test_profile_requires_bearer_token() {
    let app = spawn_app();
    let token = register(&app, "alice").await;

    let (status, body) = send(&app, Method::GET, "/profile", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_envelope(&body, 401);
    assert!(body["data"].is_null());

    // Right token, wrong scheme.
    let request = Request::builder()
        .uri("/profile")
        .header(header::AUTHORIZATION, format!("Basic {token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, Method::GET, "/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_envelope(&body, 200);
    assert_eq!(body["data"]["username"], "alice");
    assert!(body["data"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let app = spawn_app();
    register(&app, "alice").await;

    let tokens = blog_api::TokenService::from_config(&test_config());
    let stale = tokens
        .issue_at(1, "alice", Utc::now().timestamp() - 3 * 60 * 60)
        .unwrap();

    let (status, body) = send(&app, Method::GET, "/profile", Some(&stale), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_envelope(&body, 401);
}

#[tokio::test]
async fn test_token_from_other_secret_is_rejected() {
    let app = spawn_app();
    let forged = blog_api::TokenService::new("someone-elses-secret", 7200)
        .issue(1, "alice")
        .unwrap();

    let (status, _) = send(&app, Method::GET, "/profile", Some(&forged), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// --- Posts ---

#[tokio::test]
async fn test_create_post_requires_auth() {
    let app = spawn_app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/posts/saveOrUpdate",
        None,
        Some(json!({ "title": "t", "content": "c" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_envelope(&body, 401);
}

#[tokio::test]
async fn test_owner_delete_scenario() {
    let app = spawn_app();
    let token_a = register(&app, "alice").await;
    let token_b = register(&app, "bob").await;
    let post_id = create_post(&app, &token_a, "Alice's post").await;
    let uri = format!("/posts/{post_id}");

    // Bob may not delete Alice's post.
    let (status, body) = send(&app, Method::DELETE, &uri, Some(&token_b), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_envelope(&body, 400);

    let (status, body) = send(&app, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Alice's post");
    assert_eq!(body["data"]["author"], "alice");

    // Anonymous delete never reaches the owner check.
    let (status, _) = send(&app, Method::DELETE, &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Alice may.
    let (status, body) = send(&app, Method::DELETE, &uri, Some(&token_a), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_envelope(&body, 200);
    assert!(body["data"].is_null());

    let (status, body) = send(&app, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_envelope(&body, 404);
}

#[tokio::test]
async fn test_update_by_non_owner_is_refused() {
    let app = spawn_app();
    let token_a = register(&app, "alice").await;
    let token_b = register(&app, "bob").await;
    let post_id = create_post(&app, &token_a, "Original").await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/posts/saveOrUpdate",
        Some(&token_b),
        Some(json!({ "postID": post_id, "title": "Defaced", "content": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::POST,
        "/posts/saveOrUpdate",
        Some(&token_a),
        Some(json!({ "postID": post_id, "title": "Revised", "content": "y" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], post_id);
    assert_eq!(body["data"]["title"], "Revised");
}

#[tokio::test]
async fn test_post_title_too_long_is_rejected() {
    let app = spawn_app();
    let token = register(&app, "alice").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/posts/saveOrUpdate",
        Some(&token),
        Some(json!({ "title": "x".repeat(101), "content": "c" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("title"));
}

#[tokio::test]
async fn test_non_numeric_post_id_is_bad_request() {
    let app = spawn_app();

    let (status, body) = send(&app, Method::GET, "/posts/abc", None, None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_envelope(&body, 400);
}

#[tokio::test]
async fn test_missing_post_is_not_found() {
    let app = spawn_app();

    let (status, body) = send(&app, Method::GET, "/posts/9999", None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_envelope(&body, 404);
}

// --- Listing ---

#[tokio::test]
async fn test_list_posts_pagination() {
    let app = spawn_app();
    let token = register(&app, "alice").await;
    for i in 1..=3 {
        create_post(&app, &token, &format!("post {i}")).await;
    }

    let (status, body) = send(&app, Method::GET, "/posts?page=2&size=2", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["total"], 3);
    assert_eq!(data["page"], 2);
    assert_eq!(data["size"], 2);
    assert_eq!(data["total_page"], 2);
    assert_eq!(data["list"].as_array().unwrap().len(), 1);
    assert_eq!(data["list"][0]["title"], "post 1");
    assert_eq!(data["list"][0]["comment_count"], 0);

    // Unusable values fall back to the defaults instead of failing.
    let (status, body) = send(&app, Method::GET, "/posts?page=0&size=abc", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["page"], 1);
    assert_eq!(body["data"]["size"], 10);
    assert_eq!(body["data"]["list"][0]["title"], "post 3");
}

#[tokio::test]
async fn test_list_posts_huge_page_is_empty() {
    let app = spawn_app();
    let token = register(&app, "alice").await;
    create_post(&app, &token, "only").await;

    let (status, body) = send(
        &app,
        Method::GET,
        "/posts?page=9223372036854775807&size=100",
        None,
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_envelope(&body, 200);
    assert_eq!(body["data"]["page"], i64::MAX);
    assert_eq!(body["data"]["total"], 1);
    assert!(body["data"]["list"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unparsable_query_string_falls_back_to_defaults() {
    let app = spawn_app();
    let token = register(&app, "alice").await;
    let post_id = create_post(&app, &token, "only").await;

    for uri in [
        "/posts?page=1&page=2".to_string(),
        "/posts?size=%ZZ".to_string(),
        format!("/posts/{post_id}/comments?size=1&size=2"),
    ] {
        let (status, body) = send(&app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::OK, "{uri}: {body}");
        assert_envelope(&body, 200);
        assert_eq!(body["data"]["page"], 1);
        assert_eq!(body["data"]["size"], 10);
    }
}

// --- Comments ---

#[tokio::test]
async fn test_comments_flow() {
    let app = spawn_app();
    let token_a = register(&app, "alice").await;
    let token_b = register(&app, "bob").await;
    let post_id = create_post(&app, &token_a, "Thread").await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/posts/{post_id}/comment"),
        Some(&token_b),
        Some(json!({ "content": "Nice post" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["author"], "bob");
    assert_eq!(body["data"]["post_id"], post_id);

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/posts/{post_id}/comment"),
        None,
        Some(json!({ "content": "anonymous" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, Method::GET, &format!("/posts/{post_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["comments"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["comments"][0]["content"], "Nice post");

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/posts/{post_id}/comments"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);

    let (status, body) = send(&app, Method::GET, "/posts", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["list"][0]["comment_count"], 1);
}

#[tokio::test]
async fn test_comment_on_missing_post() {
    let app = spawn_app();
    let token = register(&app, "alice").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/posts/4242/comment",
        Some(&token),
        Some(json!({ "content": "hello" })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_envelope(&body, 404);
}

// --- Failures ---

#[tokio::test]
async fn test_failing_store_returns_internal_error() {
    let app = spawn_app_with(InMemoryRepository::new_failing());

    let (status, body) = send(&app, Method::GET, "/posts", None, None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_envelope(&body, 500);
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn test_unknown_path_is_enveloped() {
    let app = spawn_app();

    let (status, body) = send(&app, Method::GET, "/nope", None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_envelope(&body, 404);
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn test_register_without_signing_secret_is_internal_error() {
    let app = spawn_app_with_config(AppConfig {
        jwt_secret: String::new(),
        ..AppConfig::default()
    });

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({ "username": "alice", "email": "a@x.io", "password": "secret1" })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_envelope(&body, 500);
    assert!(!body["message"].as_str().unwrap().contains("secret"));
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let app = spawn_app();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert!(response.headers().contains_key("x-request-id"));
}
