mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn first_registered_user_is_admin() {
    let app = TestApp::spawn();

    let (status, body) = app
        .post(
            "/api/auth/local/register",
            None,
            json!({ "username": "first", "email": "First@Example.com", "password": "hunter22!" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["user"]["is_admin"], true);
    assert_eq!(body["user"]["email"], "first@example.com");
    assert!(body["user"].get("password_hash").is_none());
    assert_eq!(body["token"].as_str().unwrap().len(), 64);

    let (_, body) = app
        .post(
            "/api/auth/local/register",
            None,
            json!({ "username": "second", "password": "hunter22!" }),
        )
        .await;
    assert_eq!(body["user"]["is_admin"], false);
}

#[tokio::test]
async fn registration_rejects_bad_input() {
    let app = TestApp::spawn();
    let (status, _) = app
        .post(
            "/api/auth/local/register",
            None,
            json!({ "username": "sam", "password": "short" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post("/api/auth/local/register", None, json!({ "username": "sam" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["status"], 400);

    app.post(
        "/api/auth/local/register",
        None,
        json!({ "username": "sam", "password": "long enough" }),
    )
    .await;
    let (status, body) = app
        .post(
            "/api/auth/local/register",
            None,
            json!({ "username": "sam", "password": "long enough" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Username or email is already taken");
}

#[tokio::test]
async fn login_me_logout() {
    let app = TestApp::spawn();
    app.post(
        "/api/auth/local/register",
        None,
        json!({ "username": "sam", "email": "sam@example.com", "password": "long enough" }),
    )
    .await;

    let (status, _) = app
        .post(
            "/api/auth/local",
            None,
            json!({ "identifier": "sam", "password": "wrong password" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post(
            "/api/auth/local",
            None,
            json!({ "identifier": "SAM@example.com", "password": "long enough" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = app.get("/api/users/me", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "sam");

    let (status, _) = app
        .request(Method::POST, "/api/auth/logout", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get("/api/users/me", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_checks_the_database() {
    let app = TestApp::spawn();
    let (status, body) = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
