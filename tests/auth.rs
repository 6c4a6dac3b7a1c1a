//! Registration, login and token lifecycle.

mod common;

use axum::http::StatusCode;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use common::{app, png_base64, DEFAULT_PASSWORD, PNG_BYTES};
use serde_json::json;

/// A PNG-sniffable payload of `len` bytes, base64 encoded.
fn png_of_len(len: usize) -> String {
    let mut bytes = PNG_BYTES.to_vec();
    bytes.resize(len, 0);
    STANDARD.encode(bytes)
}

// ===========================================================================
// Registration
// ===========================================================================

#[tokio::test]
async fn register_creates_unapproved_user() {
    let app = app();

    let resp = app
        .post_json(
            "/register",
            json!({ "name": "Ada", "email": "ada@example.com", "password": "hunter22" }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(resp.json()["message"], "Registered, but approval is expected.");

    let login = app
        .post_json(
            "/login",
            json!({ "email": "ada@example.com", "password": "hunter22" }),
            None,
        )
        .await;
    assert_eq!(login.status, StatusCode::FORBIDDEN);
    assert_eq!(login.error_message(), "user is awaiting approval");
    assert_eq!(app.memory.token_count(), 0);
}

#[tokio::test]
async fn register_reports_every_invalid_field() {
    let app = app();

    let resp = app
        .post_json(
            "/register",
            json!({
                "name": "",
                "email": "not-an-email",
                "password": "short",
                "description": "d".repeat(256)
            }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(resp.field_errors("name"), vec!["name must be between 1 and 255 characters"]);
    assert_eq!(resp.field_errors("email"), vec!["email must be a valid email address"]);
    assert_eq!(resp.field_errors("password"), vec!["password must be at least 7 characters"]);
    assert_eq!(resp.field_errors("description"), vec!["description must be at most 255 characters"]);
}

#[tokio::test]
async fn register_rejects_email_of_trashed_user() {
    let app = app();
    let admin = app.create_admin("admin").await;
    let user = app.create_user("taken").await;

    let deleted = app
        .delete(&format!("/admin/users/{}", user.id), Some(&admin.token))
        .await;
    assert_eq!(deleted.status, StatusCode::OK);

    let resp = app
        .post_json(
            "/register",
            json!({ "name": "Again", "email": user.email, "password": "hunter22" }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(resp.field_errors("email"), vec!["email has already been taken"]);
}

#[tokio::test]
async fn register_stores_profile_picture() {
    let app = app();

    let resp = app
        .post_json(
            "/register",
            json!({
                "name": "Pic",
                "email": "pic@example.com",
                "password": "hunter22",
                "profile_picture": png_base64()
            }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(app.pictures.len(), 1);
}

#[tokio::test]
async fn register_accepts_picture_near_the_size_limit() {
    let app = app();

    let resp = app
        .post_json(
            "/register",
            json!({
                "name": "Big",
                "email": "big@example.com",
                "password": "hunter22",
                "profile_picture": png_of_len(1_800_000)
            }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(app.pictures.len(), 1);
}

#[tokio::test]
async fn register_reports_oversized_picture_per_field() {
    let app = app();

    let resp = app
        .post_json(
            "/register",
            json!({
                "name": "Huge",
                "email": "huge@example.com",
                "password": "hunter22",
                "profile_picture": png_of_len(2 * 1024 * 1024 + 1)
            }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        resp.field_errors("profile_picture"),
        vec!["profile_picture must not be larger than 2048 kilobytes"]
    );
    assert!(app.pictures.is_empty());
}

#[tokio::test]
async fn register_reports_missing_fields_per_field() {
    let app = app();

    let resp = app
        .post_json("/register", json!({ "email": "x@example.com" }), None)
        .await;

    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(resp.error_message(), "the given data was invalid");
    assert!(!resp.field_errors("password").is_empty());
    assert!(!resp.field_errors("name").is_empty());
    assert!(resp.field_errors("email").is_empty());
}

#[tokio::test]
async fn mistyped_body_gets_a_json_error() {
    let app = app();

    let resp = app
        .post_json(
            "/register",
            json!({ "name": 42, "email": "x@example.com", "password": "hunter22" }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(!resp.error_message().is_empty());
}

#[tokio::test]
async fn register_rejects_non_image_picture() {
    let app = app();

    let resp = app
        .post_json(
            "/register",
            json!({
                "name": "Pic",
                "email": "pic@example.com",
                "password": "hunter22",
                "profile_picture": "aGVsbG8gd29ybGQ="
            }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        resp.field_errors("profile_picture"),
        vec!["profile_picture must be a file of type: jpeg, png, webp"]
    );
    assert!(app.pictures.is_empty());
}

// ===========================================================================
// Login
// ===========================================================================

#[tokio::test]
async fn login_valid_credentials() {
    let app = app();
    let user = app.create_user("login").await;

    let resp = app
        .post_json(
            "/login",
            json!({ "email": user.email, "password": DEFAULT_PASSWORD }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["user"]["id"], user.id.to_string());
    assert!(body["user"].get("password_hash").is_none());

    let token = body["token"].as_str().unwrap();
    let me = app.get("/me", Some(token)).await;
    assert_eq!(me.status, StatusCode::OK);
}

#[tokio::test]
async fn login_invalid_password() {
    let app = app();
    let user = app.create_user("badpw").await;

    let resp = app
        .post_json(
            "/login",
            json!({ "email": user.email, "password": "wrongpassword" }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error_message(), "invalid credentials");
}

#[tokio::test]
async fn login_nonexistent_user() {
    let app = app();

    let resp = app
        .post_json(
            "/login",
            json!({ "email": "nobody@example.com", "password": "whatever123" }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error_message(), "invalid credentials");
}

#[tokio::test]
async fn login_malformed_email() {
    let app = app();

    let resp = app
        .post_json("/login", json!({ "email": "", "password": "whatever" }), None)
        .await;

    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(!resp.field_errors("email").is_empty());
}

#[tokio::test]
async fn approval_unlocks_login() {
    let app = app();
    let admin = app.create_admin("boss").await;
    let pending = app.insert_user("pending", false, false).await;

    let approve = app
        .post_json(
            &format!("/admin/users/{}/approval", pending),
            json!({ "approved": true }),
            Some(&admin.token),
        )
        .await;
    assert_eq!(approve.status, StatusCode::OK);
    assert_eq!(approve.json()["is_approved"], true);

    let resp = app
        .post_json(
            "/login",
            json!({ "email": "pending@example.com", "password": DEFAULT_PASSWORD }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
}

// ===========================================================================
// Tokens
// ===========================================================================

#[tokio::test]
async fn logout_revokes_only_the_presented_token() {
    let app = app();
    let user = app.create_user("twice").await;
    let other = app
        .state
        .auth_service()
        .issue_token(user.id)
        .await
        .unwrap()
        .token;

    let resp = app.post("/logout", Some(&user.token)).await;
    assert_eq!(resp.status, StatusCode::OK);

    assert_eq!(app.get("/me", Some(&user.token)).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.get("/me", Some(&other)).await.status, StatusCode::OK);
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let app = app();

    let missing = app.get("/me", None).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing.error_message(), "missing Authorization header");

    let garbage = app.get("/posts", Some("v4.local.nonsense")).await;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
    assert_eq!(garbage.error_message(), "invalid token");
}

#[tokio::test]
async fn tokens_of_deleted_users_stop_working() {
    let app = app();
    let admin = app.create_admin("root").await;
    let user = app.create_user("gone").await;

    app.delete(&format!("/admin/users/{}", user.id), Some(&admin.token))
        .await;

    assert_eq!(app.get("/me", Some(&user.token)).await.status, StatusCode::UNAUTHORIZED);
}
