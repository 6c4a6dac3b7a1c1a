//! `/me`: profile view with stats and partial updates.

mod common;

use axum::http::StatusCode;
use common::{app, png_base64, TestApp};
use serde_json::json;
use time::OffsetDateTime;
use townsquare::infra::storage::MemoryPictureStore;

#[tokio::test]
async fn profile_counts_live_posts_and_their_likes() {
    let app = app();
    let user = app.create_user("stats").await;
    let fan = app.create_user("fan").await;

    let liked = app.create_post(user.id, "liked").await;
    app.create_post(user.id, "plain").await;
    let trashed = app.create_post(user.id, "trashed").await;
    app.post(&format!("/posts/{}/like", liked), Some(&fan.token)).await;
    app.post(&format!("/posts/{}/like", trashed), Some(&fan.token)).await;
    app.soft_delete_post_at(trashed, OffsetDateTime::now_utc()).await;

    let resp = app.get("/me", Some(&user.token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["user"]["email"], "stats@example.com");
    assert_eq!(body["stats"]["total_posts"], 2);
    assert_eq!(body["stats"]["total_likes"], 1);
}

#[tokio::test]
async fn update_profile_is_partial() {
    let app = app();
    let user = app.create_user("partial").await;

    let set = app
        .patch_json("/me", json!({ "description": "hello" }), Some(&user.token))
        .await;
    assert_eq!(set.status, StatusCode::OK);
    assert_eq!(set.json()["user"]["description"], "hello");
    assert_eq!(set.json()["user"]["name"], "partial");

    let renamed = app
        .patch_json("/me", json!({ "name": "renamed" }), Some(&user.token))
        .await;
    assert_eq!(renamed.json()["user"]["name"], "renamed");
    assert_eq!(renamed.json()["user"]["description"], "hello");

    let cleared = app
        .patch_json("/me", json!({ "description": null }), Some(&user.token))
        .await;
    assert_eq!(cleared.status, StatusCode::OK);
    assert!(cleared.json()["user"]["description"].is_null());
}

#[tokio::test]
async fn update_profile_validates_fields() {
    let app = app();
    let user = app.create_user("invalid").await;

    let resp = app
        .patch_json(
            "/me",
            json!({ "name": "", "profile_picture": "bm90IGFuIGltYWdl" }),
            Some(&user.token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(!resp.field_errors("name").is_empty());
    assert!(!resp.field_errors("profile_picture").is_empty());
}

#[tokio::test]
async fn new_picture_replaces_and_discards_the_old_one() {
    let app = app();
    let user = app.create_user("pictured").await;

    let first = app
        .patch_json("/me", json!({ "profile_picture": png_base64() }), Some(&user.token))
        .await;
    assert_eq!(first.status, StatusCode::OK);
    let first_key = first.json()["user"]["profile_picture"].as_str().unwrap().to_string();
    assert!(app.pictures.contains(&first_key));

    let second = app
        .patch_json("/me", json!({ "profile_picture": png_base64() }), Some(&user.token))
        .await;
    let second_key = second.json()["user"]["profile_picture"].as_str().unwrap().to_string();

    assert_ne!(first_key, second_key);
    assert!(app.pictures.contains(&second_key));
    assert!(!app.pictures.contains(&first_key));
    assert_eq!(app.pictures.len(), 1);
}

#[tokio::test]
async fn failed_cleanup_of_old_picture_is_not_an_error() {
    let app = TestApp::with_pictures(MemoryPictureStore::failing_deletes());
    let user = app.create_user("sticky").await;

    app.patch_json("/me", json!({ "profile_picture": png_base64() }), Some(&user.token))
        .await;
    let resp = app
        .patch_json("/me", json!({ "profile_picture": png_base64() }), Some(&user.token))
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(app.pictures.len(), 2);
}
