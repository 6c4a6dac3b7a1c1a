//! User soft deletion, restoration and permanent removal.

mod common;

use axum::http::StatusCode;
use common::{app, png_base64};
use serde_json::json;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

#[tokio::test]
async fn restore_skips_posts_deleted_before_the_user() {
    let app = app();
    let admin = app.create_admin("admin").await;
    let user = app.create_user("u").await;

    let a = app.create_post(user.id, "A").await;
    let b = app.create_post(user.id, "B").await;

    // T1: the owner deletes B
    let resp = app.delete(&format!("/posts/{}/delete", b), Some(&user.token)).await;
    assert_eq!(resp.status, StatusCode::OK);

    // T2: the user is deleted, A goes with it
    let deleted = app
        .delete(&format!("/admin/users/{}", user.id), Some(&admin.token))
        .await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.json()["posts_affected"], 1);
    assert_eq!(app.post_is_live(a).await, Some(false));
    assert_eq!(app.post_is_live(b).await, Some(false));

    // T3: restore brings back A only
    let restored = app
        .post(&format!("/admin/users/{}/restore", user.id), Some(&admin.token))
        .await;
    assert_eq!(restored.status, StatusCode::OK);
    assert_eq!(restored.json()["posts_affected"], 1);
    assert_eq!(app.post_is_live(a).await, Some(true));
    assert_eq!(app.post_is_live(b).await, Some(false));
}

#[tokio::test]
async fn same_instant_deletions_are_ordered_by_sequence() {
    let app = app();
    let admin = app.create_admin("admin").await;
    let user = app.create_user("same").await;
    let early = app.create_post(user.id, "early").await;
    let swept = app.create_post(user.id, "swept").await;

    // The user-level deletion below happens "now"; give the owner's own
    // deletion a timestamp in the future so wall-clock order disagrees with
    // the real order.
    app.soft_delete_post_at(early, OffsetDateTime::now_utc() + Duration::seconds(5))
        .await;
    app.delete(&format!("/admin/users/{}", user.id), Some(&admin.token))
        .await;
    app.post(&format!("/admin/users/{}/restore", user.id), Some(&admin.token))
        .await;

    assert_eq!(app.post_is_live(swept).await, Some(true));
    assert_eq!(app.post_is_live(early).await, Some(false));
}

#[tokio::test]
async fn cascade_state_conflicts() {
    let app = app();
    let admin = app.create_admin("admin").await;
    let user = app.create_user("twice").await;

    let restore_live = app
        .post(&format!("/admin/users/{}/restore", user.id), Some(&admin.token))
        .await;
    assert_eq!(restore_live.status, StatusCode::CONFLICT);
    assert_eq!(restore_live.error_message(), "user is not deleted");

    app.delete(&format!("/admin/users/{}", user.id), Some(&admin.token))
        .await;
    let delete_again = app
        .delete(&format!("/admin/users/{}", user.id), Some(&admin.token))
        .await;
    assert_eq!(delete_again.status, StatusCode::CONFLICT);

    let unknown = app
        .delete(&format!("/admin/users/{}", Uuid::new_v4()), Some(&admin.token))
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
    assert_eq!(unknown.error_message(), "user not found");
}

#[tokio::test]
async fn post_of_deleted_author_cannot_be_restored_alone() {
    let app = app();
    let admin = app.create_admin("admin").await;
    let user = app.create_user("author").await;
    let post = app.create_post(user.id, "orphan").await;

    app.delete(&format!("/admin/users/{}", user.id), Some(&admin.token))
        .await;

    let resp = app
        .post(&format!("/admin/posts/{}/restore", post), Some(&admin.token))
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.error_message(), "post author is deleted");
}

#[tokio::test]
async fn admin_can_restore_a_post_explicitly() {
    let app = app();
    let admin = app.create_admin("admin").await;
    let user = app.create_user("author").await;
    let post = app.create_post(user.id, "oops").await;

    let deleted = app
        .delete(&format!("/admin/posts/{}", post), Some(&admin.token))
        .await;
    assert_eq!(deleted.status, StatusCode::OK);

    let restored = app
        .post(&format!("/admin/posts/{}/restore", post), Some(&admin.token))
        .await;
    assert_eq!(restored.status, StatusCode::OK);
    assert!(restored.json()["deleted_at"].is_null());
    assert_eq!(app.post_is_live(post).await, Some(true));

    let live = app
        .post(&format!("/admin/posts/{}/restore", post), Some(&admin.token))
        .await;
    assert_eq!(live.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn force_delete_removes_everything() {
    let app = app();
    let admin = app.create_admin("admin").await;
    let user = app.create_user("forced").await;

    app.patch_json("/me", json!({ "profile_picture": png_base64() }), Some(&user.token))
        .await;
    assert_eq!(app.pictures.len(), 1);
    let post = app.create_post(user.id, "doomed").await;

    let resp = app
        .delete(&format!("/admin/users/{}?force=true", user.id), Some(&admin.token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["message"], "User is permanently deleted.");

    assert_eq!(app.post_is_live(post).await, None);
    assert!(app.pictures.is_empty());
    assert_eq!(
        app.post_json(
            "/register",
            json!({ "name": "Reborn", "email": user.email, "password": "hunter22" }),
            None,
        )
        .await
        .status,
        StatusCode::CREATED
    );
}
