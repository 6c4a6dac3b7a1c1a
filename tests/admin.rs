//! Administrator listings and access control.

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::{json, Value};
use uuid::Uuid;

fn ids(body: &Value) -> Vec<String> {
    body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn admin_routes_reject_regular_users() {
    let app = app();
    let user = app.create_user("plain").await;

    for path in ["/admin/users", "/admin/posts"] {
        let resp = app.get(path, Some(&user.token)).await;
        assert_eq!(resp.status, StatusCode::FORBIDDEN);
        assert_eq!(resp.error_message(), "admin access required");
    }

    let purge = app.post("/admin/purge", Some(&user.token)).await;
    assert_eq!(purge.status, StatusCode::FORBIDDEN);

    let anonymous = app.get("/admin/users", None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn user_listing_filters_and_pending_count() {
    let app = app();
    let admin = app.create_admin("admin").await;
    let live = app.create_user("live").await;
    let pending = app.insert_user("pending", false, false).await;
    let gone = app.create_user("gone").await;
    app.delete(&format!("/admin/users/{}", gone.id), Some(&admin.token))
        .await;

    let default = app.get("/admin/users", Some(&admin.token)).await;
    assert_eq!(default.status, StatusCode::OK);
    let body = default.json();
    assert_eq!(body["pending_approvals"], 1);
    let listed = ids(&body);
    assert_eq!(listed.len(), 3);
    assert!(listed.contains(&live.id.to_string()));
    assert!(listed.contains(&pending.to_string()));
    assert!(!listed.contains(&gone.id.to_string()));

    let unapproved = app
        .get("/admin/users?filter=unapproved", Some(&admin.token))
        .await
        .json();
    assert_eq!(ids(&unapproved), vec![pending.to_string()]);

    let trashed = app
        .get("/admin/users?filter=trashed", Some(&admin.token))
        .await
        .json();
    assert_eq!(ids(&trashed), vec![gone.id.to_string()]);
    assert!(!trashed["items"][0]["deleted_at"].is_null());

    let everyone = app
        .get("/admin/users?filter=with_trashed", Some(&admin.token))
        .await
        .json();
    assert_eq!(ids(&everyone).len(), 4);
}

#[tokio::test]
async fn user_listing_pages_with_a_cursor() {
    let app = app();
    let admin = app.create_admin("admin").await;
    for i in 0..4 {
        app.insert_user(&format!("member{}", i), true, false).await;
    }

    let first = app
        .get("/admin/users?limit=3", Some(&admin.token))
        .await
        .json();
    assert_eq!(ids(&first).len(), 3);
    let cursor = first["next_cursor"].as_str().unwrap().to_string();

    let second = app
        .get(
            &format!(
                "/admin/users?limit=3&cursor={}",
                cursor.replace('+', "%2B").replace(':', "%3A")
            ),
            Some(&admin.token),
        )
        .await
        .json();
    assert_eq!(ids(&second).len(), 2);
    assert!(second["next_cursor"].is_null());
    assert!(ids(&second).iter().all(|id| !ids(&first).contains(id)));
}

#[tokio::test]
async fn unknown_filter_is_rejected() {
    let app = app();
    let admin = app.create_admin("admin").await;

    let resp = app
        .get("/admin/users?filter=everyone", Some(&admin.token))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn approval_of_unknown_user_is_not_found() {
    let app = app();
    let admin = app.create_admin("admin").await;

    let resp = app
        .post_json(
            &format!("/admin/users/{}/approval", Uuid::new_v4()),
            json!({ "approved": true }),
            Some(&admin.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_message(), "user not found");
}

#[tokio::test]
async fn post_listing_filters() {
    let app = app();
    let admin = app.create_admin("admin").await;
    let user = app.create_user("writer").await;
    let kept = app.create_post(user.id, "kept").await;
    let removed = app.create_post(user.id, "removed").await;

    let deleted = app
        .delete(&format!("/admin/posts/{}", removed), Some(&admin.token))
        .await;
    assert_eq!(deleted.status, StatusCode::OK);

    let live = app.get("/admin/posts", Some(&admin.token)).await.json();
    assert_eq!(ids(&live), vec![kept.to_string()]);

    let trashed = app
        .get("/admin/posts?filter=trashed", Some(&admin.token))
        .await
        .json();
    assert_eq!(ids(&trashed), vec![removed.to_string()]);

    let all = app
        .get("/admin/posts?filter=with_trashed", Some(&admin.token))
        .await
        .json();
    assert_eq!(ids(&all).len(), 2);

    let again = app
        .delete(&format!("/admin/posts/{}", removed), Some(&admin.token))
        .await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
}
