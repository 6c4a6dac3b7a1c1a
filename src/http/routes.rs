use axum::{routing::delete, routing::get, routing::patch, routing::post, Router};

use crate::AppState;
use crate::http::handlers;

pub fn health() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::health))
        .route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
}

pub fn profile() -> Router<AppState> {
    Router::new()
        .route("/me", get(handlers::get_profile))
        .route("/me", patch(handlers::update_profile))
}

pub fn posts() -> Router<AppState> {
    Router::new()
        .route("/posts", get(handlers::list_posts))
        .route("/posts", post(handlers::create_post))
        .route("/posts/:id/like", post(handlers::toggle_like))
        .route("/posts/:id/delete", delete(handlers::delete_post))
}

pub fn admin() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(handlers::admin_list_users))
        .route("/admin/users/:id", delete(handlers::admin_delete_user))
        .route("/admin/users/:id/approval", post(handlers::admin_set_approval))
        .route("/admin/users/:id/restore", post(handlers::admin_restore_user))
        .route("/admin/posts", get(handlers::admin_list_posts))
        .route("/admin/posts/:id", delete(handlers::admin_delete_post))
        .route("/admin/posts/:id/restore", post(handlers::admin_restore_post))
        .route("/admin/purge", post(handlers::admin_purge))
}
