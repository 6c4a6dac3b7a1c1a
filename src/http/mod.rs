use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

use crate::AppState;

mod auth;
mod error;
mod extract;
mod handlers;
mod routes;

pub use error::AppError;
pub use auth::{AdminUser, AuthUser};
pub use extract::JsonBody;

/// All routes, with request bodies capped at `state.max_body_bytes`.
pub fn router(state: AppState) -> Router {
    let max_body_bytes = state.max_body_bytes;
    Router::new()
        .merge(routes::health())
        .merge(routes::auth())
        .merge(routes::profile())
        .merge(routes::posts())
        .merge(routes::admin())
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}
