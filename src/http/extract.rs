use axum::extract::FromRequest;

use crate::http::AppError;

/// `axum::Json` whose rejections render as [`AppError`] bodies.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);
