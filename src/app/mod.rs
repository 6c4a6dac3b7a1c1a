pub mod admin;
pub mod auth;
pub mod cascade;
pub mod engagement;
pub mod error;
pub mod pictures;
pub mod posts;
pub mod purge;
pub mod users;

use crate::infra::repo::Cursor;

pub use error::{ServiceError, ServiceResult};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<Cursor>,
}

impl<T> Page<T> {
    /// `rows` must have been fetched with `limit + 1`; the extra row only
    /// signals that another page exists.
    pub fn from_overfetch(mut rows: Vec<T>, limit: i64, position: impl Fn(&T) -> Cursor) -> Self {
        let limit = limit.max(0) as usize;
        let has_more = rows.len() > limit;
        rows.truncate(limit);
        let next_cursor = if has_more { rows.last().map(position) } else { None };
        Self {
            items: rows,
            next_cursor,
        }
    }
}

pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}
