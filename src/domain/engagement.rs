use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeToggle {
    pub is_liked: bool,
    pub likes_count: i64,
}
