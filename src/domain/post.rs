use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::deletion::DeletionMarker;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
    #[serde(skip)]
    pub deletion_seq: Option<i64>,
}

impl Post {
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    pub fn deletion(&self) -> Option<DeletionMarker> {
        DeletionMarker::from_columns(self.deleted_at, self.deletion_seq)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostAuthor {
    pub id: Uuid,
    pub name: String,
    pub profile_picture: Option<String>,
}

/// A post as shown in listings: author and like counters attached.
#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub author: PostAuthor,
    pub likes_count: i64,
    pub is_liked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostFilter {
    Live,
    Trashed,
    WithTrashed,
}

impl Default for PostFilter {
    fn default() -> Self {
        Self::Live
    }
}

impl PostFilter {
    pub fn matches(&self, post: &Post) -> bool {
        match self {
            Self::Live => post.is_live(),
            Self::Trashed => !post.is_live(),
            Self::WithTrashed => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeCandidate {
    pub id: Uuid,
    pub deleted_at: OffsetDateTime,
    pub deletion_seq: i64,
}

/// One queued purge. Carries the marker seen by the sweep so a post that was
/// restored or deleted again in the meantime is left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeJob {
    pub post_id: Uuid,
    pub deletion_seq: i64,
}

impl From<PurgeCandidate> for PurgeJob {
    fn from(candidate: PurgeCandidate) -> Self {
        Self {
            post_id: candidate.id,
            deletion_seq: candidate.deletion_seq,
        }
    }
}
