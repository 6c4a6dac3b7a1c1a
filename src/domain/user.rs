use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::deletion::DeletionMarker;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub description: Option<String>,
    /// Storage key of the current picture
    pub profile_picture: Option<String>,
    pub is_approved: bool,
    pub is_admin: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
    #[serde(skip)]
    pub deletion_seq: Option<i64>,
}

impl User {
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    pub fn deletion(&self) -> Option<DeletionMarker> {
        DeletionMarker::from_columns(self.deleted_at, self.deletion_seq)
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub description: Option<String>,
    pub profile_picture: Option<String>,
    pub is_approved: bool,
    pub is_admin: bool,
}

#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

/// Partial profile update. `description: Some(None)` clears the column.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub profile_picture: Option<String>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.profile_picture.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProfileStats {
    pub total_posts: i64,
    pub total_likes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserFilter {
    Live,
    Unapproved,
    Trashed,
    WithTrashed,
}

impl Default for UserFilter {
    fn default() -> Self {
        Self::Live
    }
}

impl UserFilter {
    pub fn matches(&self, user: &User) -> bool {
        match self {
            Self::Live => user.is_live(),
            Self::Unapproved => user.is_live() && !user.is_approved,
            Self::Trashed => !user.is_live(),
            Self::WithTrashed => true,
        }
    }
}
