use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::deletion::CascadeResult;
use crate::domain::engagement::LikeToggle;
use crate::domain::post::{Post, PostFilter, PostView, PurgeCandidate};
use crate::domain::token::NewAccessToken;
use crate::domain::user::{NewUser, ProfileChanges, ProfileStats, User, UserCredentials, UserFilter};
use crate::infra::db::Db;
use crate::infra::memory::MemoryStore;
use crate::infra::postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("duplicate {0}")]
    Duplicate(&'static str),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Keyset position in a `(created_at DESC, id DESC)` listing.
pub type Cursor = (OffsetDateTime, Uuid);

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn create(&self, new_user: NewUser) -> RepoResult<User>;
    async fn find_live(&self, user_id: Uuid) -> RepoResult<Option<User>>;
    /// Includes trashed users.
    async fn find_any(&self, user_id: Uuid) -> RepoResult<Option<User>>;
    async fn find_credentials(&self, email: &str) -> RepoResult<Option<UserCredentials>>;
    async fn email_taken(&self, email: &str) -> RepoResult<bool>;
    async fn update_profile(&self, user_id: Uuid, changes: ProfileChanges) -> RepoResult<Option<User>>;
    async fn set_approved(&self, user_id: Uuid, approved: bool) -> RepoResult<Option<User>>;
    async fn list(&self, filter: UserFilter, cursor: Option<Cursor>, limit: i64) -> RepoResult<Vec<User>>;
    async fn count_pending_approval(&self) -> RepoResult<i64>;
    async fn stats(&self, user_id: Uuid) -> RepoResult<ProfileStats>;
    /// Soft-deletes the user and every live post it owns with one marker.
    async fn soft_delete_cascade(&self, user_id: Uuid, at: OffsetDateTime) -> RepoResult<CascadeResult>;
    /// Restores the user and the posts whose marker is not older than the user's.
    async fn restore_cascade(&self, user_id: Uuid) -> RepoResult<CascadeResult>;
    /// Permanent removal; posts, likes and tokens go with the user.
    async fn force_delete(&self, user_id: Uuid) -> RepoResult<Option<User>>;
}

#[async_trait]
pub trait PostRepo: Send + Sync {
    /// `None` when the author is not live.
    async fn create(&self, user_id: Uuid, content: String) -> RepoResult<Option<PostView>>;
    async fn find_live(&self, post_id: Uuid) -> RepoResult<Option<Post>>;
    async fn find_any(&self, post_id: Uuid) -> RepoResult<Option<Post>>;
    async fn feed(&self, viewer_id: Uuid, cursor: Option<Cursor>, limit: i64) -> RepoResult<Vec<PostView>>;
    async fn list(&self, filter: PostFilter, cursor: Option<Cursor>, limit: i64) -> RepoResult<Vec<Post>>;
    /// Marks a live post deleted with a fresh marker. `false` if not live.
    async fn soft_delete(&self, post_id: Uuid, at: OffsetDateTime) -> RepoResult<bool>;
    /// Clears the marker of a trashed post. `false` if the post is live or missing.
    async fn restore(&self, post_id: Uuid) -> RepoResult<bool>;
    async fn purge_candidates(
        &self,
        cutoff: OffsetDateTime,
        after: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> RepoResult<Vec<PurgeCandidate>>;
    /// Removes the post only while it still carries `deletion_seq`.
    async fn purge(&self, post_id: Uuid, deletion_seq: i64) -> RepoResult<bool>;
}

#[async_trait]
pub trait LikeRepo: Send + Sync {
    /// `None` when the post is not live.
    async fn toggle(&self, user_id: Uuid, post_id: Uuid) -> RepoResult<Option<LikeToggle>>;
}

#[async_trait]
pub trait TokenRepo: Send + Sync {
    async fn insert(&self, token: NewAccessToken) -> RepoResult<()>;
    async fn is_active(
        &self,
        token_id: Uuid,
        user_id: Uuid,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> RepoResult<bool>;
    async fn revoke(&self, token_id: Uuid, user_id: Uuid) -> RepoResult<bool>;
}

#[derive(Clone)]
pub struct Store {
    pub users: Arc<dyn UserRepo>,
    pub posts: Arc<dyn PostRepo>,
    pub likes: Arc<dyn LikeRepo>,
    pub tokens: Arc<dyn TokenRepo>,
    db: Option<Db>,
}

impl Store {
    pub fn postgres(db: Db) -> Self {
        let store = Arc::new(PgStore::new(db.clone()));
        Self {
            users: store.clone(),
            posts: store.clone(),
            likes: store.clone(),
            tokens: store,
            db: Some(db),
        }
    }

    pub fn memory() -> Self {
        Self::from_memory(MemoryStore::new())
    }

    pub fn from_memory(memory: MemoryStore) -> Self {
        let store = Arc::new(memory);
        Self {
            users: store.clone(),
            posts: store.clone(),
            likes: store.clone(),
            tokens: store,
            db: None,
        }
    }

    pub async fn ping(&self) -> anyhow::Result<()> {
        match &self.db {
            Some(db) => db.ping().await,
            None => Ok(()),
        }
    }
}
