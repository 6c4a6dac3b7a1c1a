//! Process-local store with the same semantics as the PostgreSQL one.
//!
//! One mutex guards the whole state, so every trait method is atomic in the
//! same way a single transaction is on the database side.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::deletion::{CascadeOutcome, CascadeResult, DeletionMarker};
use crate::domain::engagement::LikeToggle;
use crate::domain::post::{Post, PostAuthor, PostFilter, PostView, PurgeCandidate};
use crate::domain::token::NewAccessToken;
use crate::domain::user::{NewUser, ProfileChanges, ProfileStats, User, UserCredentials, UserFilter};
use crate::infra::repo::{Cursor, LikeRepo, PostRepo, RepoError, RepoResult, TokenRepo, UserRepo};

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, StoredUser>,
    posts: HashMap<Uuid, Post>,
    likes: HashSet<(Uuid, Uuid)>,
    tokens: HashMap<Uuid, StoredToken>,
    deletion_seq: i64,
}

struct StoredUser {
    user: User,
    password_hash: String,
}

struct StoredToken {
    user_id: Uuid,
    token_hash: String,
    expires_at: OffsetDateTime,
    revoked_at: Option<OffsetDateTime>,
}

impl MemoryState {
    fn next_seq(&mut self) -> i64 {
        self.deletion_seq += 1;
        self.deletion_seq
    }

    fn live_user(&self, user_id: Uuid) -> Option<&User> {
        self.users
            .get(&user_id)
            .map(|stored| &stored.user)
            .filter(|user| user.is_live())
    }

    fn likes_count(&self, post_id: Uuid) -> i64 {
        self.likes.iter().filter(|(_, post)| *post == post_id).count() as i64
    }

    fn view(&self, post: &Post, viewer_id: Uuid) -> Option<PostView> {
        let author = self.users.get(&post.user_id)?;
        Some(PostView {
            post: post.clone(),
            author: PostAuthor {
                id: author.user.id,
                name: author.user.name.clone(),
                profile_picture: author.user.profile_picture.clone(),
            },
            likes_count: self.likes_count(post.id),
            is_liked: self.likes.contains(&(viewer_id, post.id)),
        })
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issued tokens, revoked ones included.
    pub fn token_count(&self) -> usize {
        self.state.lock().tokens.len()
    }
}

/// Newest first, ties broken by id, starting strictly after `cursor`.
fn page<T, F>(mut items: Vec<T>, key: F, cursor: Option<Cursor>, limit: i64) -> Vec<T>
where
    F: Fn(&T) -> Cursor,
{
    items.sort_by(|a, b| key(b).cmp(&key(a)));
    items
        .into_iter()
        .filter(|item| match cursor {
            Some(cursor) => key(item) < cursor,
            None => true,
        })
        .take(limit.max(0) as usize)
        .collect()
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn create(&self, new_user: NewUser) -> RepoResult<User> {
        let mut state = self.state.lock();
        if state.users.values().any(|stored| stored.user.email == new_user.email) {
            return Err(RepoError::Duplicate("email"));
        }

        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            email: new_user.email,
            description: new_user.description,
            profile_picture: new_user.profile_picture,
            is_approved: new_user.is_approved,
            is_admin: new_user.is_admin,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            deletion_seq: None,
        };
        state.users.insert(
            user.id,
            StoredUser {
                user: user.clone(),
                password_hash: new_user.password_hash,
            },
        );
        Ok(user)
    }

    async fn find_live(&self, user_id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.state.lock().live_user(user_id).cloned())
    }

    async fn find_any(&self, user_id: Uuid) -> RepoResult<Option<User>> {
        Ok(self
            .state
            .lock()
            .users
            .get(&user_id)
            .map(|stored| stored.user.clone()))
    }

    async fn find_credentials(&self, email: &str) -> RepoResult<Option<UserCredentials>> {
        let state = self.state.lock();
        Ok(state
            .users
            .values()
            .find(|stored| stored.user.email == email && stored.user.is_live())
            .map(|stored| UserCredentials {
                user: stored.user.clone(),
                password_hash: stored.password_hash.clone(),
            }))
    }

    async fn email_taken(&self, email: &str) -> RepoResult<bool> {
        Ok(self
            .state
            .lock()
            .users
            .values()
            .any(|stored| stored.user.email == email))
    }

    async fn update_profile(&self, user_id: Uuid, changes: ProfileChanges) -> RepoResult<Option<User>> {
        let mut state = self.state.lock();
        let Some(stored) = state.users.get_mut(&user_id).filter(|s| s.user.is_live()) else {
            return Ok(None);
        };

        if let Some(name) = changes.name {
            stored.user.name = name;
        }
        if let Some(description) = changes.description {
            stored.user.description = description;
        }
        if let Some(picture) = changes.profile_picture {
            stored.user.profile_picture = Some(picture);
        }
        stored.user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(stored.user.clone()))
    }

    async fn set_approved(&self, user_id: Uuid, approved: bool) -> RepoResult<Option<User>> {
        let mut state = self.state.lock();
        let Some(stored) = state.users.get_mut(&user_id).filter(|s| s.user.is_live()) else {
            return Ok(None);
        };
        stored.user.is_approved = approved;
        stored.user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(stored.user.clone()))
    }

    async fn list(&self, filter: UserFilter, cursor: Option<Cursor>, limit: i64) -> RepoResult<Vec<User>> {
        let state = self.state.lock();
        let users = state
            .users
            .values()
            .map(|stored| stored.user.clone())
            .filter(|user| filter.matches(user))
            .collect();
        Ok(page(users, |user| (user.created_at, user.id), cursor, limit))
    }

    async fn count_pending_approval(&self) -> RepoResult<i64> {
        let state = self.state.lock();
        Ok(state
            .users
            .values()
            .filter(|stored| UserFilter::Unapproved.matches(&stored.user))
            .count() as i64)
    }

    async fn stats(&self, user_id: Uuid) -> RepoResult<ProfileStats> {
        let state = self.state.lock();
        let mut stats = ProfileStats::default();
        for post in state.posts.values() {
            if post.user_id == user_id && post.is_live() {
                stats.total_posts += 1;
                stats.total_likes += state.likes_count(post.id);
            }
        }
        Ok(stats)
    }

    async fn soft_delete_cascade(&self, user_id: Uuid, at: OffsetDateTime) -> RepoResult<CascadeResult> {
        let mut state = self.state.lock();
        match state.users.get(&user_id) {
            None => return Ok(CascadeResult::NotFound),
            Some(stored) if !stored.user.is_live() => return Ok(CascadeResult::Unchanged),
            Some(_) => {}
        }

        let marker = DeletionMarker {
            at,
            seq: state.next_seq(),
        };
        let now = OffsetDateTime::now_utc();
        if let Some(stored) = state.users.get_mut(&user_id) {
            stored.user.deleted_at = Some(marker.at);
            stored.user.deletion_seq = Some(marker.seq);
            stored.user.updated_at = now;
        }

        let mut posts_affected = 0;
        for post in state.posts.values_mut() {
            if post.user_id == user_id && post.is_live() {
                post.deleted_at = Some(marker.at);
                post.deletion_seq = Some(marker.seq);
                post.updated_at = now;
                posts_affected += 1;
            }
        }

        Ok(CascadeResult::Applied(CascadeOutcome {
            user_id,
            marker,
            posts_affected,
        }))
    }

    async fn restore_cascade(&self, user_id: Uuid) -> RepoResult<CascadeResult> {
        let mut state = self.state.lock();
        let marker = match state.users.get(&user_id) {
            None => return Ok(CascadeResult::NotFound),
            Some(stored) => match stored.user.deletion() {
                Some(marker) => marker,
                None => return Ok(CascadeResult::Unchanged),
            },
        };

        let now = OffsetDateTime::now_utc();
        let mut posts_affected = 0;
        for post in state.posts.values_mut() {
            if post.user_id != user_id {
                continue;
            }
            if let Some(post_marker) = post.deletion() {
                if post_marker.restored_with(&marker) {
                    post.deleted_at = None;
                    post.deletion_seq = None;
                    post.updated_at = now;
                    posts_affected += 1;
                }
            }
        }

        if let Some(stored) = state.users.get_mut(&user_id) {
            stored.user.deleted_at = None;
            stored.user.deletion_seq = None;
            stored.user.updated_at = now;
        }

        Ok(CascadeResult::Applied(CascadeOutcome {
            user_id,
            marker,
            posts_affected,
        }))
    }

    async fn force_delete(&self, user_id: Uuid) -> RepoResult<Option<User>> {
        let mut state = self.state.lock();
        let Some(stored) = state.users.remove(&user_id) else {
            return Ok(None);
        };

        let owned: HashSet<Uuid> = state
            .posts
            .values()
            .filter(|post| post.user_id == user_id)
            .map(|post| post.id)
            .collect();
        state.posts.retain(|id, _| !owned.contains(id));
        state
            .likes
            .retain(|(liker, post)| *liker != user_id && !owned.contains(post));
        state.tokens.retain(|_, token| token.user_id != user_id);

        Ok(Some(stored.user))
    }
}

#[async_trait]
impl PostRepo for MemoryStore {
    async fn create(&self, user_id: Uuid, content: String) -> RepoResult<Option<PostView>> {
        let mut state = self.state.lock();
        if state.live_user(user_id).is_none() {
            return Ok(None);
        }

        let now = OffsetDateTime::now_utc();
        let post = Post {
            id: Uuid::new_v4(),
            user_id,
            content,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            deletion_seq: None,
        };
        state.posts.insert(post.id, post.clone());
        Ok(state.view(&post, user_id))
    }

    async fn find_live(&self, post_id: Uuid) -> RepoResult<Option<Post>> {
        Ok(self
            .state
            .lock()
            .posts
            .get(&post_id)
            .filter(|post| post.is_live())
            .cloned())
    }

    async fn find_any(&self, post_id: Uuid) -> RepoResult<Option<Post>> {
        Ok(self.state.lock().posts.get(&post_id).cloned())
    }

    async fn feed(&self, viewer_id: Uuid, cursor: Option<Cursor>, limit: i64) -> RepoResult<Vec<PostView>> {
        let state = self.state.lock();
        let posts: Vec<Post> = state
            .posts
            .values()
            .filter(|post| post.is_live() && state.live_user(post.user_id).is_some())
            .cloned()
            .collect();
        let posts = page(posts, |post| (post.created_at, post.id), cursor, limit);
        Ok(posts
            .iter()
            .filter_map(|post| state.view(post, viewer_id))
            .collect())
    }

    async fn list(&self, filter: PostFilter, cursor: Option<Cursor>, limit: i64) -> RepoResult<Vec<Post>> {
        let state = self.state.lock();
        let posts = state
            .posts
            .values()
            .filter(|post| filter.matches(post))
            .cloned()
            .collect();
        Ok(page(posts, |post| (post.created_at, post.id), cursor, limit))
    }

    async fn soft_delete(&self, post_id: Uuid, at: OffsetDateTime) -> RepoResult<bool> {
        let mut state = self.state.lock();
        if !state.posts.get(&post_id).is_some_and(|post| post.is_live()) {
            return Ok(false);
        }
        let seq = state.next_seq();
        if let Some(post) = state.posts.get_mut(&post_id) {
            post.deleted_at = Some(at);
            post.deletion_seq = Some(seq);
            post.updated_at = OffsetDateTime::now_utc();
        }
        Ok(true)
    }

    async fn restore(&self, post_id: Uuid) -> RepoResult<bool> {
        let mut state = self.state.lock();
        match state.posts.get_mut(&post_id) {
            Some(post) if !post.is_live() => {
                post.deleted_at = None;
                post.deletion_seq = None;
                post.updated_at = OffsetDateTime::now_utc();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn purge_candidates(
        &self,
        cutoff: OffsetDateTime,
        after: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> RepoResult<Vec<PurgeCandidate>> {
        let state = self.state.lock();
        let mut candidates: Vec<PurgeCandidate> = state
            .posts
            .values()
            .filter_map(|post| {
                let marker = post.deletion()?;
                (marker.at <= cutoff).then_some(PurgeCandidate {
                    id: post.id,
                    deleted_at: marker.at,
                    deletion_seq: marker.seq,
                })
            })
            .filter(|candidate| match after {
                Some(after) => (candidate.deleted_at, candidate.id) > after,
                None => true,
            })
            .collect();
        candidates.sort_by_key(|candidate| (candidate.deleted_at, candidate.id));
        candidates.truncate(limit.max(0) as usize);
        Ok(candidates)
    }

    async fn purge(&self, post_id: Uuid, deletion_seq: i64) -> RepoResult<bool> {
        let mut state = self.state.lock();
        if !state
            .posts
            .get(&post_id)
            .is_some_and(|post| post.deletion_seq == Some(deletion_seq))
        {
            return Ok(false);
        }
        state.posts.remove(&post_id);
        state.likes.retain(|(_, post)| *post != post_id);
        Ok(true)
    }
}

#[async_trait]
impl LikeRepo for MemoryStore {
    async fn toggle(&self, user_id: Uuid, post_id: Uuid) -> RepoResult<Option<LikeToggle>> {
        let mut state = self.state.lock();
        if !state.posts.get(&post_id).is_some_and(|post| post.is_live()) {
            return Ok(None);
        }

        let key = (user_id, post_id);
        let is_liked = if state.likes.remove(&key) {
            false
        } else {
            state.likes.insert(key);
            true
        };

        Ok(Some(LikeToggle {
            is_liked,
            likes_count: state.likes_count(post_id),
        }))
    }
}

#[async_trait]
impl TokenRepo for MemoryStore {
    async fn insert(&self, token: NewAccessToken) -> RepoResult<()> {
        self.state.lock().tokens.insert(
            token.id,
            StoredToken {
                user_id: token.user_id,
                token_hash: token.token_hash,
                expires_at: token.expires_at,
                revoked_at: None,
            },
        );
        Ok(())
    }

    async fn is_active(
        &self,
        token_id: Uuid,
        user_id: Uuid,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> RepoResult<bool> {
        let state = self.state.lock();
        Ok(state.tokens.get(&token_id).is_some_and(|token| {
            token.user_id == user_id
                && token.token_hash == token_hash
                && token.revoked_at.is_none()
                && token.expires_at > now
        }))
    }

    async fn revoke(&self, token_id: Uuid, user_id: Uuid) -> RepoResult<bool> {
        let mut state = self.state.lock();
        match state.tokens.get_mut(&token_id) {
            Some(token) if token.user_id == user_id && token.revoked_at.is_none() => {
                token.revoked_at = Some(OffsetDateTime::now_utc());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
