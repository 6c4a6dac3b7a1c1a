use serde::Deserialize;
use time::OffsetDateTime;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::app::error::{field_error, ServiceError, ServiceResult};
use crate::app::{Page, DEFAULT_PAGE_SIZE};
use crate::domain::post::{Post, PostFilter, PostView};
use crate::infra::repo::{Cursor, Store};

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostInput {
    #[serde(default)]
    #[validate(
        length(min = 1, max = 1000, message = "content must be between 1 and 1000 characters"),
        custom(function = "not_blank")
    )]
    pub content: String,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(field_error("required", "content must not be blank"));
    }
    Ok(())
}

#[derive(Clone)]
pub struct PostService {
    store: Store,
}

impl PostService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Live posts of live authors, newest first.
    pub async fn feed(&self, viewer_id: Uuid, cursor: Option<Cursor>) -> ServiceResult<Page<PostView>> {
        let rows = self
            .store
            .posts
            .feed(viewer_id, cursor, DEFAULT_PAGE_SIZE + 1)
            .await?;
        Ok(Page::from_overfetch(rows, DEFAULT_PAGE_SIZE, |view| {
            (view.post.created_at, view.post.id)
        }))
    }

    pub async fn create(&self, user_id: Uuid, input: CreatePostInput) -> ServiceResult<PostView> {
        input.validate()?;
        let view = self
            .store
            .posts
            .create(user_id, input.content)
            .await?
            .ok_or(ServiceError::NotFound("user"))?;
        tracing::info!(user_id = %user_id, post_id = %view.post.id, "post created");
        Ok(view)
    }

    pub async fn delete_own(&self, user_id: Uuid, post_id: Uuid) -> ServiceResult<()> {
        let post = self
            .store
            .posts
            .find_live(post_id)
            .await?
            .ok_or(ServiceError::NotFound("post"))?;
        if post.user_id != user_id {
            return Err(ServiceError::Forbidden("you can only delete your own posts"));
        }
        self.soft_delete(post_id).await
    }

    /// Admin listing, trashed posts included on request.
    pub async fn list(&self, filter: PostFilter, cursor: Option<Cursor>, limit: i64) -> ServiceResult<Page<Post>> {
        let rows = self.store.posts.list(filter, cursor, limit + 1).await?;
        Ok(Page::from_overfetch(rows, limit, |post| (post.created_at, post.id)))
    }

    pub async fn delete_any(&self, post_id: Uuid) -> ServiceResult<()> {
        self.soft_delete(post_id).await
    }

    pub async fn restore(&self, post_id: Uuid) -> ServiceResult<Post> {
        let post = self
            .store
            .posts
            .find_any(post_id)
            .await?
            .ok_or(ServiceError::NotFound("post"))?;
        if post.is_live() {
            return Err(ServiceError::Conflict("post is not deleted"));
        }

        let author_live = self
            .store
            .users
            .find_any(post.user_id)
            .await?
            .is_some_and(|author| author.is_live());
        if !author_live {
            return Err(ServiceError::Conflict("post author is deleted"));
        }

        if !self.store.posts.restore(post_id).await? {
            return Err(ServiceError::Conflict("post is not deleted"));
        }
        tracing::info!(post_id = %post_id, "post restored");

        self.store
            .posts
            .find_any(post_id)
            .await?
            .ok_or(ServiceError::NotFound("post"))
    }

    async fn soft_delete(&self, post_id: Uuid) -> ServiceResult<()> {
        if !self
            .store
            .posts
            .soft_delete(post_id, OffsetDateTime::now_utc())
            .await?
        {
            return Err(ServiceError::NotFound("post"));
        }
        tracing::info!(post_id = %post_id, "post soft deleted");
        Ok(())
    }
}
