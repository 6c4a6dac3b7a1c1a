//! User-level soft deletion and its effect on the user's posts.
//!
//! Deleting a user stamps the user and every live post with one deletion
//! marker. Restoring brings back the posts whose marker is not older than
//! the user's, so posts the owner had deleted beforehand stay deleted.

use std::sync::Arc;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::error::{ServiceError, ServiceResult};
use crate::domain::deletion::{CascadeOutcome, CascadeResult};
use crate::domain::user::User;
use crate::infra::repo::Store;
use crate::infra::storage::PictureStore;

#[derive(Clone)]
pub struct SoftDeleteService {
    store: Store,
    pictures: Arc<dyn PictureStore>,
}

impl SoftDeleteService {
    pub fn new(store: Store, pictures: Arc<dyn PictureStore>) -> Self {
        Self { store, pictures }
    }

    pub async fn delete_user(&self, user_id: Uuid) -> ServiceResult<CascadeOutcome> {
        let result = self
            .store
            .users
            .soft_delete_cascade(user_id, OffsetDateTime::now_utc())
            .await?;
        let outcome = applied(result, "user is already deleted")?;
        tracing::info!(
            user_id = %user_id,
            deletion_seq = outcome.marker.seq,
            posts = outcome.posts_affected,
            "user soft deleted"
        );
        Ok(outcome)
    }

    pub async fn restore_user(&self, user_id: Uuid) -> ServiceResult<CascadeOutcome> {
        let result = self.store.users.restore_cascade(user_id).await?;
        let outcome = applied(result, "user is not deleted")?;
        tracing::info!(
            user_id = %user_id,
            deletion_seq = outcome.marker.seq,
            posts = outcome.posts_affected,
            "user restored"
        );
        Ok(outcome)
    }

    /// Removes the user for good, along with posts, likes and tokens.
    pub async fn force_delete_user(&self, user_id: Uuid) -> ServiceResult<User> {
        let user = self
            .store
            .users
            .force_delete(user_id)
            .await?
            .ok_or(ServiceError::NotFound("user"))?;

        if let Some(key) = user.profile_picture.as_deref() {
            if let Err(err) = self.pictures.delete(key).await {
                tracing::warn!(error = ?err, key = %key, "failed to delete profile picture");
            }
        }
        tracing::info!(user_id = %user_id, "user force deleted");
        Ok(user)
    }
}

fn applied(result: CascadeResult, unchanged: &'static str) -> ServiceResult<CascadeOutcome> {
    match result {
        CascadeResult::Applied(outcome) => Ok(outcome),
        CascadeResult::NotFound => Err(ServiceError::NotFound("user")),
        CascadeResult::Unchanged => Err(ServiceError::Conflict(unchanged)),
    }
}
