use uuid::Uuid;

use crate::app::error::{ServiceError, ServiceResult};
use crate::domain::engagement::LikeToggle;
use crate::infra::repo::Store;

#[derive(Clone)]
pub struct EngagementService {
    store: Store,
}

impl EngagementService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn toggle_like(&self, user_id: Uuid, post_id: Uuid) -> ServiceResult<LikeToggle> {
        let toggle = self
            .store
            .likes
            .toggle(user_id, post_id)
            .await?
            .ok_or(ServiceError::NotFound("post"))?;
        tracing::debug!(user_id = %user_id, post_id = %post_id, is_liked = toggle.is_liked, "like toggled");
        Ok(toggle)
    }
}
