use std::sync::Arc;

use serde::{Deserialize, Deserializer};
use uuid::Uuid;
use validator::Validate;

use crate::app::error::{merge, ServiceError, ServiceResult};
use crate::app::pictures::{decode_picture, store_picture};
use crate::domain::user::{ProfileChanges, ProfileStats, User};
use crate::infra::repo::Store;
use crate::infra::storage::PictureStore;

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProfileInput {
    #[validate(length(min = 1, max = 255, message = "name must be between 1 and 255 characters"))]
    pub name: Option<String>,
    /// Absent keeps the description, `null` clears it.
    #[serde(default, deserialize_with = "deserialize_some")]
    #[validate(length(max = 255, message = "description must be at most 255 characters"))]
    pub description: Option<Option<String>>,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Profile {
    pub user: User,
    pub stats: ProfileStats,
}

#[derive(Clone)]
pub struct ProfileService {
    store: Store,
    pictures: Arc<dyn PictureStore>,
    picture_max_bytes: usize,
}

impl ProfileService {
    pub fn new(store: Store, pictures: Arc<dyn PictureStore>, picture_max_bytes: usize) -> Self {
        Self {
            store,
            pictures,
            picture_max_bytes,
        }
    }

    pub async fn profile(&self, user_id: Uuid) -> ServiceResult<Profile> {
        let user = self
            .store
            .users
            .find_live(user_id)
            .await?
            .ok_or(ServiceError::NotFound("user"))?;
        let stats = self.store.users.stats(user_id).await?;
        Ok(Profile { user, stats })
    }

    /// The new picture is written before the row changes and the old one is
    /// discarded only after, so the row never points at a missing file.
    pub async fn update_profile(&self, user_id: Uuid, input: UpdateProfileInput) -> ServiceResult<User> {
        let mut extra = Vec::new();
        let picture = match input.profile_picture.as_deref() {
            Some(encoded) => match decode_picture(encoded, self.picture_max_bytes) {
                Ok(picture) => Some(picture),
                Err(err) => {
                    extra.push(("profile_picture", err));
                    None
                }
            },
            None => None,
        };
        merge(input.validate(), extra)?;

        let current = self
            .store
            .users
            .find_live(user_id)
            .await?
            .ok_or(ServiceError::NotFound("user"))?;

        let new_picture = match picture {
            Some(picture) => Some(store_picture(self.pictures.as_ref(), picture).await?),
            None => None,
        };
        let changes = ProfileChanges {
            name: input.name,
            description: input.description,
            profile_picture: new_picture.clone(),
        };
        if changes.is_empty() {
            return Ok(current);
        }

        let updated = match self.store.users.update_profile(user_id, changes).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                self.discard_picture(new_picture.as_deref()).await;
                return Err(ServiceError::NotFound("user"));
            }
            Err(err) => {
                self.discard_picture(new_picture.as_deref()).await;
                return Err(err.into());
            }
        };

        if new_picture.is_some() && current.profile_picture != updated.profile_picture {
            self.discard_picture(current.profile_picture.as_deref()).await;
        }

        tracing::info!(user_id = %user_id, "profile updated");
        Ok(updated)
    }

    async fn discard_picture(&self, key: Option<&str>) {
        let Some(key) = key else {
            return;
        };
        if let Err(err) = self.pictures.delete(key).await {
            tracing::warn!(error = ?err, key = %key, "failed to delete profile picture");
        }
    }
}

fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}
