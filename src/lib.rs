pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;
pub mod jobs;

use std::sync::Arc;

use crate::app::admin::AdminService;
use crate::app::auth::AuthService;
use crate::app::cascade::SoftDeleteService;
use crate::app::engagement::EngagementService;
use crate::app::posts::PostService;
use crate::app::purge::PurgeService;
use crate::app::users::ProfileService;
use crate::infra::queue::JobQueue;
use crate::infra::repo::Store;
use crate::infra::storage::PictureStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub queue: Arc<dyn JobQueue>,
    pub pictures: Arc<dyn PictureStore>,
    pub token_key: [u8; 32],
    pub token_ttl_days: u64,
    pub purge_retention_days: i64,
    pub purge_batch_size: i64,
    pub picture_max_bytes: usize,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn auth_service(&self) -> AuthService {
        AuthService::new(
            self.store.clone(),
            self.pictures.clone(),
            self.token_key,
            self.token_ttl_days,
            self.picture_max_bytes,
        )
    }

    pub fn profile_service(&self) -> ProfileService {
        ProfileService::new(self.store.clone(), self.pictures.clone(), self.picture_max_bytes)
    }

    pub fn post_service(&self) -> PostService {
        PostService::new(self.store.clone())
    }

    pub fn engagement_service(&self) -> EngagementService {
        EngagementService::new(self.store.clone())
    }

    pub fn soft_delete_service(&self) -> SoftDeleteService {
        SoftDeleteService::new(self.store.clone(), self.pictures.clone())
    }

    pub fn purge_service(&self) -> PurgeService {
        PurgeService::new(
            self.store.clone(),
            self.queue.clone(),
            self.purge_retention_days,
            self.purge_batch_size,
        )
    }

    pub fn admin_service(&self) -> AdminService {
        AdminService::new(self.store.clone())
    }
}
