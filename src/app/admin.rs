use uuid::Uuid;

use crate::app::error::{ServiceError, ServiceResult};
use crate::app::Page;
use crate::domain::user::{User, UserFilter};
use crate::infra::repo::{Cursor, Store};

#[derive(Debug, Clone)]
pub struct UserListing {
    pub page: Page<User>,
    /// Live users still waiting for approval, whatever the filter.
    pub pending_approvals: i64,
}

#[derive(Clone)]
pub struct AdminService {
    store: Store,
}

impl AdminService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn list_users(&self, filter: UserFilter, cursor: Option<Cursor>, limit: i64) -> ServiceResult<UserListing> {
        let rows = self.store.users.list(filter, cursor, limit + 1).await?;
        let pending_approvals = self.store.users.count_pending_approval().await?;
        Ok(UserListing {
            page: Page::from_overfetch(rows, limit, |user| (user.created_at, user.id)),
            pending_approvals,
        })
    }

    pub async fn set_approval(&self, user_id: Uuid, approved: bool) -> ServiceResult<User> {
        let user = self
            .store
            .users
            .set_approved(user_id, approved)
            .await?
            .ok_or(ServiceError::NotFound("user"))?;
        tracing::info!(user_id = %user_id, approved, "user approval changed");
        Ok(user)
    }
}
