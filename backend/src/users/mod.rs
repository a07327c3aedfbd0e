//! Typed read/update operations on user records.
//!
//! [`UserAccessor`] wraps the injected [`UserStore`] and performs no
//! authorization of its own; privileged mutations go through the gate in
//! [`crate::auth::gate`].

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use warden_common::{DashboardStats, Pagination, ProfileUpdate, Role, UserPage, UserRecord};

use crate::store::{StoreError, UserChanges, UserFilter, UserOrder, UserStore};

/// Window used for the "new users" dashboard count.
pub const RECENT_USER_WINDOW_DAYS: i64 = 7;

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("User not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Parameters for the paginated admin listing.
#[derive(Debug, Clone, PartialEq)]
pub struct UserQuery {
    /// 1-indexed page number
    pub page: u32,
    pub limit: u32,
    pub text: Option<String>,
    pub role: Option<Role>,
}

impl Default for UserQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            text: None,
            role: None,
        }
    }
}

#[derive(Clone)]
pub struct UserAccessor {
    store: Arc<dyn UserStore>,
}

impl UserAccessor {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn UserStore> {
        &self.store
    }

    /// Look up a record. `None` means the record has not materialized.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<UserRecord>, StoreError> {
        self.store.get(id).await
    }

    async fn apply(&self, id: &str, changes: UserChanges) -> Result<UserRecord, UserError> {
        self.store
            .update(id, changes)
            .await?
            .ok_or_else(|| UserError::NotFound(id.to_string()))
    }

    pub async fn update_profile(&self, id: &str, update: ProfileUpdate) -> Result<UserRecord, UserError> {
        let user = self
            .apply(
                id,
                UserChanges {
                    full_name: update.full_name,
                    avatar_url: update.avatar_url,
                    updated_at: Some(Utc::now()),
                    ..UserChanges::default()
                },
            )
            .await?;
        tracing::info!("Updated profile for user {}", id);
        Ok(user)
    }

    pub async fn touch_last_seen(&self, id: &str) -> Result<UserRecord, UserError> {
        self.apply(
            id,
            UserChanges {
                last_seen: Some(Utc::now()),
                ..UserChanges::default()
            },
        )
        .await
    }

    /// Set the role without any authorization check.
    pub async fn set_role(&self, id: &str, role: Role) -> Result<UserRecord, UserError> {
        let user = self
            .apply(
                id,
                UserChanges {
                    role: Some(role),
                    updated_at: Some(Utc::now()),
                    ..UserChanges::default()
                },
            )
            .await?;
        tracing::info!("Set role of user {} to {}", id, role);
        Ok(user)
    }

    pub async fn set_active(&self, id: &str, is_active: bool) -> Result<UserRecord, UserError> {
        let user = self
            .apply(
                id,
                UserChanges {
                    is_active: Some(is_active),
                    updated_at: Some(Utc::now()),
                    ..UserChanges::default()
                },
            )
            .await?;
        tracing::info!("Set is_active of user {} to {}", id, is_active);
        Ok(user)
    }

    /// Write role and active flag in one update.
    pub async fn update_access(
        &self,
        id: &str,
        role: Option<Role>,
        is_active: Option<bool>,
    ) -> Result<UserRecord, UserError> {
        self.apply(
            id,
            UserChanges {
                role,
                is_active,
                updated_at: Some(Utc::now()),
                ..UserChanges::default()
            },
        )
        .await
    }

    /// Soft delete. Deactivating an inactive user succeeds unchanged.
    pub async fn deactivate(&self, id: &str) -> Result<UserRecord, UserError> {
        self.set_active(id, false).await
    }

    /// Active users, most recently seen first.
    pub async fn list_active(&self) -> Result<Vec<UserRecord>, StoreError> {
        self.store
            .list(UserFilter::active(), UserOrder::LastSeenDesc, 0, None)
            .await
    }

    /// Users holding any of `roles`, newest first.
    pub async fn list_by_role(&self, roles: &[Role]) -> Result<Vec<UserRecord>, StoreError> {
        self.store
            .list(UserFilter::roles(roles), UserOrder::CreatedAtDesc, 0, None)
            .await
    }

    pub async fn list_admins(&self) -> Result<Vec<UserRecord>, StoreError> {
        self.list_by_role(&Role::ADMINS).await
    }

    pub async fn search(&self, query: UserQuery) -> Result<UserPage, StoreError> {
        let filter = UserFilter {
            text: query.text.filter(|t| !t.is_empty()),
            roles: query.role.map(|r| vec![r]),
            ..UserFilter::default()
        };

        let total = self.store.count(filter.clone()).await?;
        let pagination = Pagination::new(query.page.max(1), query.limit, total);
        let users = self
            .store
            .list(
                filter,
                UserOrder::CreatedAtDesc,
                pagination.skip(),
                Some(u64::from(query.limit)),
            )
            .await?;

        Ok(UserPage { users, pagination })
    }

    pub async fn count_all(&self) -> Result<u64, StoreError> {
        self.store.count(UserFilter::default()).await
    }

    pub async fn count_active(&self) -> Result<u64, StoreError> {
        self.store.count(UserFilter::active()).await
    }

    pub async fn count_by_roles(&self, roles: &[Role]) -> Result<u64, StoreError> {
        self.store.count(UserFilter::roles(roles)).await
    }

    pub async fn count_created_since(&self, since: DateTime<Utc>) -> Result<u64, StoreError> {
        self.store.count(UserFilter::created_since(since)).await
    }

    pub async fn dashboard_stats(&self, now: DateTime<Utc>) -> Result<DashboardStats, StoreError> {
        Ok(DashboardStats {
            total_users: self.count_all().await?,
            active_users: self.count_active().await?,
            admin_users: self.count_by_roles(&Role::ADMINS).await?,
            recent_users: self
                .count_created_since(now - Duration::days(RECENT_USER_WINDOW_DAYS))
                .await?,
        })
    }
}
