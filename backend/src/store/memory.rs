use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use warden_common::UserRecord;

use super::{StoreError, UserChanges, UserFilter, UserOrder, UserStore};

/// In-process user store for tests and local development.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record as the sign-up trigger would. Replaces any existing
    /// record with the same id.
    pub async fn materialize(&self, user: UserRecord) {
        tracing::debug!("Materialized user: {}", user.id);
        self.users.write().await.insert(user.id.clone(), user);
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get(&self, id: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn update(&self, id: &str, changes: UserChanges) -> Result<Option<UserRecord>, StoreError> {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(id) else {
            return Ok(None);
        };

        if let Some(full_name) = changes.full_name {
            user.full_name = Some(full_name);
        }
        if let Some(avatar_url) = changes.avatar_url {
            user.avatar_url = Some(avatar_url);
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        if let Some(is_active) = changes.is_active {
            user.is_active = is_active;
        }
        if let Some(last_seen) = changes.last_seen {
            user.last_seen = last_seen;
        }
        if let Some(updated_at) = changes.updated_at {
            user.updated_at = updated_at;
        }

        Ok(Some(user.clone()))
    }

    async fn list(
        &self,
        filter: UserFilter,
        order: UserOrder,
        skip: u64,
        take: Option<u64>,
    ) -> Result<Vec<UserRecord>, StoreError> {
        let users = self.users.read().await;
        let mut matched: Vec<UserRecord> = users
            .values()
            .filter(|u| filter.matches(u))
            .cloned()
            .collect();

        match order {
            UserOrder::LastSeenDesc => {
                matched.sort_by(|a, b| b.last_seen.cmp(&a.last_seen).then_with(|| a.id.cmp(&b.id)))
            }
            UserOrder::CreatedAtDesc => {
                matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)))
            }
        }

        let take = take.map(|t| t as usize).unwrap_or(usize::MAX);
        Ok(matched.into_iter().skip(skip as usize).take(take).collect())
    }

    async fn count(&self, filter: UserFilter) -> Result<u64, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().filter(|u| filter.matches(u)).count() as u64)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
