//! Persistent user store boundary.
//!
//! The [`UserStore`] trait is the only way the rest of the service touches user
//! records. Production uses [`SqliteUserStore`]; tests substitute
//! [`MemoryUserStore`].

mod memory;
mod sqlite;

pub use memory::MemoryUserStore;
pub use sqlite::SqliteUserStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use warden_common::{Role, UserRecord};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("Corrupt user record {id}: {reason}")]
    CorruptRecord { id: String, reason: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(err, msg)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::ConstraintViolation(msg.unwrap_or_else(|| err.to_string()))
            }
            other => StoreError::DatabaseError(other.to_string()),
        }
    }
}

/// Field-level changes to a single record. `None` leaves the column as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserChanges {
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub last_seen: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Conjunctive filter over user records. Empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserFilter {
    pub active: Option<bool>,
    pub roles: Option<Vec<Role>>,
    /// Case-insensitive substring of email or full name
    pub text: Option<String>,
    pub created_since: Option<DateTime<Utc>>,
}

impl UserFilter {
    pub fn active() -> Self {
        Self {
            active: Some(true),
            ..Self::default()
        }
    }

    pub fn roles(roles: &[Role]) -> Self {
        Self {
            roles: Some(roles.to_vec()),
            ..Self::default()
        }
    }

    pub fn created_since(since: DateTime<Utc>) -> Self {
        Self {
            created_since: Some(since),
            ..Self::default()
        }
    }

    /// Check a record against the filter in process.
    pub fn matches(&self, user: &UserRecord) -> bool {
        if let Some(active) = self.active {
            if user.is_active != active {
                return false;
            }
        }
        if let Some(roles) = &self.roles {
            if !roles.contains(&user.role) {
                return false;
            }
        }
        if let Some(text) = &self.text {
            if !user.matches_text(text) {
                return false;
            }
        }
        if let Some(since) = self.created_since {
            if user.created_at < since {
                return false;
            }
        }
        true
    }
}

/// Sort order for listings. Both orders are newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserOrder {
    LastSeenDesc,
    CreatedAtDesc,
}

/// Keyed access, single-record update, and filtered listing over user records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Apply `changes` to the record with `id`, returning the updated record,
    /// or `None` when no such record exists.
    async fn update(&self, id: &str, changes: UserChanges) -> Result<Option<UserRecord>, StoreError>;

    async fn list(
        &self,
        filter: UserFilter,
        order: UserOrder,
        skip: u64,
        take: Option<u64>,
    ) -> Result<Vec<UserRecord>, StoreError>;

    async fn count(&self, filter: UserFilter) -> Result<u64, StoreError>;

    /// Cheap round-trip used by the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, email: &str, role: Role, active: bool) -> UserRecord {
        let mut u = UserRecord::new(id, email, Utc::now()).with_role(role);
        u.is_active = active;
        u
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = UserFilter::default();
        assert!(filter.matches(&user("a", "a@x.io", Role::User, false)));
        assert!(filter.matches(&user("b", "b@x.io", Role::SuperAdmin, true)));
    }

    #[test]
    fn test_filter_conditions_are_conjunctive() {
        let filter = UserFilter {
            active: Some(true),
            roles: Some(vec![Role::Admin]),
            ..UserFilter::default()
        };
        assert!(filter.matches(&user("a", "a@x.io", Role::Admin, true)));
        assert!(!filter.matches(&user("b", "b@x.io", Role::Admin, false)));
        assert!(!filter.matches(&user("c", "c@x.io", Role::User, true)));
    }

    #[test]
    fn test_created_since_is_inclusive() {
        let record = user("a", "a@x.io", Role::User, true);
        assert!(UserFilter::created_since(record.created_at).matches(&record));
        assert!(!UserFilter::created_since(record.created_at + chrono::Duration::seconds(1))
            .matches(&record));
    }

    #[test]
    fn test_constraint_error_mapping() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
            Some("CHECK constraint failed: role".to_string()),
        );
        assert!(matches!(StoreError::from(err), StoreError::ConstraintViolation(_)));
    }
}
