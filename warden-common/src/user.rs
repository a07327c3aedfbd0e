//! The application-side user record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::role::Role;

/// User record mirrored from the identity provider.
///
/// Records are inserted by a database trigger on first sign-up; this side only
/// reads and updates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Subject id issued by the identity provider
    pub id: String,
    /// Email owned by the identity provider
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub role: Role,
    /// `false` once the user has been soft-deleted
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    /// Record as the sign-up trigger would create it.
    pub fn new(id: impl Into<String>, email: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            full_name: None,
            avatar_url: None,
            role: Role::User,
            is_active: true,
            created_at: now,
            last_seen: now,
            updated_at: now,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Case-insensitive substring match on email or full name.
    pub fn matches_text(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        self.email.to_lowercase().contains(&needle)
            || self
                .full_name
                .as_deref()
                .is_some_and(|name| name.to_lowercase().contains(&needle))
    }
}
