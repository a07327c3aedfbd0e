//! Privilege roles for user records.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role stored on a user record.
///
/// Variants are declared in privilege order, so the derived `Ord` is the
/// privilege scale: `User < Admin < SuperAdmin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular signed-in user
    #[default]
    User,
    /// Can view the admin dashboard and user listings
    Admin,
    /// Can change roles and deactivate users
    SuperAdmin,
}

impl Role {
    /// All role variants for iteration.
    pub const ALL: [Role; 3] = [Role::User, Role::Admin, Role::SuperAdmin];

    /// Roles that may enter the admin dashboard.
    pub const ADMINS: [Role; 2] = [Role::Admin, Role::SuperAdmin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }

    /// Whether this role meets the given minimum.
    pub fn satisfies(&self, required: Role) -> bool {
        *self >= required
    }

    pub fn is_admin(&self) -> bool {
        self.satisfies(Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of the known role names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "super_admin" => Ok(Role::SuperAdmin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}
