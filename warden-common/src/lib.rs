//! Warden Common Types
//!
//! Shared types used by both the backend service and the session client.

pub mod api;
pub mod role;
pub mod user;

pub use api::{
    AdminUserUpdate, DashboardStats, ErrorResponse, Pagination, ProfileUpdate, UserPage,
    UserPatch,
};
pub use role::{Role, UnknownRole};
pub use user::UserRecord;
