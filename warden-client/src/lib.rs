//! Client side of the Warden user API.
//!
//! A fresh sign-in can race the database trigger that creates the user
//! record. [`UserClient::fetch_current_user`] absorbs that window with one
//! delayed retry.

pub mod client;
pub mod config;
pub mod error;

pub use client::{Reconciliation, UserClient};
pub use config::ClientConfig;
pub use error::ClientError;
