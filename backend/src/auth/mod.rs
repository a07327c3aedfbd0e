//! Identity provider boundary and the authorization gate.

pub mod gate;
mod jwks;

pub use gate::{Authorization, Denial, Gate, GateError, Grant};
pub use jwks::JwksClient;

use async_trait::async_trait;
use axum::http::HeaderMap;

/// Authenticated session as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Subject id; doubles as the user record id
    pub subject_id: String,
    pub email: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingHeader,
    #[error("Invalid Authorization header format")]
    InvalidFormat,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("JWKS fetch error: {0}")]
    JwksFetchError(String),
    #[error("Key not found for kid: {0}")]
    KeyNotFound(String),
}

/// "Get current authenticated session" for an incoming request.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_session(&self, headers: &HeaderMap) -> Result<Session, AuthError>;
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get("authorization")
        .ok_or(AuthError::MissingHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidFormat)?;

    auth_header
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::InvalidFormat)
}
