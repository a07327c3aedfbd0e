//! Helpers for tests: a header-driven identity provider and state builders.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use chrono::Utc;
use warden_common::{Role, UserRecord};

use crate::auth::{bearer_token, AuthError, IdentityProvider, Session};
use crate::config::{Config, CorsConfig, DatabaseConfig, LoggingConfig, OidcConfig};
use crate::store::MemoryUserStore;
use crate::AppState;

/// Identity provider that treats the bearer token as the subject id.
pub struct StaticIdentityProvider;

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn current_session(&self, headers: &HeaderMap) -> Result<Session, AuthError> {
        let subject_id = bearer_token(headers)?.to_string();
        Ok(Session {
            email: Some(format!("{subject_id}@example.com")),
            subject_id,
        })
    }
}

/// Headers carrying a session for `subject_id` under [`StaticIdentityProvider`].
pub fn headers_for(subject_id: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = format!("Bearer {subject_id}").parse() {
        headers.insert(AUTHORIZATION, value);
    }
    headers
}

pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 8080,
        oidc: OidcConfig {
            issuer: "https://test-issuer".to_string(),
            audience: "test-audience".to_string(),
        },
        database: DatabaseConfig {
            url: ":memory:".to_string(),
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
        cors: CorsConfig {
            origins: "*".to_string(),
        },
    }
}

/// A record as the sign-up trigger would create it, with the given role.
pub fn test_user(id: &str, role: Role) -> UserRecord {
    UserRecord::new(id, format!("{id}@example.com"), Utc::now()).with_role(role)
}

/// State over an in-memory store. The store handle is returned so tests can
/// simulate the sign-up trigger.
pub async fn create_test_state(users: Vec<UserRecord>) -> (Arc<AppState>, Arc<MemoryUserStore>) {
    let store = Arc::new(MemoryUserStore::new());
    for user in users {
        store.materialize(user).await;
    }

    let state = AppState::new(test_config(), store.clone(), Arc::new(StaticIdentityProvider));
    (Arc::new(state), store)
}
