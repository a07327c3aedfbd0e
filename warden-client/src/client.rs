//! HTTP client for the self-service user routes.

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use warden_common::{ErrorResponse, ProfileUpdate, UserPatch, UserRecord};

use crate::config::ClientConfig;
use crate::error::ClientError;

/// Outcome of reading the signed-in user's record right after sign-in.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    Ready(UserRecord),
    /// Still absent after the single retry; the sign-up trigger has not run
    NotReady,
    /// The backend no longer accepts the session
    SignedOut,
}

pub struct UserClient {
    http: reqwest::Client,
    config: ClientConfig,
    token: String,
}

impl UserClient {
    /// Client acting for the session behind `token`.
    pub fn new(config: ClientConfig, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            token: token.into(),
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.token)
    }

    /// Read the caller's record, retrying exactly once on 404.
    pub async fn fetch_current_user(&self, subject_id: &str) -> Result<Reconciliation, ClientError> {
        match self.get_user(subject_id).await {
            Err(ClientError::NotFound) => {}
            other => return Self::reconciled(other),
        }

        tracing::info!(
            "User record for {} not present yet, retrying in {}ms",
            subject_id,
            self.config.retry_delay_ms
        );
        tokio::time::sleep(self.config.retry_delay()).await;

        match self.get_user(subject_id).await {
            Err(ClientError::NotFound) => {
                tracing::warn!("User record for {} still missing after retry", subject_id);
                Ok(Reconciliation::NotReady)
            }
            other => Self::reconciled(other),
        }
    }

    fn reconciled(result: Result<UserRecord, ClientError>) -> Result<Reconciliation, ClientError> {
        match result {
            Ok(user) => Ok(Reconciliation::Ready(user)),
            Err(ClientError::SignedOut) => Ok(Reconciliation::SignedOut),
            Err(e) => Err(e),
        }
    }

    pub async fn get_user(&self, id: &str) -> Result<UserRecord, ClientError> {
        let response = self
            .authorized(self.http.get(self.config.user_url(id)?))
            .send()
            .await?;
        Self::parse(response).await
    }

    pub async fn update_profile(&self, id: &str, update: &ProfileUpdate) -> Result<UserRecord, ClientError> {
        let response = self
            .authorized(self.http.put(self.config.user_url(id)?))
            .json(update)
            .send()
            .await?;
        Self::parse(response).await
    }

    pub async fn touch_last_seen(&self, id: &str) -> Result<UserRecord, ClientError> {
        let response = self
            .authorized(self.http.patch(self.config.user_url(id)?))
            .json(&UserPatch::UpdateLastSeen)
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let status = response.status();
        match status {
            s if s.is_success() => Ok(response.json().await?),
            StatusCode::UNAUTHORIZED => Err(ClientError::SignedOut),
            StatusCode::NOT_FOUND => Err(ClientError::NotFound),
            _ => {
                let message = response
                    .json::<ErrorResponse>()
                    .await
                    .map(|body| body.error)
                    .unwrap_or_else(|_| status.to_string());
                Err(ClientError::Status { status, message })
            }
        }
    }
}
