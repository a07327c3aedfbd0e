use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;

use crate::error::ClientError;

/// Where the backend lives and how long to wait before re-reading a record
/// the sign-up trigger has not written yet.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_retry_delay_ms() -> u64 {
    2000
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// `{base_url}/users/{id}` with `id` encoded as a single path segment.
    pub(crate) fn user_url(&self, id: &str) -> Result<Url, ClientError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .push("users")
            .push(id);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"base_url":"http://localhost:8080/"}"#).unwrap();
        assert_eq!(config.retry_delay(), Duration::from_secs(2));
        assert_eq!(
            config.user_url("sub-1").unwrap().as_str(),
            "http://localhost:8080/users/sub-1"
        );
    }

    #[test]
    fn test_user_url_encodes_subject() {
        let config = ClientConfig::new("http://localhost:8080/api");
        assert_eq!(
            config.user_url("a/b?c d").unwrap().as_str(),
            "http://localhost:8080/api/users/a%2Fb%3Fc%20d"
        );
        assert!(matches!(
            ClientConfig::new("not a url").user_url("x"),
            Err(ClientError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_with_retry_delay() {
        let config = ClientConfig::new("http://x").with_retry_delay(Duration::from_millis(25));
        assert_eq!(config.retry_delay_ms, 25);
    }
}
