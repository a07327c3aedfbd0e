use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};

use super::{bearer_token, AuthError, IdentityProvider, Session};

/// JWKS key set response.
#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    n: Option<String>,
    e: Option<String>,
}

/// JWT claims. Only the subject is needed to correlate with user records.
#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
}

/// Lower bound between JWKS fetches triggered by unknown `kid`s.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct OidcConfig {
    jwks_uri: String,
}

/// OIDC identity provider: validates RS256 bearer tokens against the
/// issuer's published JWKS and caches the decoded keys.
pub struct JwksClient {
    http_client: Client,
    jwks_uri: String,
    keys: RwLock<HashMap<String, DecodingKey>>,
    last_refresh: Mutex<Option<Instant>>,
    min_refresh_interval: Duration,
    issuer: String,
    audience: Option<String>,
}

impl JwksClient {
    /// Discover the JWKS endpoint and load the initial key set.
    ///
    /// An empty `audience` disables audience validation.
    pub async fn new(issuer: &str, audience: &str) -> Result<Self, AuthError> {
        let http_client = Client::new();
        let issuer = issuer.trim_end_matches('/').to_string();

        // Fetch OIDC configuration to get JWKS URI
        let config_url = format!("{}/.well-known/openid-configuration", issuer);
        let config: OidcConfig = http_client
            .get(&config_url)
            .send()
            .await
            .map_err(|e| AuthError::JwksFetchError(e.to_string()))?
            .error_for_status()
            .map_err(|e| AuthError::JwksFetchError(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::JwksFetchError(e.to_string()))?;

        let client = Self {
            http_client,
            jwks_uri: config.jwks_uri,
            keys: RwLock::new(HashMap::new()),
            last_refresh: Mutex::new(Some(Instant::now())),
            min_refresh_interval: MIN_REFRESH_INTERVAL,
            issuer,
            audience: Some(audience.to_string()).filter(|a| !a.is_empty()),
        };

        client.refresh_keys().await?;

        Ok(client)
    }

    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Refetch the key set unless the last attempt was too recent. Failed
    /// attempts count, so an unreachable issuer is not hammered either.
    async fn refresh_if_stale(&self) -> Result<(), AuthError> {
        let mut last_refresh = self.last_refresh.lock().await;
        if let Some(at) = *last_refresh {
            if at.elapsed() < self.min_refresh_interval {
                tracing::debug!("Skipping JWKS refresh, last one {:?} ago", at.elapsed());
                return Ok(());
            }
        }
        *last_refresh = Some(Instant::now());
        self.refresh_keys().await
    }

    async fn refresh_keys(&self) -> Result<(), AuthError> {
        tracing::info!("Fetching JWKS from {}", self.jwks_uri);

        let response: JwksResponse = self
            .http_client
            .get(&self.jwks_uri)
            .send()
            .await
            .map_err(|e| AuthError::JwksFetchError(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::JwksFetchError(e.to_string()))?;

        let mut keys = self.keys.write().await;
        keys.clear();

        for jwk in response.keys {
            if jwk.kty != "RSA" {
                continue;
            }
            if let (Some(n), Some(e)) = (&jwk.n, &jwk.e) {
                match DecodingKey::from_rsa_components(n, e) {
                    Ok(key) => {
                        keys.insert(jwk.kid.clone(), key);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse RSA key {}: {}", jwk.kid, e);
                    }
                }
            }
        }

        tracing::info!("Loaded {} JWKS keys", keys.len());
        Ok(())
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        validation
    }

    /// Validate a raw JWT and return the session it represents.
    pub async fn validate_token(&self, token: &str) -> Result<Session, AuthError> {
        let header = decode_header(token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| AuthError::InvalidToken("Missing kid in token header".to_string()))?;

        // Keys may have rotated since the last fetch
        if !self.keys.read().await.contains_key(&kid) {
            tracing::debug!("Unknown kid {}, refreshing JWKS", kid);
            self.refresh_if_stale().await?;
        }

        let keys = self.keys.read().await;
        let key = keys.get(&kid).ok_or_else(|| AuthError::KeyNotFound(kid.clone()))?;

        let token_data = decode::<Claims>(token, key, &self.validation())
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        Ok(Session {
            subject_id: token_data.claims.sub,
            email: token_data.claims.email,
        })
    }
}

#[async_trait]
impl IdentityProvider for JwksClient {
    async fn current_session(&self, headers: &HeaderMap) -> Result<Session, AuthError> {
        let token = bearer_token(headers)?;
        self.validate_token(token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::AUTHORIZATION;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
    use rsa::traits::PublicKeyParts;
    use rsa::RsaPrivateKey;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct TestIssuer {
        server: MockServer,
        encoding_key: EncodingKey,
    }

    impl TestIssuer {
        async fn start() -> Self {
            let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
            let pem = private_key.to_pkcs1_pem(LineEnding::LF).unwrap();
            let encoding_key = EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap();

            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/.well-known/openid-configuration"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "jwks_uri": format!("{}/.well-known/jwks.json", server.uri()),
                })))
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path("/.well-known/jwks.json"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "keys": [{
                        "kid": "test-key",
                        "kty": "RSA",
                        "alg": "RS256",
                        "n": URL_SAFE_NO_PAD.encode(private_key.n().to_bytes_be()),
                        "e": URL_SAFE_NO_PAD.encode(private_key.e().to_bytes_be()),
                    }]
                })))
                .mount(&server)
                .await;

            Self {
                server,
                encoding_key,
            }
        }

        fn token(&self, kid: &str, sub: &str, issuer: &str, exp_offset_secs: i64) -> String {
            let now = chrono::Utc::now().timestamp();
            let claims = json!({
                "sub": sub,
                "email": format!("{sub}@example.com"),
                "iss": issuer,
                "aud": "warden",
                "iat": now,
                "exp": now + exp_offset_secs,
            });
            let header = Header {
                alg: Algorithm::RS256,
                kid: Some(kid.to_string()),
                ..Default::default()
            };
            encode(&header, &claims, &self.encoding_key).unwrap()
        }
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, format!("Bearer {token}").parse().unwrap());
        headers
    }

    #[tokio::test]
    async fn test_valid_token_yields_session() {
        let issuer = TestIssuer::start().await;
        let client = JwksClient::new(&format!("{}/", issuer.server.uri()), "warden")
            .await
            .unwrap();

        let token = issuer.token("test-key", "auth0|123", &issuer.server.uri(), 3600);
        let session = client.current_session(&bearer(&token)).await.unwrap();
        assert_eq!(session.subject_id, "auth0|123");
        assert_eq!(session.email.as_deref(), Some("auth0|123@example.com"));
    }

    #[tokio::test]
    async fn test_rejects_expired_wrong_issuer_and_audience() {
        let issuer = TestIssuer::start().await;
        let client = JwksClient::new(&issuer.server.uri(), "warden").await.unwrap();

        let expired = issuer.token("test-key", "u1", &issuer.server.uri(), -3600);
        assert!(matches!(
            client.validate_token(&expired).await,
            Err(AuthError::InvalidToken(_))
        ));

        let foreign = issuer.token("test-key", "u1", "https://elsewhere.example", 3600);
        assert!(matches!(
            client.validate_token(&foreign).await,
            Err(AuthError::InvalidToken(_))
        ));

        let other_audience = JwksClient::new(&issuer.server.uri(), "someone-else").await.unwrap();
        let token = issuer.token("test-key", "u1", &issuer.server.uri(), 3600);
        assert!(other_audience.validate_token(&token).await.is_err());
    }

    async fn jwks_fetches(server: &MockServer) -> usize {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == "/.well-known/jwks.json")
            .count()
    }

    #[tokio::test]
    async fn test_unknown_kid_refresh_is_throttled() {
        let issuer = TestIssuer::start().await;
        let client = JwksClient::new(&issuer.server.uri(), "").await.unwrap();
        assert_eq!(jwks_fetches(&issuer.server).await, 1);

        for kid in ["k1", "k2", "k3"] {
            let token = issuer.token(kid, "u1", &issuer.server.uri(), 3600);
            assert!(matches!(
                client.validate_token(&token).await,
                Err(AuthError::KeyNotFound(_))
            ));
        }
        assert_eq!(jwks_fetches(&issuer.server).await, 1);

        // Known keys keep validating without any fetch
        let token = issuer.token("test-key", "u1", &issuer.server.uri(), 3600);
        assert!(client.validate_token(&token).await.is_ok());
        assert_eq!(jwks_fetches(&issuer.server).await, 1);
    }

    #[tokio::test]
    async fn test_unknown_kid_after_refresh() {
        let issuer = TestIssuer::start().await;
        let client = JwksClient::new(&issuer.server.uri(), "")
            .await
            .unwrap()
            .with_min_refresh_interval(Duration::ZERO);

        let token = issuer.token("rotated-key", "u1", &issuer.server.uri(), 3600);
        let err = client.validate_token(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::KeyNotFound(kid) if kid == "rotated-key"));
        assert_eq!(jwks_fetches(&issuer.server).await, 2);
    }

    #[tokio::test]
    async fn test_garbage_token_and_missing_header() {
        let issuer = TestIssuer::start().await;
        let client = JwksClient::new(&issuer.server.uri(), "").await.unwrap();

        assert!(matches!(
            client.current_session(&bearer("not-a-jwt")).await,
            Err(AuthError::InvalidToken(_))
        ));
        assert!(matches!(
            client.current_session(&HeaderMap::new()).await,
            Err(AuthError::MissingHeader)
        ));
    }

    #[tokio::test]
    async fn test_discovery_failure() {
        let server = MockServer::start().await;
        let result = JwksClient::new(&server.uri(), "").await;
        assert!(matches!(result, Err(AuthError::JwksFetchError(_))));
    }
}
