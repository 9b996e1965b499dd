use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Mutex;

#[cfg(test)]
use mockall::automock;

use super::configs::AzureCredentials;
use crate::errors::{AideError, AideResult};

pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Tokens are refreshed this long before the identity provider says they expire
pub const DEFAULT_REFRESH_BUFFER: Duration = Duration::from_secs(5 * 60);

const DEFAULT_EXPIRES_IN: i64 = 3600;

/// Source of the bearer token sent to the gateway
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TokenSupplier: Send + Sync {
    async fn get_token(&self) -> AideResult<String>;
}

/// A fixed token, for callers that manage credentials themselves
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSupplier for StaticToken {
    async fn get_token(&self) -> AideResult<String> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    /// Already reduced by the refresh buffer
    expires_at: DateTime<Utc>,
}

/// OAuth2 client-credentials token fetcher with an in-memory cache.
///
/// The cache lock is held across a refresh, so concurrent callers that find
/// the token stale wait for the one in-flight request instead of issuing
/// their own.
pub struct AzureTokenCache {
    client: Client,
    credentials: AzureCredentials,
    cached: Mutex<Option<CachedToken>>,
}

impl AzureTokenCache {
    pub fn new(credentials: AzureCredentials) -> Self {
        Self::with_client(Client::new(), credentials)
    }

    pub fn with_client(client: Client, credentials: AzureCredentials) -> Self {
        Self {
            client,
            credentials,
            cached: Mutex::new(None),
        }
    }

    pub fn token_endpoint(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.credentials.authority.trim_end_matches('/'),
            self.credentials.tenant_id
        )
    }

    /// Drop the cached token so the next call fetches a fresh one
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    async fn fetch(&self) -> AideResult<CachedToken> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("scope", self.credentials.scope.as_str()),
            ("grant_type", "client_credentials"),
        ];

        let resp = self
            .client
            .post(self.token_endpoint())
            .form(&params)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "token request failed");
            return Err(AideError::Auth {
                status: status.as_u16(),
                body,
            });
        }

        let token_response: Value = resp.json().await?;
        let access_token = token_response
            .get("access_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AideError::Auth {
                status: status.as_u16(),
                body: "access_token not found in token response".to_string(),
            })?
            .to_string();

        // Some identity endpoints send expires_in as a string
        let expires_in = match token_response.get("expires_in") {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        }
        .unwrap_or(DEFAULT_EXPIRES_IN);

        let buffer = chrono::Duration::from_std(self.credentials.refresh_buffer)
            .unwrap_or_else(|_| chrono::Duration::zero());
        let expires_at = chrono::Duration::try_seconds(expires_in)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .and_then(|at| at.checked_sub_signed(buffer))
            .ok_or_else(|| AideError::Auth {
                status: status.as_u16(),
                body: format!("expires_in {} is out of range", expires_in),
            })?;

        tracing::info!(expires_in, "fetched new gateway token");

        Ok(CachedToken {
            token: access_token,
            expires_at,
        })
    }
}

#[async_trait]
impl TokenSupplier for AzureTokenCache {
    async fn get_token(&self) -> AideResult<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if Utc::now() < token.expires_at {
                tracing::debug!("using cached gateway token");
                return Ok(token.token.clone());
            }
        }

        let fresh = self.fetch().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN_PATH: &str = "/test-tenant/oauth2/v2.0/token";

    fn credentials(authority: String) -> AzureCredentials {
        AzureCredentials {
            tenant_id: "test-tenant".to_string(),
            client_id: "test-client".to_string(),
            client_secret: "test-secret".to_string(),
            scope: "api://aide/.default".to_string(),
            authority,
            refresh_buffer: DEFAULT_REFRESH_BUFFER,
        }
    }

    fn token_response(token: &str, expires_in: i64) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "access_token": token,
            "expires_in": expires_in
        }))
    }

    #[tokio::test]
    async fn test_static_token() -> anyhow::Result<()> {
        let supplier = StaticToken::new("fixed");
        assert_eq!(supplier.get_token().await?, "fixed");
        Ok(())
    }

    #[tokio::test]
    async fn test_cached_token_is_reused() -> anyhow::Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=test-client"))
            .and(body_string_contains("client_secret=test-secret"))
            .respond_with(token_response("token-1", 3600))
            .expect(1)
            .mount(&mock_server)
            .await;

        let cache = AzureTokenCache::new(credentials(mock_server.uri()));
        assert_eq!(cache.get_token().await?, "token-1");
        assert_eq!(cache.get_token().await?, "token-1");
        Ok(())
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed() -> anyhow::Result<()> {
        let mock_server = MockServer::start().await;
        // expires_in equal to the refresh buffer is stale as soon as it arrives
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(token_response("token-1", 300))
            .up_to_n_times(1)
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(token_response("token-2", 3600))
            .expect(1)
            .mount(&mock_server)
            .await;

        let cache = AzureTokenCache::new(credentials(mock_server.uri()));
        assert_eq!(cache.get_token().await?, "token-1");
        assert_eq!(cache.get_token().await?, "token-2");
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() -> anyhow::Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(
                token_response("shared", 3600).set_delay(std::time::Duration::from_millis(100)),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let cache = Arc::new(AzureTokenCache::new(credentials(mock_server.uri())));
        let (a, b, c) = tokio::join!(cache.get_token(), cache.get_token(), cache.get_token());

        assert_eq!(a?, "shared");
        assert_eq!(b?, "shared");
        assert_eq!(c?, "shared");
        Ok(())
    }

    #[tokio::test]
    async fn test_invalidate_forces_refresh() -> anyhow::Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(token_response("token", 3600))
            .expect(2)
            .mount(&mock_server)
            .await;

        let cache = AzureTokenCache::new(credentials(mock_server.uri()));
        cache.get_token().await?;
        cache.invalidate().await;
        cache.get_token().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_string_expires_in() -> anyhow::Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "token",
                "expires_in": "3599"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let cache = AzureTokenCache::new(credentials(mock_server.uri()));
        cache.get_token().await?;
        cache.get_token().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_out_of_range_expires_in_is_an_auth_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(token_response("token", i64::MAX))
            .expect(1)
            .mount(&mock_server)
            .await;

        let cache = AzureTokenCache::new(credentials(mock_server.uri()));
        match cache.get_token().await {
            Err(AideError::Auth { status, body }) => {
                assert_eq!(status, 200);
                assert!(body.contains("out of range"));
            }
            other => panic!("Expected Auth error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_token_endpoint_failure() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
            .mount(&mock_server)
            .await;

        let cache = AzureTokenCache::new(credentials(mock_server.uri()));
        match cache.get_token().await {
            Err(AideError::Auth { status, body }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "invalid_client");
            }
            other => panic!("Expected Auth error, got {:?}", other),
        }
    }

    #[test]
    fn test_token_endpoint_url() {
        let cache = AzureTokenCache::new(credentials(format!("{}/", DEFAULT_AUTHORITY)));
        assert_eq!(
            cache.token_endpoint(),
            "https://login.microsoftonline.com/test-tenant/oauth2/v2.0/token"
        );
    }
}
