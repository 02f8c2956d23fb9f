//! Refresh-token grant against the identity provider's token endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::AuthError;

/// Secure token endpoint for the refresh-token grant
const TOKEN_ENDPOINT: &str = "https://securetoken.googleapis.com/v1/token";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Trades a refresh token for a fresh access token.
///
/// Implementations are stateless with respect to the session: they know
/// nothing about persistence or scheduling.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str, api_key: &str) -> Result<String, AuthError>;
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(default)]
    id_token: Option<String>,
}

/// [`TokenRefresher`] backed by the secure token HTTP endpoint.
#[derive(Debug, Clone)]
pub struct SecureTokenRefresher {
    client: Client,
    endpoint: String,
}

impl SecureTokenRefresher {
    pub fn new() -> Result<Self, AuthError> {
        Self::with_endpoint(TOKEN_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self, AuthError> {
        Self::with_timeout(endpoint, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::RefreshFailed(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl TokenRefresher for SecureTokenRefresher {
    async fn refresh(&self, refresh_token: &str, api_key: &str) -> Result<String, AuthError> {
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", api_key)])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(AuthError::refresh_from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::RefreshFailed(format!(
                "Status {}: {}",
                status,
                AuthError::truncate_body(&body)
            )));
        }

        let parsed: RefreshResponse = response
            .json()
            .await
            .map_err(AuthError::refresh_from_transport)?;

        match parsed.id_token.filter(|t| !t.is_empty()) {
            Some(token) => {
                debug!(token_len = token.len(), "Access token refreshed");
                Ok(token)
            }
            None => Err(AuthError::RefreshFailed(
                "Response did not include an id_token".to_string(),
            )),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
