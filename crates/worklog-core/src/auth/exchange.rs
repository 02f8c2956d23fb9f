//! Exchange of a Google ID token for identity-provider credentials.
//!
//! The browser consent flow that produces the Google ID token lives outside
//! this crate. Its output is handed to [`IdentityExchange`], and the
//! resulting pair goes to `SessionManager::sign_in`.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::AuthError;

/// Identity Toolkit sign-in-with-IdP endpoint
const SIGN_IN_WITH_IDP_URL: &str =
    "https://identitytoolkit.googleapis.com/v1/accounts:signInWithIdp";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInWithIdpRequest {
    request_uri: &'static str,
    post_body: String,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInWithIdpResponse {
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IdentityExchange {
    client: Client,
    endpoint: String,
}

impl IdentityExchange {
    pub fn new() -> Result<Self, AuthError> {
        Self::with_endpoint(SIGN_IN_WITH_IDP_URL)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AuthError::ExchangeFailed(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Returns `(access_token, refresh_token)`.
    pub async fn exchange_google_id_token(
        &self,
        api_key: &str,
        google_id_token: &str,
    ) -> Result<(String, String), AuthError> {
        let request = SignInWithIdpRequest {
            request_uri: "http://localhost",
            post_body: format!("id_token={}&providerId=google.com", google_id_token),
            return_secure_token: true,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await
            .map_err(|e| AuthError::ExchangeFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Identity exchange rejected");
            return Err(AuthError::ExchangeFailed(format!(
                "Status {}: {}",
                status,
                AuthError::truncate_body(&body)
            )));
        }

        let parsed: SignInWithIdpResponse = response
            .json()
            .await
            .map_err(|e| AuthError::ExchangeFailed(format!("Invalid response: {}", e)))?;

        match (parsed.id_token, parsed.refresh_token) {
            (Some(id_token), Some(refresh_token))
                if !id_token.is_empty() && !refresh_token.is_empty() =>
            {
                debug!("Identity exchange succeeded");
                Ok((id_token, refresh_token))
            }
            _ => Err(AuthError::ExchangeFailed(
                "Response missing idToken or refreshToken".to_string(),
            )),
        }
    }
}
