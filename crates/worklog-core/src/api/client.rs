//! API client for communicating with the worklog backend.

use std::time::Duration;

use reqwest::{header, Client};
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::AuthFailureHook;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Base URL for the worklog backend
const API_BASE_URL: &str = "https://work-log.cc/api";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// API client for the worklog backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    on_auth_failure: Option<AuthFailureHook>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("has_token", &self.token.is_some())
            .field("has_auth_failure_hook", &self.on_auth_failure.is_some())
            .finish()
    }
}

impl ApiClient {
    pub fn new() -> Result<Self, ApiError> {
        Self::with_base_url(API_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            on_auth_failure: None,
        })
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
            on_auth_failure: self.on_auth_failure.clone(),
        }
    }

    /// Register the callback run when the backend answers 401 or 403.
    pub fn with_auth_failure_hook(mut self, hook: AuthFailureHook) -> Self {
        self.on_auth_failure = Some(hook);
        self
    }

    /// Check if response is successful, returning an error with body if not.
    /// Authorization failures run the hook first.
    async fn check_response(&self, response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if matches!(status.as_u16(), 401 | 403) {
            warn!(%status, "Backend rejected credentials");
            if let Some(hook) = &self.on_auth_failure {
                hook();
            }
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status, &body))
    }

    /// Fetch worklogs. Query parameters are forwarded to the backend as-is.
    pub async fn get_worklogs(&self, params: &[(&str, &str)]) -> Result<Value, ApiError> {
        let token = self.token.as_deref().ok_or(ApiError::NotSignedIn)?;
        let url = format!("{}/worklogs", self.base_url);

        let response = self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .bearer_auth(token)
            .query(params)
            .send()
            .await?;

        let response = self.check_response(response).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        debug!(url = %url, "Fetched worklogs");
        Ok(body)
    }
}

// ============================================================================
// Tests
// ============================================================================
