use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Identity provider configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Token refresh timed out")]
    NetworkTimeout,

    #[error("Identity exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("Credential storage error: {0}")]
    Storage(#[from] std::io::Error),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 200;

impl AuthError {
    pub(crate) fn refresh_from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AuthError::NetworkTimeout
        } else {
            AuthError::RefreshFailed(err.to_string())
        }
    }

    /// Truncate a response body so error messages stay readable.
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }
}
