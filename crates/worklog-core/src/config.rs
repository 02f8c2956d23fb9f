//! Identity-provider configuration.
//!
//! Settings are read from `~/.config/worklog/firebase_config.json` when it
//! exists and carries an `apiKey`. Otherwise the `WORKLOG_FB_*` environment
//! variables are used. Configuration is loaded once and never cached here;
//! the session manager keeps its own copy.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::AuthError;

/// Application name used for the config directory path
const APP_NAME: &str = "worklog";

/// Identity-provider settings file name
const FIREBASE_CONFIG_FILE: &str = "firebase_config.json";

/// Google desktop-app client secrets file name
const GOOGLE_OAUTH_FILE: &str = "google_oauth_client.json";

pub const ENV_API_KEY: &str = "WORKLOG_FB_API_KEY";
pub const ENV_CLIENT_ID: &str = "WORKLOG_FB_CLIENT_ID";
pub const ENV_PROJECT_ID: &str = "WORKLOG_FB_PROJECT_ID";
pub const ENV_GOOGLE_CLIENT_ID: &str = "WORKLOG_GOOGLE_CLIENT_ID";

/// Per-user configuration directory, e.g. `~/.config/worklog`.
pub fn config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
    Ok(config_dir.join(APP_NAME))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityConfig {
    pub api_key: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
}

impl IdentityConfig {
    /// Load from the user's config directory, falling back to the environment.
    pub fn load() -> Result<Self, AuthError> {
        let path = config_dir().ok().map(|dir| dir.join(FIREBASE_CONFIG_FILE));
        Self::load_from(path.as_deref(), |key| std::env::var(key).ok())
    }

    /// Load from an explicit file path and environment lookup.
    ///
    /// A file that is missing, unreadable, malformed or lacks `apiKey` falls
    /// through to the environment instead of failing.
    pub fn load_from<F>(path: Option<&Path>, env: F) -> Result<Self, AuthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(config) = path.and_then(Self::read_file) {
            debug!("Identity config loaded from file");
            return Ok(config);
        }

        let lookup = |key: &str| env(key).filter(|value| !value.trim().is_empty());
        match lookup(ENV_API_KEY) {
            Some(api_key) => {
                debug!("Identity config loaded from environment");
                Ok(Self {
                    api_key,
                    client_id: lookup(ENV_CLIENT_ID),
                    project_id: lookup(ENV_PROJECT_ID),
                })
            }
            None => Err(AuthError::ConfigurationMissing(format!(
                "set {} or create {}",
                ENV_API_KEY,
                path.map(|p| p.display().to_string())
                    .unwrap_or_else(|| FIREBASE_CONFIG_FILE.to_string())
            ))),
        }
    }

    fn read_file(path: &Path) -> Option<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read identity config");
                return None;
            }
        };

        match serde_json::from_str::<Self>(&contents) {
            Ok(config) if !config.api_key.trim().is_empty() => Some(config),
            Ok(_) => {
                warn!(path = %path.display(), "Identity config has an empty apiKey");
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring malformed identity config");
                None
            }
        }
    }
}

/// OAuth client used by the browser consent flow that precedes sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleOAuthClient {
    pub client_id: String,
}

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    #[serde(default)]
    installed: Option<ClientSection>,
    #[serde(default)]
    client_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClientSection {
    client_id: Option<String>,
}

impl GoogleOAuthClient {
    pub fn load() -> Result<Self, AuthError> {
        let path = config_dir().ok().map(|dir| dir.join(GOOGLE_OAUTH_FILE));
        Self::load_from(path.as_deref(), |key| std::env::var(key).ok())
    }

    /// Accepts the downloaded "Desktop app" JSON (`installed.client_id`) or a
    /// flat `client_id`, then falls back to `WORKLOG_GOOGLE_CLIENT_ID`.
    pub fn load_from<F>(path: Option<&Path>, env: F) -> Result<Self, AuthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let from_file = path
            .and_then(|p| std::fs::read_to_string(p).ok())
            .and_then(|contents| serde_json::from_str::<ClientSecretsFile>(&contents).ok())
            .and_then(|file| {
                file.installed
                    .and_then(|section| section.client_id)
                    .or(file.client_id)
            })
            .filter(|id| !id.trim().is_empty());

        from_file
            .or_else(|| env(ENV_GOOGLE_CLIENT_ID).filter(|id| !id.trim().is_empty()))
            .map(|client_id| Self { client_id })
            .ok_or_else(|| {
                AuthError::ConfigurationMissing(format!(
                    "set {} or download the desktop client JSON to {}",
                    ENV_GOOGLE_CLIENT_ID, GOOGLE_OAUTH_FILE
                ))
            })
    }
}

// ============================================================================
// Tests
// ============================================================================
