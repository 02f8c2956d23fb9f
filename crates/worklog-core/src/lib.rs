//! Core library for the worklog desktop client.
//!
//! This crate owns everything with real state behind the UI:
//! - `config`: identity-provider settings from a local file or the environment
//! - `auth`: the persisted session, background token refresh and sign-out
//! - `api`: the backend API client, which reports authorization failures
//!   back to the session through an [`auth::AuthFailureHook`]

pub mod api;
pub mod auth;
pub mod config;

#[cfg(test)]
pub(crate) mod test_utils;

pub use api::{ApiClient, ApiError};
pub use auth::{
    AuthError, AuthFailureHook, CredentialStore, RefreshOutcome, SessionManager, SessionOptions,
    SessionSnapshot, SessionState,
};
pub use config::{GoogleOAuthClient, IdentityConfig};
