//! REST API client module for the worklog backend.
//!
//! Requests carry the session's access token as a bearer token. When the
//! backend rejects one with 401/403 the client calls the registered
//! [`AuthFailureHook`](crate::auth::AuthFailureHook) before returning the
//! error, so the session collapses no matter which call noticed it.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
