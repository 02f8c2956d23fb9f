//! Authentication module for managing the user's session.
//!
//! This module provides:
//! - `SessionManager`: owns the access/refresh token pair, persists it and
//!   signs out on refresh failure or backend authorization failure
//! - `CredentialStore`: obfuscated on-disk storage of the token pair
//! - `TokenRefresher`: the refresh-token grant against the identity provider
//! - `RefreshTimer`: the background cadence that keeps the access token alive
//! - `exchange`: trading a Google ID token for identity-provider tokens

pub mod credentials;
pub mod error;
pub mod exchange;
pub mod refresher;
pub mod scheduler;
pub mod session;

pub use credentials::{CredentialStore, PersistedCredentialRecord};
pub use error::AuthError;
pub use exchange::IdentityExchange;
pub use refresher::{SecureTokenRefresher, TokenRefresher};
pub use scheduler::{RefreshTimer, TickFn, TickOutcome, TokioTimer};
pub use session::{
    AuthFailureHook, RefreshOutcome, SessionManager, SessionOptions, SessionSnapshot,
    SessionState,
};
