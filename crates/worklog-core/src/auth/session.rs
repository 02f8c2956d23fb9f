//! Session state for the signed-in user.
//!
//! [`SessionManager`] owns the access/refresh token pair for the lifetime of
//! the application. It restores the pair from disk at startup, keeps the
//! access token alive on a background timer and collapses the session on any
//! of three triggers: an explicit sign-out, a failed refresh, or the backend
//! rejecting a request (via [`SessionManager::auth_failure_hook`]).
//!
//! All mutations go through one mutex. The refresh network call runs outside
//! it; its result is applied only if no sign-in or sign-out happened while it
//! was in flight.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::IdentityConfig;

use super::credentials::{CredentialStore, PersistedCredentialRecord};
use super::refresher::{SecureTokenRefresher, TokenRefresher};
use super::scheduler::{RefreshTimer, TickFn, TickOutcome, TokioTimer};
use super::AuthError;

/// Interval between background refreshes.
/// Identity-provider access tokens live for one hour; 45 minutes keeps a
/// comfortable margin without refreshing needlessly.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(45 * 60);

/// Callback the API client invokes when the backend answers 401/403.
pub type AuthFailureHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub credentials_path: PathBuf,
    /// Refresh a restored session once during construction.
    pub auto_refresh: bool,
    pub refresh_interval: Duration,
}

impl SessionOptions {
    pub fn new(credentials_path: PathBuf) -> Self {
        Self {
            credentials_path,
            auto_refresh: true,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }

    /// Options pointing at `~/.config/worklog/credentials.dat`.
    pub fn from_default_path() -> Result<Self> {
        Ok(Self::new(CredentialStore::default_path()?))
    }

    pub fn with_auto_refresh(mut self, auto_refresh: bool) -> Self {
        self.auto_refresh = auto_refresh;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    SignedOut,
    SignedIn,
}

/// Immutable copy of the session at one point in time.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Last successful sign-in or refresh in this process.
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl SessionSnapshot {
    pub fn state(&self) -> SessionState {
        if self.access_token.is_some() && self.refresh_token.is_some() {
            SessionState::SignedIn
        } else {
            SessionState::SignedOut
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.state() == SessionState::SignedIn
    }
}

// Tokens never show up in logs.
impl std::fmt::Debug for SessionSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSnapshot")
            .field("has_access_token", &self.access_token.is_some())
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("refreshed_at", &self.refreshed_at)
            .finish()
    }
}

/// Result of [`SessionManager::refresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// No refresh token, nothing to do.
    Skipped,
    Refreshed,
    /// The refresh failed and the session was cleared.
    SignedOut,
    /// The session changed while the refresh was in flight; result discarded.
    Superseded,
}

#[derive(Default)]
struct SessionData {
    access_token: Option<String>,
    refresh_token: Option<String>,
    refreshed_at: Option<DateTime<Utc>>,
    /// Bumped by every sign-in and sign-out.
    generation: u64,
}

impl SessionData {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            refreshed_at: self.refreshed_at,
        }
    }
}

struct SessionInner {
    config: IdentityConfig,
    options: SessionOptions,
    store: CredentialStore,
    refresher: Arc<dyn TokenRefresher>,
    timer: Arc<dyn RefreshTimer>,
    data: Mutex<SessionData>,
    changes: watch::Sender<SessionSnapshot>,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.timer.stop();
    }
}

/// Owner of the single active session. Clone is cheap; clones share state.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &self.state())
            .field("credentials_path", &self.inner.store.path())
            .field("refresh_running", &self.inner.timer.is_running())
            .finish()
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

impl SessionManager {
    /// Build a manager with the HTTP refresher and a tokio timer.
    ///
    /// Fails only when the identity-provider configuration is missing.
    pub async fn new(options: SessionOptions) -> Result<Self, AuthError> {
        let config = IdentityConfig::load()?;
        let refresher = Arc::new(SecureTokenRefresher::new()?);
        Ok(Self::with_components(config, options, refresher, Arc::new(TokioTimer::new())).await)
    }

    /// Restore any saved session and, with auto-refresh on, refresh it once
    /// before returning. The background timer starts only if that refresh
    /// leaves the session signed in; otherwise it waits for [`Self::sign_in`].
    pub async fn with_components(
        config: IdentityConfig,
        options: SessionOptions,
        refresher: Arc<dyn TokenRefresher>,
        timer: Arc<dyn RefreshTimer>,
    ) -> Self {
        let store = CredentialStore::new(options.credentials_path.clone());

        let mut data = SessionData::default();
        match store.load() {
            Some(record) => {
                debug!(path = %store.path().display(), "Saved session found");
                data.access_token = Some(record.id_token);
                data.refresh_token = Some(record.refresh_token);
            }
            None => debug!("No saved session"),
        }

        let has_refresh_token = data.refresh_token.is_some();
        let (changes, _) = watch::channel(data.snapshot());
        let manager = Self {
            inner: Arc::new(SessionInner {
                config,
                options,
                store,
                refresher,
                timer,
                data: Mutex::new(data),
                changes,
            }),
        };

        if manager.inner.options.auto_refresh
            && has_refresh_token
            && manager.refresh().await == RefreshOutcome::Refreshed
        {
            manager.start_refresh_timer();
        }

        manager
    }

    fn lock_data(&self) -> MutexGuard<'_, SessionData> {
        self.inner.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ===== Read accessors =====

    /// Current access token. May be invalidated right after this returns.
    pub fn access_token(&self) -> Option<String> {
        self.inner.changes.borrow().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.inner.changes.borrow().refresh_token.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.changes.borrow().clone()
    }

    pub fn state(&self) -> SessionState {
        self.inner.changes.borrow().state()
    }

    pub fn is_signed_in(&self) -> bool {
        self.state() == SessionState::SignedIn
    }

    /// Change notifications for the UI layer. Emits only on real changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.changes.subscribe()
    }

    pub fn identity_config(&self) -> &IdentityConfig {
        &self.inner.config
    }

    pub fn credentials_path(&self) -> &Path {
        self.inner.store.path()
    }

    pub fn is_refresh_running(&self) -> bool {
        self.inner.timer.is_running()
    }

    // ===== Transitions =====

    /// Install a freshly exchanged token pair, persist it and start the
    /// background refresh if it is not already running.
    pub fn sign_in(&self, access_token: &str, refresh_token: &str) {
        let mut data = self.lock_data();
        data.generation += 1;
        data.refresh_token = non_empty(refresh_token);
        data.access_token = data
            .refresh_token
            .as_ref()
            .and_then(|_| non_empty(access_token));
        data.refreshed_at = Some(Utc::now());

        self.persist(&data);
        self.publish(&data);

        if data.access_token.is_some() {
            info!("Signed in");
            self.start_refresh_timer();
        } else {
            warn!("Sign-in called with an empty token; session left signed out");
        }
    }

    /// Trade the refresh token for a new access token.
    ///
    /// Any failure signs the session out. There is no retry in place.
    pub async fn refresh(&self) -> RefreshOutcome {
        let ticket = {
            let data = self.lock_data();
            let generation = data.generation;
            data.refresh_token.clone().map(|token| (token, generation))
        };
        let Some((refresh_token, generation)) = ticket else {
            debug!("No refresh token; skipping refresh");
            return RefreshOutcome::Skipped;
        };

        let result = self
            .inner
            .refresher
            .refresh(&refresh_token, &self.inner.config.api_key)
            .await;

        let mut data = self.lock_data();
        if data.generation != generation {
            debug!("Session changed during refresh; discarding result");
            return RefreshOutcome::Superseded;
        }

        match result {
            Ok(access_token) if !access_token.is_empty() => {
                data.access_token = Some(access_token);
                data.refreshed_at = Some(Utc::now());
                self.persist(&data);
                self.publish(&data);
                debug!("Session refreshed");
                RefreshOutcome::Refreshed
            }
            Ok(_) => {
                warn!("Refresh returned an empty access token; signing out");
                self.clear_locked(&mut data, "empty refresh response");
                RefreshOutcome::SignedOut
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed; signing out");
                self.clear_locked(&mut data, "refresh failed");
                RefreshOutcome::SignedOut
            }
        }
    }

    /// Stop background refresh, forget both tokens and delete the saved
    /// record. Safe to call repeatedly.
    pub fn sign_out(&self) {
        let mut data = self.lock_data();
        self.clear_locked(&mut data, "user request");
    }

    /// Hook for the API client. Has the same effect as [`Self::sign_out`].
    ///
    /// Holds only a weak reference, so it never keeps the session alive.
    pub fn auth_failure_hook(&self) -> AuthFailureHook {
        let weak: Weak<SessionInner> = Arc::downgrade(&self.inner);
        Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                let manager = SessionManager { inner };
                let mut data = manager.lock_data();
                manager.clear_locked(&mut data, "backend rejected credentials");
            }
        })
    }

    // ===== Internals (caller holds the data lock) =====

    fn clear_locked(&self, data: &mut SessionData, reason: &str) {
        self.inner.timer.stop();

        let was_signed_in = data.access_token.is_some() || data.refresh_token.is_some();
        data.generation += 1;
        data.access_token = None;
        data.refresh_token = None;
        data.refreshed_at = None;

        if let Err(e) = self.inner.store.clear() {
            warn!(error = %e, "Failed to delete saved credentials");
        }
        self.publish(data);

        if was_signed_in {
            info!(reason, "Signed out");
        } else {
            debug!(reason, "Sign-out on an already signed-out session");
        }
    }

    fn persist(&self, data: &SessionData) {
        let record = match (&data.access_token, &data.refresh_token) {
            (Some(access), Some(refresh)) => PersistedCredentialRecord::new(access, refresh),
            _ => None,
        };

        let result = match record {
            Some(record) => self.inner.store.save(&record),
            None => self.inner.store.clear(),
        };
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist session");
        }
    }

    fn publish(&self, data: &SessionData) {
        let snapshot = data.snapshot();
        self.inner.changes.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    fn start_refresh_timer(&self) {
        if self.inner.timer.is_running() {
            return;
        }

        let weak = Arc::downgrade(&self.inner);
        let tick: TickFn = Arc::new(move || {
            let weak = weak.clone();
            async move {
                let Some(inner) = weak.upgrade() else {
                    return TickOutcome::Stop;
                };
                let manager = SessionManager { inner };
                manager.refresh().await;
                if manager.is_signed_in() {
                    TickOutcome::Continue
                } else {
                    TickOutcome::Stop
                }
            }
            .boxed()
        });

        self.inner
            .timer
            .start(self.inner.options.refresh_interval, tick);
    }
}

// ============================================================================
// Tests
// ============================================================================
