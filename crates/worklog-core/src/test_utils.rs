//! Test doubles for the session manager's collaborators.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::auth::{AuthError, RefreshTimer, TickFn, TickOutcome, TokenRefresher};

/// Refresher that replays queued responses and records its calls.
#[derive(Default)]
pub struct ScriptedRefresher {
    responses: Mutex<VecDeque<Result<String, AuthError>>>,
    calls: Mutex<Vec<(String, String)>>,
    gate: Option<Notify>,
}

impl ScriptedRefresher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every refresh waits for [`Self::release`] before answering.
    pub fn gated() -> Self {
        Self {
            gate: Some(Notify::new()),
            ..Self::default()
        }
    }

    pub fn push_ok(&self, token: &str) {
        self.responses.lock().unwrap().push_back(Ok(token.to_string()));
    }

    pub fn push_err(&self, err: AuthError) {
        self.responses.lock().unwrap().push_back(Err(err));
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl TokenRefresher for ScriptedRefresher {
    async fn refresh(&self, refresh_token: &str, api_key: &str) -> Result<String, AuthError> {
        self.calls
            .lock()
            .unwrap()
            .push((refresh_token.to_string(), api_key.to_string()));

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AuthError::RefreshFailed("no scripted response".into())))
    }
}

/// Timer whose ticks are fired by the test.
#[derive(Default)]
pub struct ManualTimer {
    tick: Mutex<Option<TickFn>>,
    running: AtomicBool,
    starts: AtomicUsize,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Run one tick if the timer is running.
    pub async fn fire(&self) -> Option<TickOutcome> {
        if !self.running.load(Ordering::SeqCst) {
            return None;
        }
        let tick = self.tick.lock().unwrap().clone()?;
        let outcome = tick().await;
        if outcome == TickOutcome::Stop {
            self.running.store(false, Ordering::SeqCst);
        }
        Some(outcome)
    }
}

impl RefreshTimer for ManualTimer {
    fn start(&self, _interval: Duration, tick: TickFn) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        *self.tick.lock().unwrap() = Some(tick);
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
