//! Background cadence for token refresh.
//!
//! The session manager only needs `start(interval, tick)` and `stop()`, so the
//! timer is a trait. [`TokioTimer`] runs the cadence on a spawned tokio task;
//! tests drive ticks by hand.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// What the timer should do after a tick has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Stop,
}

/// Callback run on every tick.
pub type TickFn = Arc<dyn Fn() -> BoxFuture<'static, TickOutcome> + Send + Sync>;

pub trait RefreshTimer: Send + Sync {
    /// Begin invoking `tick` every `interval`, first after one full interval.
    /// Does nothing if already running.
    fn start(&self, interval: Duration, tick: TickFn);

    /// Cancel the cadence. Safe to call when not running; no new tick begins
    /// once this returns.
    fn stop(&self);

    fn is_running(&self) -> bool;
}

struct RunningTimer {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// [`RefreshTimer`] that runs on the ambient tokio runtime.
#[derive(Default)]
pub struct TokioTimer {
    running: Mutex<Option<RunningTimer>>,
}

impl std::fmt::Debug for TokioTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioTimer")
            .field("running", &self.is_running())
            .finish()
    }
}

impl TokioTimer {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<RunningTimer>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run(interval: Duration, tick: TickFn, cancel: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if cancel.is_cancelled() {
                break;
            }
            if tick().await == TickOutcome::Stop {
                debug!("Refresh timer stopped by tick");
                break;
            }
        }
    }
}

impl RefreshTimer for TokioTimer {
    fn start(&self, interval: Duration, tick: TickFn) {
        let mut slot = self.slot();
        if slot.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return;
        }

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, "No tokio runtime; background refresh disabled");
                return;
            }
        };

        let cancel = CancellationToken::new();
        let task = handle.spawn(Self::run(interval, tick, cancel.clone()));
        debug!(interval_secs = interval.as_secs(), "Refresh timer started");
        *slot = Some(RunningTimer {
            cancel,
            handle: task,
        });
    }

    fn stop(&self) {
        if let Some(running) = self.slot().take() {
            running.cancel.cancel();
            debug!("Refresh timer stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.slot()
            .as_ref()
            .is_some_and(|r| !r.cancel.is_cancelled() && !r.handle.is_finished())
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// Tests
// ============================================================================
