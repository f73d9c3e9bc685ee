//! Idle-eviction countdown timer for Kibitz rooms.
//!
//! Every room owns one [`IdleTimer`]. It is armed while the room has no
//! attached clients and disarmed the moment one attaches. When an armed
//! timer runs out, it delivers its expiry token over an mpsc channel so
//! the registry can tear the room down.
//!
//! # State machine
//!
//! ```text
//!   armed ⇄ disarmed
//!   armed ──(duration elapses, confirmed via fire())──→ fired  (terminal)
//! ```
//!
//! Re-arming always restarts the full duration — elapsed time never
//! carries over a disarm/rearm cycle.
//!
//! # Race-freedom
//!
//! The owner (a room) calls `arm`/`disarm`/`fire` only while holding its
//! own mutation lock, so "is a client attached" and "is the timer armed"
//! can never diverge. The countdown itself runs in a spawned task; an
//! epoch counter invalidates stale countdowns, and the token receiver is
//! expected to confirm with [`IdleTimer::fire`] (under the same lock)
//! before acting. A countdown that loses the race against a concurrent
//! `disarm` is therefore discarded, not acted on.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// Lifecycle state of an [`IdleTimer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Counting down. The expiry token will be sent when the duration
    /// elapses, unless `disarm` is called first.
    Armed,
    /// Not counting. `arm` restarts the full duration.
    Disarmed,
    /// The expiry was confirmed. Terminal — the timer never runs again.
    Fired,
}

/// A cancellable, restartable one-shot countdown.
///
/// On expiry the timer sends `token` over the channel given at
/// construction. Delivery is best-effort at the channel level; the
/// *authoritative* transition to [`TimerState::Fired`] happens only when
/// the receiver calls [`fire`](Self::fire), which returns `false` if the
/// timer was disarmed or already fired in the meantime.
///
/// Must be used inside a Tokio runtime — `arm` spawns the countdown task.
pub struct IdleTimer<T> {
    duration: Duration,
    token: T,
    notify: mpsc::UnboundedSender<T>,
    state: TimerState,
    /// Bumped on every arm/disarm; a countdown task only delivers if the
    /// epoch it captured is still current.
    epoch: Arc<AtomicU64>,
    pending: Option<JoinHandle<()>>,
}

impl<T: Clone + Send + 'static> IdleTimer<T> {
    /// Creates a disarmed timer. Call [`arm`](Self::arm) to start it.
    pub fn new(
        token: T,
        duration: Duration,
        notify: mpsc::UnboundedSender<T>,
    ) -> Self {
        Self {
            duration,
            token,
            notify,
            state: TimerState::Disarmed,
            epoch: Arc::new(AtomicU64::new(0)),
            pending: None,
        }
    }

    /// Starts (or restarts) the countdown with the full duration.
    ///
    /// No-op once the timer has fired.
    pub fn arm(&mut self) {
        if self.state == TimerState::Fired {
            return;
        }
        let epoch = self.invalidate_pending();
        self.state = TimerState::Armed;

        let duration = self.duration;
        let token = self.token.clone();
        let notify = self.notify.clone();
        let current = Arc::clone(&self.epoch);

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            // A disarm/rearm since we started means this countdown is
            // stale — swallow it.
            if current.load(Ordering::SeqCst) == epoch {
                let _ = notify.send(token);
            }
        }));
        trace!(duration = ?self.duration, "idle timer armed");
    }

    /// Cancels a pending countdown.
    ///
    /// No-op once the timer has fired.
    pub fn disarm(&mut self) {
        if self.state == TimerState::Fired {
            return;
        }
        self.invalidate_pending();
        self.state = TimerState::Disarmed;
        trace!("idle timer disarmed");
    }

    /// Confirms an expiry. Returns `true` exactly once, and only if the
    /// timer is still armed — a token that raced a `disarm` yields
    /// `false` and must be ignored by the caller.
    pub fn fire(&mut self) -> bool {
        if self.state != TimerState::Armed {
            return false;
        }
        self.invalidate_pending();
        self.state = TimerState::Fired;
        true
    }

    /// Current state.
    pub fn state(&self) -> TimerState {
        self.state
    }

    /// Whether the countdown is currently running.
    pub fn is_armed(&self) -> bool {
        self.state == TimerState::Armed
    }

    /// The configured countdown duration.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Bumps the epoch (invalidating any in-flight countdown) and aborts
    /// the pending task. Returns the new epoch for the next countdown.
    fn invalidate_pending(&mut self) -> u64 {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        epoch
    }
}

impl<T> Drop for IdleTimer<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}
