//! One-shot timers behind a swappable interface.
//!
//! The queue schedules backoff retries and completed-action pruning through
//! a [`Scheduler`]. [`TokioScheduler`] runs on the Tokio timer wheel;
//! [`ManualScheduler`] only fires when told to, which makes retry timing
//! deterministic in tests.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Callback run when a timer fires.
pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;

/// Cancels a scheduled timer. Dropping the handle leaves the timer running.
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl TimerHandle {
    /// Wrap a cancellation callback.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Cancel the timer if it has not fired yet.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}

/// Runs a task once after a delay.
pub trait Scheduler: Send + Sync {
    /// Schedule `task` to run after `delay`.
    fn after(&self, delay: Duration, task: TimerTask) -> TimerHandle;
}

/// Scheduler backed by `tokio::time::sleep`. Requires a running runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn after(&self, delay: Duration, task: TimerTask) -> TimerHandle {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
        TimerHandle::new(move || handle.abort())
    }
}

struct PendingTimer {
    id: u64,
    due: Duration,
    task: TimerTask,
}

#[derive(Default)]
struct ManualClock {
    now: Duration,
    next_id: u64,
    pending: Vec<PendingTimer>,
}

/// Virtual-clock scheduler; timers fire only from [`ManualScheduler::advance`].
#[derive(Clone, Default)]
pub struct ManualScheduler {
    clock: Arc<Mutex<ManualClock>>,
}

impl ManualScheduler {
    /// Create a scheduler at virtual time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn clock(&self) -> MutexGuard<'_, ManualClock> {
        self.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Virtual time elapsed so far.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.clock().now
    }

    /// Remaining delays of armed timers, soonest first.
    #[must_use]
    pub fn pending(&self) -> Vec<Duration> {
        let clock = self.clock();
        let mut delays: Vec<Duration> = clock
            .pending
            .iter()
            .map(|timer| timer.due.saturating_sub(clock.now))
            .collect();
        delays.sort();
        delays
    }

    /// Move the clock forward and run every timer that came due, in due
    /// order. Returns how many fired.
    pub fn advance(&self, by: Duration) -> usize {
        let due = {
            let mut clock = self.clock();
            clock.now += by;
            let now = clock.now;

            let (mut due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut clock.pending)
                .into_iter()
                .partition(|timer| timer.due <= now);
            clock.pending = pending;
            due.sort_by_key(|timer| (timer.due, timer.id));
            due
        };

        // Run outside the lock so tasks can schedule new timers
        let fired = due.len();
        for timer in due {
            (timer.task)();
        }
        fired
    }

    /// Advance exactly to the soonest armed timer and fire it.
    ///
    /// Returns the delay that was skipped, or `None` if nothing is armed.
    pub fn fire_next(&self) -> Option<Duration> {
        let delay = self.pending().first().copied()?;
        self.advance(delay);
        Some(delay)
    }
}

impl Scheduler for ManualScheduler {
    fn after(&self, delay: Duration, task: TimerTask) -> TimerHandle {
        let id = {
            let mut clock = self.clock();
            let id = clock.next_id;
            clock.next_id += 1;
            let due = clock.now + delay;
            clock.pending.push(PendingTimer { id, due, task });
            id
        };

        let clock = Arc::clone(&self.clock);
        TimerHandle::new(move || {
            clock
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pending
                .retain(|timer| timer.id != id);
        })
    }
}
