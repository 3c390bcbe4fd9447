//! Queue processor.
//!
//! A drain walks the queued actions in array order and executes them one at
//! a time against their registered handlers:
//!
//! ```text
//! queued  -> sending -> completed -> (grace timer) -> removed
//! sending -> queued   (failure below the retry limit, backoff timer armed)
//! sending -> failed   (failure at the retry limit, or no handler)
//! failed  -> queued   (manual retry only)
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use super::action::{ActionStatus, QueuedAction};
use super::offline::{OfflineQueue, RetryTimer};
use super::registry::HandlerError;

/// How a drain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DrainStatus {
    /// Every selected action was visited
    Finished,
    /// Connectivity dropped; remaining actions were left untouched
    Interrupted,
    /// Another drain was already running
    Busy,
    /// Offline; nothing was attempted
    Offline,
}

/// Outcome of one execution attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum AttemptOutcome {
    /// Handler succeeded
    Completed,
    /// Handler failed; another attempt is scheduled
    Requeued {
        /// Failures so far
        retry_count: u32,
        /// Backoff before the next drain
        delay_ms: u64,
    },
    /// Terminal failure; needs a manual retry
    Failed {
        /// Recorded error
        error: String,
    },
}

/// Result of executing a single action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    /// Action ID
    pub id: String,
    /// Action type
    pub action_type: String,
    /// What happened
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

/// Result of one drain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// How the drain ended
    pub status: DrainStatus,
    /// Actions that completed
    pub succeeded: usize,
    /// Actions put back for a backoff retry
    pub requeued: usize,
    /// Actions that ended terminally failed
    pub failed: usize,
    /// Individual results, in execution order
    pub results: Vec<ExecutionResult>,
}

impl DrainReport {
    /// Create an empty report.
    #[must_use]
    pub const fn new(status: DrainStatus) -> Self {
        Self {
            status,
            succeeded: 0,
            requeued: 0,
            failed: 0,
            results: Vec::new(),
        }
    }

    /// Add a result.
    pub fn add(&mut self, result: ExecutionResult) {
        match result.outcome {
            AttemptOutcome::Completed => self.succeeded += 1,
            AttemptOutcome::Requeued { .. } => self.requeued += 1,
            AttemptOutcome::Failed { .. } => self.failed += 1,
        }
        self.results.push(result);
    }

    /// Get total actions attempted.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.succeeded + self.requeued + self.failed
    }
}

/// Releases the single-flight flag even if the drain future is dropped.
struct SweepGuard<'a> {
    queue: &'a OfflineQueue,
    armed: bool,
}

impl SweepGuard<'_> {
    /// Release normally. Returns whether a follow-up drain is due, in which
    /// case its background slot is already reserved.
    fn finish(mut self) -> bool {
        self.armed = false;
        let rerun = {
            let mut state = self.queue.state();
            state.processing = false;
            let rerun = std::mem::take(&mut state.rerun_requested)
                && self.queue.is_online()
                && state.has_queued();
            if rerun {
                state.background_tasks += 1;
            }
            rerun
        };
        self.queue.notify();
        rerun
    }
}

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.queue.state().processing = false;
            self.queue.notify();
        }
    }
}

impl OfflineQueue {
    /// Run one sweep over the queued actions.
    ///
    /// Single-flight: a call while another drain runs returns
    /// [`DrainStatus::Busy`] and makes the running drain sweep once more
    /// when it finishes. Actions in terminal `failed` status are never
    /// picked up here.
    pub async fn drain(&self) -> DrainReport {
        let selected: Vec<String> = {
            let mut state = self.state();
            if state.processing {
                state.rerun_requested = true;
                return DrainReport::new(DrainStatus::Busy);
            }
            if !self.is_online() {
                return DrainReport::new(DrainStatus::Offline);
            }

            state.processing = true;
            state.rerun_requested = false;
            // This sweep covers whatever the pending backoff was waiting for
            if let Some(timer) = state.retry_timer.take() {
                timer.handle.cancel();
            }

            state
                .actions
                .iter()
                .filter(|action| action.status == ActionStatus::Queued)
                .map(|action| action.id.clone())
                .collect()
        };
        let guard = SweepGuard {
            queue: self,
            armed: true,
        };
        self.notify();

        tracing::debug!(count = selected.len(), "Drain started");

        let mut report = DrainReport::new(DrainStatus::Finished);
        for id in &selected {
            if !self.is_online() {
                tracing::info!(
                    remaining = selected.len() - report.total(),
                    "Connectivity lost, stopping drain"
                );
                report.status = DrainStatus::Interrupted;
                break;
            }

            if let Some(result) = self.execute(id).await {
                report.add(result);
            }
        }

        let rerun = guard.finish();

        if report.total() > 0 {
            tracing::info!(
                status = ?report.status,
                succeeded = report.succeeded,
                requeued = report.requeued,
                failed = report.failed,
                "Drain finished"
            );
        }

        if rerun {
            tracing::debug!("Drain requested while busy, sweeping again");
            self.spawn_reserved_drain();
        }

        report
    }

    /// Apply `f` to the action with `id`, if it still exists.
    fn with_action<R>(&self, id: &str, f: impl FnOnce(&mut QueuedAction) -> R) -> Option<R> {
        self.state().find_mut(id).map(f)
    }

    /// Execute one action. Returns `None` if it vanished or was no longer
    /// queued by the time its turn came.
    async fn execute(&self, id: &str) -> Option<ExecutionResult> {
        let (action_type, payload) = self
            .with_action(id, |action| {
                (action.status == ActionStatus::Queued)
                    .then(|| (action.action_type.clone(), action.payload.clone()))
            })
            .flatten()?;

        let Some(handler) = self.inner.registry.resolve(&action_type) else {
            let error = format!("No handler registered for action type '{action_type}'");
            tracing::warn!(id = %id, action_type = %action_type, "{error}");

            self.with_action(id, |action| {
                action.status = ActionStatus::Failed;
                action.error = Some(error.clone());
            })?;
            self.persist().await;

            return Some(ExecutionResult {
                id: id.to_string(),
                action_type,
                outcome: AttemptOutcome::Failed { error },
            });
        };

        self.with_action(id, |action| {
            action.status = ActionStatus::Sending;
            action.last_attempt_at = Some(Utc::now());
        })?;
        self.persist().await;

        tracing::debug!(id = %id, action_type = %action_type, "Sending action");

        // Own task so a panic comes back as a JoinError
        let mut call = tokio::spawn(async move { handler.handle(&payload).await });

        let timeout = self.inner.config.handler_timeout();
        let joined = if timeout.is_zero() {
            (&mut call).await
        } else if let Ok(joined) = tokio::time::timeout(timeout, &mut call).await {
            joined
        } else {
            call.abort();
            Ok(Err(HandlerError::new(format!(
                "Handler timed out after {}s",
                timeout.as_secs_f64()
            ))))
        };

        let outcome = match joined {
            Ok(Ok(())) => self.complete(id).await,
            Ok(Err(e)) => self.fail(id, &action_type, e.message).await,
            Err(e) if e.is_panic() => {
                tracing::error!(id = %id, action_type = %action_type, "Handler panicked");
                self.fail(id, &action_type, "Handler panicked".to_string()).await
            },
            Err(e) => self.fail(id, &action_type, format!("Handler task failed: {e}")).await,
        }?;

        Some(ExecutionResult {
            id: id.to_string(),
            action_type,
            outcome,
        })
    }

    /// Record a success. `None` if the action was removed while in flight.
    async fn complete(&self, id: &str) -> Option<AttemptOutcome> {
        let found = self.with_action(id, |action| {
            action.status = ActionStatus::Completed;
            action.error = None;
        });
        if found.is_none() {
            tracing::debug!(id = %id, "Action removed while sending, result dropped");
            return None;
        }

        tracing::debug!(id = %id, "Action completed");
        self.persist().await;
        self.schedule_prune(id);

        Some(AttemptOutcome::Completed)
    }

    /// Record a failure. `None` if the action was removed while in flight.
    async fn fail(&self, id: &str, action_type: &str, error: String) -> Option<AttemptOutcome> {
        let max_attempts = self.inner.config.max_retry_attempts;

        let retry_count = self.with_action(id, |action| {
            let retry_count = action.record_failure(error.clone());
            action.status = if retry_count < max_attempts {
                ActionStatus::Queued
            } else {
                ActionStatus::Failed
            };
            retry_count
        });

        let Some(retry_count) = retry_count else {
            tracing::debug!(id = %id, "Action removed while sending, result dropped");
            return None;
        };
        self.persist().await;

        if retry_count < max_attempts {
            let delay = self.inner.config.retry_delay(retry_count);
            let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
            tracing::warn!(
                id = %id,
                action_type = %action_type,
                attempt = retry_count,
                max_attempts,
                delay_ms,
                error = %error,
                "Action failed, retry scheduled"
            );
            self.schedule_retry(delay);

            Some(AttemptOutcome::Requeued {
                retry_count,
                delay_ms,
            })
        } else {
            tracing::warn!(
                id = %id,
                action_type = %action_type,
                attempts = retry_count,
                error = %error,
                "Action failed permanently"
            );

            Some(AttemptOutcome::Failed { error })
        }
    }

    /// Arm the single backoff timer, replacing any outstanding one.
    fn schedule_retry(&self, delay: Duration) {
        let weak = Arc::downgrade(&self.inner);
        {
            let mut state = self.state();
            state.timer_generation += 1;
            let generation = state.timer_generation;

            if let Some(previous) = state.retry_timer.take() {
                previous.handle.cancel();
            }

            let handle = self.inner.scheduler.after(
                delay,
                Box::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        Self { inner }.on_retry_timer(generation);
                    }
                }),
            );
            state.retry_timer = Some(RetryTimer { generation, handle });
        }
        self.notify();
    }

    fn on_retry_timer(&self, generation: u64) {
        let online = self.is_online();
        let current = {
            let mut state = self.state();
            let current = state
                .retry_timer
                .as_ref()
                .is_some_and(|timer| timer.generation == generation);
            if current {
                state.retry_timer = None;
                // Reserve before waiters can observe the empty timer slot
                if online {
                    state.background_tasks += 1;
                }
            }
            current
        };
        if !current {
            return;
        }

        if online {
            tracing::debug!("Backoff elapsed, draining");
            self.spawn_reserved_drain();
        } else {
            tracing::debug!("Backoff elapsed while offline, waiting for connectivity");
        }
        self.notify();
    }

    /// Remove a completed action once the grace delay has passed.
    fn schedule_prune(&self, id: &str) {
        let weak = Arc::downgrade(&self.inner);
        let id = id.to_string();

        self.inner.scheduler.after(
            self.inner.config.completed_grace(),
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    Self { inner }.prune_if_completed(&id);
                }
            }),
        );
    }

    fn prune_if_completed(&self, id: &str) {
        let removed = {
            let mut state = self.state();
            let before = state.actions.len();
            state
                .actions
                .retain(|action| !(action.id == id && action.status == ActionStatus::Completed));
            state.actions.len() != before
        };

        if removed {
            tracing::debug!(id = %id, "Pruned completed action");
            self.spawn_persist();
        }
    }
}
