//! Public queue interface.
//!
//! [`OfflineQueue`] owns the in-memory action list, writes it through to the
//! [`QueueStore`] after every mutation, and kicks off drains from the
//! trigger sources: enqueue, manual retry, connectivity restored, backoff
//! timer, and startup.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use super::action::{ActionStatus, QueuedAction};
use super::connectivity::ConnectivityWatch;
use super::registry::HandlerRegistry;
use super::scheduler::{Scheduler, TimerHandle, TokioScheduler};
use super::store::QueueStore;
use crate::config::QueueConfig;
use crate::storage::KeyValueStorage;

/// The single outstanding backoff timer.
pub(super) struct RetryTimer {
    pub(super) generation: u64,
    pub(super) handle: TimerHandle,
}

#[derive(Default)]
pub(super) struct QueueState {
    pub(super) actions: Vec<QueuedAction>,
    /// Single-flight flag for drains.
    pub(super) processing: bool,
    /// A drain was requested while one was running.
    pub(super) rerun_requested: bool,
    /// Spawned drains and writes not yet finished.
    pub(super) background_tasks: usize,
    pub(super) retry_timer: Option<RetryTimer>,
    pub(super) timer_generation: u64,
}

impl QueueState {
    const fn is_idle(&self) -> bool {
        !self.processing && self.background_tasks == 0
    }

    pub(super) fn find_mut(&mut self, id: &str) -> Option<&mut QueuedAction> {
        self.actions.iter_mut().find(|action| action.id == id)
    }

    pub(super) fn has_queued(&self) -> bool {
        self.actions
            .iter()
            .any(|action| action.status == ActionStatus::Queued)
    }
}

pub(super) struct QueueInner {
    pub(super) state: Mutex<QueueState>,
    pub(super) store: QueueStore,
    /// Serializes storage writes; each write snapshots the state after
    /// acquiring it so the last write always carries the latest state.
    pub(super) persist_lock: tokio::sync::Mutex<()>,
    pub(super) registry: Arc<HandlerRegistry>,
    pub(super) connectivity: ConnectivityWatch,
    pub(super) scheduler: Arc<dyn Scheduler>,
    pub(super) config: QueueConfig,
    pub(super) changed: Notify,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for QueueInner {
    fn drop(&mut self) {
        let listener = self
            .listener
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(listener) = listener {
            listener.abort();
        }
    }
}

/// Queue statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Actions waiting for a drain
    pub queued: usize,
    /// Actions whose handler is running
    pub sending: usize,
    /// Actions needing a manual retry
    pub failed: usize,
    /// Actions awaiting pruning
    pub completed: usize,
    /// Creation time of the oldest queued action
    pub oldest_queued: Option<DateTime<Utc>>,
}

impl QueueStats {
    /// Tally a list of actions.
    #[must_use]
    pub fn from_actions(actions: &[QueuedAction]) -> Self {
        let mut stats = Self::default();

        for action in actions {
            match action.status {
                ActionStatus::Queued => {
                    stats.queued += 1;
                    stats.oldest_queued = Some(
                        stats
                            .oldest_queued
                            .map_or(action.created_at, |oldest| oldest.min(action.created_at)),
                    );
                },
                ActionStatus::Sending => stats.sending += 1,
                ActionStatus::Failed => stats.failed += 1,
                ActionStatus::Completed => stats.completed += 1,
            }
        }

        stats
    }

    /// Total number of actions.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.queued + self.sending + self.failed + self.completed
    }
}

/// Durable offline action queue. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct OfflineQueue {
    pub(super) inner: Arc<QueueInner>,
}

impl OfflineQueue {
    /// Load the persisted queue and start reacting to connectivity.
    ///
    /// Must be called inside a Tokio runtime. If already online with queued
    /// actions, a drain starts right away.
    pub async fn open(
        config: QueueConfig,
        storage: Arc<dyn KeyValueStorage>,
        registry: Arc<HandlerRegistry>,
        connectivity: ConnectivityWatch,
    ) -> Self {
        Self::open_with_scheduler(
            config,
            storage,
            registry,
            connectivity,
            Arc::new(TokioScheduler),
        )
        .await
    }

    /// Like [`OfflineQueue::open`], with a custom timer source.
    pub async fn open_with_scheduler(
        config: QueueConfig,
        storage: Arc<dyn KeyValueStorage>,
        registry: Arc<HandlerRegistry>,
        connectivity: ConnectivityWatch,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        let store = QueueStore::new(storage, config.storage_key.clone());
        let actions = store.load().await;
        let loaded = actions.len();

        let queue = Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState {
                    actions,
                    ..QueueState::default()
                }),
                store,
                persist_lock: tokio::sync::Mutex::new(()),
                registry,
                connectivity,
                scheduler,
                config,
                changed: Notify::new(),
                listener: Mutex::new(None),
            }),
        };

        queue.spawn_connectivity_listener();

        tracing::info!(
            count = loaded,
            online = queue.is_online(),
            "Offline queue loaded"
        );

        if queue.is_online() && queue.state().has_queued() {
            queue.spawn_drain();
        }

        queue
    }

    pub(super) fn state(&self) -> MutexGuard<'_, QueueState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn notify(&self) {
        self.inner.changed.notify_waiters();
    }

    /// Whether the connectivity signal currently reports online.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.inner.connectivity.is_online()
    }

    /// Queue settings in effect.
    #[must_use]
    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    /// Add an action and return its ID.
    ///
    /// The action is persisted before returning; if online, a drain is
    /// started in the background. Handler failures never surface here.
    pub async fn queue_action(
        &self,
        action_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> String {
        let action = QueuedAction::new(action_type, payload);
        let id = action.id.clone();

        tracing::info!(id = %id, action_type = %action.action_type, "Queued action");

        self.state().actions.push(action);
        self.persist().await;

        if self.is_online() {
            self.spawn_drain();
        }

        id
    }

    /// Delete an action. Unknown IDs are a no-op; returns whether one was removed.
    pub async fn remove_action(&self, id: &str) -> bool {
        let removed = {
            let mut state = self.state();
            let before = state.actions.len();
            state.actions.retain(|action| action.id != id);
            state.actions.len() != before
        };

        if removed {
            tracing::debug!(id = %id, "Removed action");
            self.persist().await;
        }

        removed
    }

    /// Requeue an action with a fresh retry budget.
    ///
    /// Resets the retry count, clears the error, and starts a drain if
    /// online. Unknown IDs, and actions that are mid-send or completed, are
    /// left alone; returns whether the action was requeued.
    pub async fn retry_action(&self, id: &str) -> bool {
        let requeued = {
            let mut state = self.state();
            match state.find_mut(id) {
                Some(action) if action.status == ActionStatus::Sending => {
                    tracing::debug!(id = %id, "Ignoring retry of action in flight");
                    false
                },
                Some(action) if action.status == ActionStatus::Completed => false,
                Some(action) => {
                    action.reset_for_retry();
                    true
                },
                None => false,
            }
        };

        if requeued {
            tracing::info!(id = %id, "Action requeued for retry");
            self.persist().await;
            if self.is_online() {
                self.spawn_drain();
            }
        }

        requeued
    }

    /// Requeue every failed action. Returns how many were reset.
    pub async fn retry_all_failed(&self) -> usize {
        let count = {
            let mut state = self.state();
            let mut count = 0;
            for action in &mut state.actions {
                if action.status == ActionStatus::Failed {
                    action.reset_for_retry();
                    count += 1;
                }
            }
            count
        };

        if count > 0 {
            tracing::info!(count, "Failed actions requeued for retry");
            self.persist().await;
            if self.is_online() {
                self.spawn_drain();
            }
        }

        count
    }

    /// Delete every action and the durable record.
    pub async fn clear_queue(&self) {
        let _write = self.inner.persist_lock.lock().await;
        {
            let mut state = self.state();
            state.actions.clear();
            if let Some(timer) = state.retry_timer.take() {
                timer.handle.cancel();
            }
        }
        self.notify();

        tracing::info!("Offline queue cleared");
        self.inner.store.clear().await;
    }

    /// Remove completed actions now instead of waiting for their grace
    /// timers. Returns how many were removed.
    pub async fn prune_completed(&self) -> usize {
        let pruned = {
            let mut state = self.state();
            let before = state.actions.len();
            state
                .actions
                .retain(|action| action.status != ActionStatus::Completed);
            before - state.actions.len()
        };

        if pruned > 0 {
            self.persist().await;
        }

        pruned
    }

    /// Snapshot of the whole queue in order.
    #[must_use]
    pub fn queue(&self) -> Vec<QueuedAction> {
        self.state().actions.clone()
    }

    /// Actions in terminal `failed` status.
    #[must_use]
    pub fn failed_actions(&self) -> Vec<QueuedAction> {
        self.state()
            .actions
            .iter()
            .filter(|action| action.status == ActionStatus::Failed)
            .cloned()
            .collect()
    }

    /// Whether a drain is currently running.
    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.state().processing
    }

    /// Look up one action.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<QueuedAction> {
        self.state()
            .actions
            .iter()
            .find(|action| action.id == id)
            .cloned()
    }

    /// Number of actions in the queue.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state().actions.len()
    }

    /// Whether the queue holds no actions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state().actions.is_empty()
    }

    /// Whether a backoff retry is scheduled.
    #[must_use]
    pub fn has_scheduled_retry(&self) -> bool {
        self.state().retry_timer.is_some()
    }

    /// Per-status counts.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        QueueStats::from_actions(&self.state().actions)
    }

    /// Wait until no drain or background write is in flight.
    pub async fn wait_idle(&self) {
        self.wait_for(QueueState::is_idle).await;
    }

    /// Wait until idle with no backoff retry pending.
    pub async fn wait_until_settled(&self) {
        self.wait_for(|state| state.is_idle() && state.retry_timer.is_none())
            .await;
    }

    async fn wait_for(&self, done: impl Fn(&QueueState) -> bool) {
        loop {
            let notified = self.inner.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let reached = done(&*self.state());
            if reached {
                return;
            }
            notified.await;
        }
    }

    /// Write the current state through to storage.
    pub(super) async fn persist(&self) -> bool {
        let _write = self.inner.persist_lock.lock().await;
        let snapshot = self.state().actions.clone();
        self.inner.store.save(&snapshot).await
    }

    pub(super) fn begin_background(&self) {
        self.state().background_tasks += 1;
    }

    pub(super) fn end_background(&self) {
        {
            let mut state = self.state();
            state.background_tasks = state.background_tasks.saturating_sub(1);
        }
        self.notify();
    }

    /// Start a drain without waiting for it.
    pub(super) fn spawn_drain(&self) {
        self.begin_background();
        self.spawn_reserved_drain();
    }

    /// Start a drain whose background slot the caller already took.
    pub(super) fn spawn_reserved_drain(&self) {
        let slot = BackgroundSlot(self.clone());
        tokio::spawn(async move {
            slot.0.drain().await;
        });
    }

    /// Persist without waiting, e.g. from a timer callback.
    pub(super) fn spawn_persist(&self) {
        self.begin_background();
        let slot = BackgroundSlot(self.clone());
        tokio::spawn(async move {
            slot.0.persist().await;
        });
    }

    fn spawn_connectivity_listener(&self) {
        let weak = Arc::downgrade(&self.inner);
        let mut watch = self.inner.connectivity.clone();

        // Every observed change is a real transition; a coalesced
        // offline/online pair still arrives as one `true`.
        let handle = tokio::spawn(async move {
            while let Some(online) = watch.changed().await {
                let Some(inner) = weak.upgrade() else { break };
                let queue = Self { inner };

                if online {
                    tracing::info!(pending = queue.len(), "Connectivity restored");
                    if queue.state().has_queued() {
                        queue.spawn_drain();
                    }
                } else {
                    tracing::info!("Connectivity lost");
                }
            }
        });

        *self
            .inner
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }
}

/// A reserved background slot. Released on drop, so a task that unwinds
/// still frees it.
struct BackgroundSlot(OfflineQueue);

impl Drop for BackgroundSlot {
    fn drop(&mut self) {
        self.0.end_background();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::connectivity::Connectivity;
    use crate::queue::scheduler::ManualScheduler;
    use crate::storage::MemoryStorage;
    use serde_json::json;

    async fn offline_queue(storage: Arc<MemoryStorage>) -> (OfflineQueue, Connectivity) {
        let connectivity = Connectivity::new(false);
        let queue = OfflineQueue::open_with_scheduler(
            QueueConfig::default(),
            storage,
            Arc::new(HandlerRegistry::new()),
            connectivity.subscribe(),
            Arc::new(ManualScheduler::new()),
        )
        .await;
        (queue, connectivity)
    }

    async fn stored(storage: &MemoryStorage) -> Vec<QueuedAction> {
        storage
            .get("offline_queue")
            .await
            .unwrap()
            .map(|raw| serde_json::from_str(&raw).unwrap())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_queue_action_persists() {
        let storage = Arc::new(MemoryStorage::new());
        let (queue, _connectivity) = offline_queue(Arc::clone(&storage)).await;

        let id = queue.queue_action("order:place", json!({"total": 5000})).await;

        let action = queue.get(&id).unwrap();
        assert_eq!(action.status, ActionStatus::Queued);
        assert_eq!(action.retry_count, 0);
        assert!(!queue.is_processing());

        let persisted = stored(&storage).await;
        assert_eq!(persisted, vec![action]);
    }

    #[tokio::test]
    async fn test_queue_preserves_insertion_order() {
        let storage = Arc::new(MemoryStorage::new());
        let (queue, _connectivity) = offline_queue(storage).await;

        let first = queue.queue_action("order:place", json!({})).await;
        let second = queue.queue_action("chat:send", json!({})).await;
        let third = queue.queue_action("wallet:topup", json!({})).await;

        let ids: Vec<String> = queue.queue().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![first, second, third]);
    }

    #[tokio::test]
    async fn test_remove_action() {
        let storage = Arc::new(MemoryStorage::new());
        let (queue, _connectivity) = offline_queue(Arc::clone(&storage)).await;

        let id = queue.queue_action("chat:send", json!({"text": "hi"})).await;

        assert!(!queue.remove_action("missing").await);
        assert!(queue.remove_action(&id).await);
        assert!(queue.is_empty());
        assert!(stored(&storage).await.is_empty());
    }

    #[tokio::test]
    async fn test_retry_unknown_is_noop() {
        let storage = Arc::new(MemoryStorage::new());
        let (queue, _connectivity) = offline_queue(storage).await;

        assert!(!queue.retry_action("missing").await);
    }

    #[tokio::test]
    async fn test_retry_queued_is_idempotent() {
        let storage = Arc::new(MemoryStorage::new());
        let (queue, _connectivity) = offline_queue(storage).await;

        let id = queue.queue_action("order:place", json!({})).await;

        assert!(queue.retry_action(&id).await);
        let once = queue.get(&id).unwrap();
        assert!(queue.retry_action(&id).await);
        let twice = queue.get(&id).unwrap();

        assert_eq!(once, twice);
        assert_eq!(twice.status, ActionStatus::Queued);
        assert_eq!(twice.retry_count, 0);
        assert!(twice.error.is_none());
    }

    #[tokio::test]
    async fn test_retry_resets_failed_action() {
        let storage = Arc::new(MemoryStorage::new());

        let mut failed = QueuedAction::new("return:request", json!({"orderId": "o-1"}));
        failed.status = ActionStatus::Failed;
        failed.retry_count = 3;
        failed.error = Some("HTTP 500".to_string());
        storage
            .set("offline_queue", &serde_json::to_string(&[&failed]).unwrap())
            .await
            .unwrap();

        let (queue, _connectivity) = offline_queue(Arc::clone(&storage)).await;
        assert_eq!(queue.failed_actions().len(), 1);

        assert!(queue.retry_action(&failed.id).await);

        let action = queue.get(&failed.id).unwrap();
        assert_eq!(action.status, ActionStatus::Queued);
        assert_eq!(action.retry_count, 0);
        assert!(action.error.is_none());
        assert!(queue.failed_actions().is_empty());
        assert_eq!(stored(&storage).await[0].status, ActionStatus::Queued);
    }

    #[tokio::test]
    async fn test_retry_all_failed() {
        let storage = Arc::new(MemoryStorage::new());

        let mut actions = Vec::new();
        for action_type in ["order:place", "chat:send", "wallet:topup"] {
            let mut action = QueuedAction::new(action_type, json!({}));
            action.status = ActionStatus::Failed;
            action.retry_count = 3;
            actions.push(action);
        }
        actions[1].status = ActionStatus::Queued;
        actions[1].retry_count = 1;
        storage
            .set("offline_queue", &serde_json::to_string(&actions).unwrap())
            .await
            .unwrap();

        let (queue, _connectivity) = offline_queue(storage).await;

        assert_eq!(queue.retry_all_failed().await, 2);
        assert!(queue.failed_actions().is_empty());
        // The queued one keeps its count
        assert_eq!(queue.get(&actions[1].id).unwrap().retry_count, 1);
    }

    #[tokio::test]
    async fn test_clear_queue_removes_record() {
        let storage = Arc::new(MemoryStorage::new());
        let (queue, _connectivity) = offline_queue(Arc::clone(&storage)).await;

        queue.queue_action("order:place", json!({})).await;
        queue.queue_action("chat:send", json!({})).await;

        queue.clear_queue().await;

        assert!(queue.is_empty());
        assert_eq!(storage.get("offline_queue").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cold_start_restores_queue() {
        let storage = Arc::new(MemoryStorage::new());

        let ids = {
            let (queue, _connectivity) = offline_queue(Arc::clone(&storage)).await;
            vec![
                queue.queue_action("order:place", json!({"total": 5000})).await,
                queue.queue_action("chat:send", json!({"text": "hi"})).await,
            ]
        };

        let (reopened, _connectivity) = offline_queue(storage).await;
        let restored: Vec<String> = reopened.queue().into_iter().map(|a| a.id).collect();
        assert_eq!(restored, ids);
    }

    #[tokio::test]
    async fn test_stats() {
        let storage = Arc::new(MemoryStorage::new());

        let mut failed = QueuedAction::new("chat:send", json!({}));
        failed.status = ActionStatus::Failed;
        let queued = QueuedAction::new("order:place", json!({}));
        storage
            .set(
                "offline_queue",
                &serde_json::to_string(&[&failed, &queued]).unwrap(),
            )
            .await
            .unwrap();

        let (queue, _connectivity) = offline_queue(storage).await;
        queue.queue_action("wallet:topup", json!({})).await;

        let stats = queue.stats();
        assert_eq!(stats.queued, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.sending, 0);
        assert_eq!(stats.total(), 3);
        assert_eq!(stats.oldest_queued, Some(queued.created_at));
    }

    #[tokio::test]
    async fn test_prune_completed() {
        let storage = Arc::new(MemoryStorage::new());
        let (queue, _connectivity) = offline_queue(Arc::clone(&storage)).await;

        let done = queue.queue_action("order:place", json!({})).await;
        let pending = queue.queue_action("chat:send", json!({})).await;
        queue.state().find_mut(&done).unwrap().status = ActionStatus::Completed;

        assert_eq!(queue.prune_completed().await, 1);
        assert!(queue.get(&done).is_none());
        assert!(queue.get(&pending).is_some());
        assert_eq!(stored(&storage).await.len(), 1);
    }
}
