//! Durable queue store.
//!
//! Round-trips the whole ordered action list as one JSON array under a
//! single storage key. Reads never fail the caller and writes are logged
//! rather than propagated: the in-memory queue stays authoritative for the
//! current process either way.

use std::sync::Arc;

use super::action::{ActionStatus, QueuedAction};
use crate::error::ShopSyncError;
use crate::storage::KeyValueStorage;

/// Persists the queue under a single key.
#[derive(Clone)]
pub struct QueueStore {
    storage: Arc<dyn KeyValueStorage>,
    key: String,
}

impl QueueStore {
    /// Create a store writing to `key`.
    pub fn new(storage: Arc<dyn KeyValueStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    /// Storage key in use.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the persisted queue, normalized for a cold start.
    ///
    /// Missing, unreadable, or unparsable data yields an empty queue.
    /// Actions caught mid-send are restored as `queued`; completed ones are
    /// dropped since their prune timer died with the previous process.
    pub async fn load(&self) -> Vec<QueuedAction> {
        let raw = match self.storage.get(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Failed to read offline queue");
                return Vec::new();
            },
        };

        let actions: Vec<QueuedAction> = match serde_json::from_str(&raw) {
            Ok(actions) => actions,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Discarding unparsable offline queue");
                return Vec::new();
            },
        };

        normalize(actions)
    }

    /// Write the full queue.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the storage write fails.
    pub async fn try_save(&self, actions: &[QueuedAction]) -> Result<(), ShopSyncError> {
        let raw = serde_json::to_string(actions)?;
        self.storage.set(&self.key, &raw).await
    }

    /// Write the full queue, logging instead of failing.
    ///
    /// Returns whether the write succeeded.
    pub async fn save(&self, actions: &[QueuedAction]) -> bool {
        match self.try_save(actions).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    key = %self.key,
                    count = actions.len(),
                    error = %e,
                    "Failed to persist offline queue"
                );
                false
            },
        }
    }

    /// Delete the durable record entirely.
    pub async fn clear(&self) -> bool {
        match self.storage.remove(&self.key).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(key = %self.key, error = %e, "Failed to clear offline queue");
                false
            },
        }
    }
}

fn normalize(actions: Vec<QueuedAction>) -> Vec<QueuedAction> {
    actions
        .into_iter()
        .filter(|action| action.status != ActionStatus::Completed)
        .map(|mut action| {
            if action.status == ActionStatus::Sending {
                tracing::debug!(id = %action.id, "Restoring interrupted action as queued");
                action.status = ActionStatus::Queued;
            }
            action
        })
        .collect()
}
