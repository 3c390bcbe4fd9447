//! Command implementations for shopsync.
//!
//! Every command except `run` works on the queue opened offline, so
//! inspecting or editing it never sends anything.

mod queue;
mod run;

pub use queue::{add, clear, list, remove, retry, status};
pub use run::{run, RunSummary};

use std::sync::Arc;

use crate::config::Config;
use crate::queue::{Connectivity, HandlerRegistry, OfflineQueue};
use crate::storage::KeyValueStorage;

/// Open the queue with connectivity reported offline.
pub async fn open_offline(config: &Config, storage: Arc<dyn KeyValueStorage>) -> OfflineQueue {
    let connectivity = Connectivity::new(false);
    OfflineQueue::open(
        config.queue.clone(),
        storage,
        Arc::new(HandlerRegistry::new()),
        connectivity.subscribe(),
    )
    .await
}
