//! Replay command implementation.
//!
//! Opens the queue online with HTTP handlers for every configured route and
//! waits for it to settle.

use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use serde::Serialize;

use crate::api::register_http_handlers;
use crate::cli::args::{OutputFormat, RunArgs};
use crate::config::Config;
use crate::error::ShopSyncError;
use crate::output::{format_actions_pretty, to_json};
use crate::queue::{
    Connectivity, HandlerRegistry, OfflineQueue, QueueStats, QueueStore, QueuedAction,
};
use crate::storage::KeyValueStorage;

/// Outcome of a replay run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Actions delivered during this run
    pub sent: usize,
    /// Actions that ended in terminal failure during this run
    pub failed: usize,
    /// Actions still waiting when the run stopped
    pub remaining: usize,
    /// Whether the run gave up before the queue settled
    pub timed_out: bool,
    /// Every failed action, including ones from earlier runs
    pub failures: Vec<QueuedAction>,
}

impl RunSummary {
    fn between(before: &QueueStats, after: &QueueStats, remaining: usize) -> Self {
        let newly_failed = after.failed.saturating_sub(before.failed);
        Self {
            sent: before.queued.saturating_sub(remaining + newly_failed),
            failed: newly_failed,
            remaining,
            timed_out: false,
            failures: Vec::new(),
        }
    }
}

/// Execute run command
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built or output formatting fails.
pub async fn run(
    config: &Config,
    storage: Arc<dyn KeyValueStorage>,
    args: &RunArgs,
    format: OutputFormat,
) -> Result<String, ShopSyncError> {
    let registry = Arc::new(HandlerRegistry::new());
    let routes = register_http_handlers(&registry, &config.api)?;
    tracing::info!(routes, base_url = %config.api.base_url, "Replaying offline queue");

    // Baseline before the first drain can touch anything
    let store = QueueStore::new(Arc::clone(&storage), config.queue.storage_key.clone());
    let before = QueueStats::from_actions(&store.load().await);

    let connectivity = Connectivity::new(true);
    let queue = OfflineQueue::open(
        config.queue.clone(),
        storage,
        registry,
        connectivity.subscribe(),
    )
    .await;

    let timed_out = if args.timeout == 0 {
        queue.wait_until_settled().await;
        false
    } else {
        tokio::time::timeout(
            Duration::from_secs(args.timeout),
            queue.wait_until_settled(),
        )
        .await
        .is_err()
    };

    if timed_out {
        tracing::warn!(timeout_secs = args.timeout, "Gave up waiting for the queue to settle");
    }

    // Stop new sweeps before tidying up
    connectivity.set_online(false);
    queue.prune_completed().await;

    let remaining = queue
        .queue()
        .iter()
        .filter(|action| action.status.is_pending())
        .count();
    let mut summary = RunSummary::between(&before, &queue.stats(), remaining);
    summary.timed_out = timed_out;
    summary.failures = queue.failed_actions();

    match format {
        OutputFormat::Json => to_json(&summary),
        OutputFormat::Pretty => Ok(render_summary(&summary)),
    }
}

fn render_summary(summary: &RunSummary) -> String {
    let mut output = format!(
        "Sent: {}  Failed: {}  Remaining: {}\n",
        summary.sent.to_string().green(),
        if summary.failed > 0 {
            summary.failed.to_string().red().to_string()
        } else {
            "0".to_string()
        },
        summary.remaining.to_string().yellow()
    );

    if summary.timed_out {
        output.push_str(&format!("{}\n", "Timed out before the queue settled".yellow()));
    }

    if !summary.failures.is_empty() {
        output.push('\n');
        output.push_str(&format_actions_pretty(&summary.failures, "Failed actions"));
        output.push_str(&format!(
            "\n{}\n",
            "Use 'shopsync retry --all' to requeue them".dimmed()
        ));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::ActionStatus;
    use crate::storage::MemoryStorage;
    use serde_json::json;

    #[test]
    fn test_summary_between() {
        let before = QueueStats {
            queued: 5,
            failed: 1,
            ..QueueStats::default()
        };
        let after = QueueStats {
            queued: 1,
            failed: 3,
            ..QueueStats::default()
        };

        let summary = RunSummary::between(&before, &after, 1);
        assert_eq!(summary.sent, 2);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.remaining, 1);
    }

    #[tokio::test]
    async fn test_run_against_unreachable_backend() {
        let storage = Arc::new(MemoryStorage::new());
        let mut config = Config::default();
        config.api.base_url = "http://127.0.0.1:1".to_string();
        config.queue.initial_retry_delay_ms = 1;
        config.queue.max_retry_delay_ms = 1;

        let seeded = QueuedAction::new("order:place", json!({"total": 5000}));
        storage
            .set(
                "offline_queue",
                &serde_json::to_string(&[&seeded]).unwrap(),
            )
            .await
            .unwrap();

        let args = RunArgs { timeout: 30 };
        let output = run(&config, storage.clone(), &args, OutputFormat::Json)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["sent"], 0);
        assert_eq!(value["failed"], 1);
        assert_eq!(value["timed_out"], false);
        assert_eq!(value["failures"][0]["retryCount"], 3);

        let raw = storage.get("offline_queue").await.unwrap().unwrap();
        let stored: Vec<QueuedAction> = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored[0].status, ActionStatus::Failed);
    }
}
