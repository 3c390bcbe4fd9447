//! Queue inspection and editing commands.

use serde_json::json;

use crate::cli::args::{AddArgs, ListArgs, OutputFormat, RetryArgs};
use crate::error::ShopSyncError;
use crate::output::{format_action, format_actions, format_stats, to_json};
use crate::queue::OfflineQueue;

/// Execute status command
///
/// # Errors
///
/// Returns an error if output formatting fails.
pub fn status(queue: &OfflineQueue, format: OutputFormat) -> Result<String, ShopSyncError> {
    format_stats(&queue.stats(), format)
}

/// Execute list command
///
/// # Errors
///
/// Returns an error if output formatting fails.
pub fn list(
    queue: &OfflineQueue,
    args: &ListArgs,
    format: OutputFormat,
) -> Result<String, ShopSyncError> {
    let actions: Vec<_> = queue
        .queue()
        .into_iter()
        .filter(|action| args.status.map_or(true, |status| action.status == status))
        .take(args.limit.unwrap_or(usize::MAX))
        .collect();

    let title = args
        .status
        .map_or_else(|| "Queue".to_string(), |status| format!("Queue: {status}"));
    format_actions(&actions, &title, format)
}

/// Execute add command
///
/// # Errors
///
/// Returns `ShopSyncError::Config` if the type is empty or the payload is
/// not valid JSON.
pub async fn add(
    queue: &OfflineQueue,
    args: AddArgs,
    format: OutputFormat,
) -> Result<String, ShopSyncError> {
    let action_type = args.action_type.trim();
    if action_type.is_empty() {
        return Err(ShopSyncError::Config(
            "Action type must not be empty".to_string(),
        ));
    }

    let payload: serde_json::Value = serde_json::from_str(&args.payload)
        .map_err(|e| ShopSyncError::Config(format!("Invalid payload JSON: {e}")))?;

    let id = queue.queue_action(action_type, payload).await;

    match format {
        OutputFormat::Json => {
            let action = queue
                .get(&id)
                .ok_or_else(|| ShopSyncError::NotFound(format!("Action {id}")))?;
            to_json(&action)
        },
        OutputFormat::Pretty => Ok(format!("Queued {action_type}: {id}")),
    }
}

/// Execute retry command
///
/// # Errors
///
/// Returns `ShopSyncError::NotFound` for an unknown ID, or
/// `ShopSyncError::Config` if the action cannot be retried.
pub async fn retry(
    queue: &OfflineQueue,
    args: RetryArgs,
    format: OutputFormat,
) -> Result<String, ShopSyncError> {
    if args.all {
        let count = queue.retry_all_failed().await;
        return match format {
            OutputFormat::Json => to_json(&json!({ "requeued": count })),
            OutputFormat::Pretty => Ok(format!("Requeued {count} failed action(s)")),
        };
    }

    let id = args
        .id
        .ok_or_else(|| ShopSyncError::Config("Specify an action ID or --all".to_string()))?;
    let action = queue
        .get(&id)
        .ok_or_else(|| ShopSyncError::NotFound(format!("Action {id}")))?;

    if !queue.retry_action(&id).await {
        return Err(ShopSyncError::Config(format!(
            "Action {id} is {} and cannot be retried",
            action.status
        )));
    }

    match format {
        OutputFormat::Json => {
            let action = queue
                .get(&id)
                .ok_or_else(|| ShopSyncError::NotFound(format!("Action {id}")))?;
            format_action(&action, format)
        },
        OutputFormat::Pretty => Ok(format!("Requeued action: {id}")),
    }
}

/// Execute remove command
///
/// # Errors
///
/// Returns `ShopSyncError::NotFound` for an unknown ID.
pub async fn remove(
    queue: &OfflineQueue,
    id: &str,
    format: OutputFormat,
) -> Result<String, ShopSyncError> {
    if !queue.remove_action(id).await {
        return Err(ShopSyncError::NotFound(format!("Action {id}")));
    }

    match format {
        OutputFormat::Json => to_json(&json!({ "removed": id })),
        OutputFormat::Pretty => Ok(format!("Removed action: {id}")),
    }
}

/// Execute clear command
///
/// # Errors
///
/// Returns `ShopSyncError::Config` without `--force`.
pub async fn clear(
    queue: &OfflineQueue,
    force: bool,
    format: OutputFormat,
) -> Result<String, ShopSyncError> {
    let count = queue.len();
    if !force {
        return Err(ShopSyncError::Config(format!(
            "Refusing to delete {count} action(s) without --force"
        )));
    }

    queue.clear_queue().await;

    match format {
        OutputFormat::Json => to_json(&json!({ "cleared": count })),
        OutputFormat::Pretty => Ok(format!("Cleared {count} action(s)")),
    }
}
