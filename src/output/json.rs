//! JSON output formatting for shopsync.

use serde::Serialize;
use serde_json::json;

use crate::error::ShopSyncError;
use crate::queue::{QueueStats, QueuedAction};

/// Format actions as JSON
///
/// # Errors
///
/// Returns `ShopSyncError::Parse` if JSON serialization fails.
pub fn format_actions_json(actions: &[QueuedAction], title: &str) -> Result<String, ShopSyncError> {
    let output = json!({
        "list": title,
        "count": actions.len(),
        "items": actions
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Format queue statistics as JSON
///
/// # Errors
///
/// Returns `ShopSyncError::Parse` if JSON serialization fails.
pub fn format_stats_json(stats: &QueueStats) -> Result<String, ShopSyncError> {
    let output = json!({
        "total": stats.total(),
        "queued": stats.queued,
        "sending": stats.sending,
        "failed": stats.failed,
        "completed": stats.completed,
        "oldest_queued": stats.oldest_queued,
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Generic JSON formatter for any serializable type
///
/// # Errors
///
/// Returns `ShopSyncError::Parse` if JSON serialization fails.
pub fn to_json<T: Serialize>(value: &T) -> Result<String, ShopSyncError> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_actions_json() {
        let actions = vec![QueuedAction::new("order:place", json!({"total": 5000}))];
        let output = format_actions_json(&actions, "Queue").unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["list"], "Queue");
        assert_eq!(value["count"], 1);
        assert_eq!(value["items"][0]["type"], "order:place");
        assert_eq!(value["items"][0]["retryCount"], 0);
        assert_eq!(value["items"][0]["status"], "queued");
    }

    #[test]
    fn test_format_stats_json() {
        let stats = QueueStats {
            queued: 2,
            failed: 1,
            ..QueueStats::default()
        };
        let value: serde_json::Value =
            serde_json::from_str(&format_stats_json(&stats).unwrap()).unwrap();

        assert_eq!(value["total"], 3);
        assert_eq!(value["failed"], 1);
        assert!(value["oldest_queued"].is_null());
    }
}
