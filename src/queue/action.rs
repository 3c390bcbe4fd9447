//! Queued action model.
//!
//! A [`QueuedAction`] is one durable unit of deferred work: a user intent
//! such as placing an order that could not be sent while offline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a queued action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    /// Waiting for the next drain
    Queued,
    /// Handler currently running
    Sending,
    /// Gave up; needs a manual retry
    Failed,
    /// Handler succeeded; pruned after a grace delay
    Completed,
}

impl ActionStatus {
    /// All statuses, in display order.
    pub const ALL: [Self; 4] = [Self::Queued, Self::Sending, Self::Failed, Self::Completed];

    /// Parse a status name, accepting the serialized lowercase form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "queued" | "pending" => Some(Self::Queued),
            "sending" => Some(Self::Sending),
            "failed" => Some(Self::Failed),
            "completed" | "done" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Whether the action still has network work ahead of it.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Queued | Self::Sending)
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Sending => "sending",
            Self::Failed => "failed",
            Self::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

/// A queued action with its delivery bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedAction {
    /// Unique ID, assigned at enqueue time
    pub id: String,
    /// Tag selecting the handler, e.g. `order:place`
    #[serde(rename = "type")]
    pub action_type: String,
    /// Opaque data handed to the handler verbatim
    pub payload: serde_json::Value,
    /// Current status
    pub status: ActionStatus,
    /// Failed execution attempts since creation or the last manual retry
    pub retry_count: u32,
    /// When the action was queued
    pub created_at: DateTime<Utc>,
    /// Most recent execution attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Last failure message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueuedAction {
    /// Create a new queued action with a fresh time-ordered ID.
    #[must_use]
    pub fn new(action_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            action_type: action_type.into(),
            payload,
            status: ActionStatus::Queued,
            retry_count: 0,
            created_at: Utc::now(),
            last_attempt_at: None,
            error: None,
        }
    }

    /// Put the action back in line for a fresh round of attempts.
    pub fn reset_for_retry(&mut self) {
        self.status = ActionStatus::Queued;
        self.retry_count = 0;
        self.error = None;
    }

    /// Record a failed attempt and return the new retry count.
    pub fn record_failure(&mut self, error: impl Into<String>) -> u32 {
        self.retry_count = self.retry_count.saturating_add(1);
        self.error = Some(error.into());
        self.retry_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_action_defaults() {
        let action = QueuedAction::new("order:place", json!({"total": 5000}));

        assert_eq!(action.action_type, "order:place");
        assert_eq!(action.status, ActionStatus::Queued);
        assert_eq!(action.retry_count, 0);
        assert!(action.last_attempt_at.is_none());
        assert!(action.error.is_none());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = QueuedAction::new("chat:send", json!({}));
        let b = QueuedAction::new("chat:send", json!({}));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_status_parse_and_display() {
        for status in ActionStatus::ALL {
            assert_eq!(ActionStatus::parse(&status.to_string()), Some(status));
        }
        assert_eq!(ActionStatus::parse("PENDING"), Some(ActionStatus::Queued));
        assert_eq!(ActionStatus::parse("unknown"), None);
    }

    #[test]
    fn test_is_pending() {
        assert!(ActionStatus::Queued.is_pending());
        assert!(ActionStatus::Sending.is_pending());
        assert!(!ActionStatus::Failed.is_pending());
        assert!(!ActionStatus::Completed.is_pending());
    }

    #[test]
    fn test_record_failure_and_reset() {
        let mut action = QueuedAction::new("wallet:topup", json!({"amount": 20}));

        assert_eq!(action.record_failure("timeout"), 1);
        assert_eq!(action.record_failure("503"), 2);
        assert_eq!(action.error.as_deref(), Some("503"));

        action.status = ActionStatus::Failed;
        action.reset_for_retry();

        assert_eq!(action.status, ActionStatus::Queued);
        assert_eq!(action.retry_count, 0);
        assert!(action.error.is_none());
    }

    #[test]
    fn test_serialized_field_names() {
        let mut action = QueuedAction::new("order:place", json!({"total": 5000}));
        action.error = Some("boom".to_string());

        let value = serde_json::to_value(&action).unwrap();

        assert_eq!(value["type"], "order:place");
        assert_eq!(value["status"], "queued");
        assert_eq!(value["retryCount"], 0);
        assert_eq!(value["payload"]["total"], 5000);
        assert_eq!(value["error"], "boom");
        assert!(value.get("createdAt").is_some());
        assert!(value.get("lastAttemptAt").is_none());
    }

    #[test]
    fn test_deserialize_minimal() {
        let json = r#"{
            "id": "abc",
            "type": "return:request",
            "payload": {"orderId": "o-1"},
            "status": "failed",
            "retryCount": 3,
            "createdAt": "2024-12-15T10:00:00Z"
        }"#;

        let action: QueuedAction = serde_json::from_str(json).unwrap();
        assert_eq!(action.status, ActionStatus::Failed);
        assert_eq!(action.retry_count, 3);
        assert!(action.error.is_none());
        assert!(action.last_attempt_at.is_none());
    }
}
