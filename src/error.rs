//! Error types for shopsync.

use thiserror::Error;

/// Errors surfaced by the queue, its storage, and the command-line front end.
#[derive(Debug, Error)]
pub enum ShopSyncError {
    /// `SQLite` failure (open, migrate, query).
    #[error("Database error: {0}")]
    Database(String),

    /// Invalid or unreadable configuration, or invalid command input.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A referenced action does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Key-value storage failure outside of `SQLite` itself.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Failure talking to the shop backend.
    #[error("API error: {0}")]
    Api(String),

    /// JSON (de)serialization failure.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ShopSyncError::NotFound("Action abc".to_string());
        assert_eq!(err.to_string(), "Not found: Action abc");

        let err = ShopSyncError::Database("locked".to_string());
        assert_eq!(err.to_string(), "Database error: locked");
    }

    #[test]
    fn test_parse_error_conversion() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ShopSyncError = parse.into();
        assert!(matches!(err, ShopSyncError::Parse(_)));
    }
}
