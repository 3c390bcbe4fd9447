//! Output formatting for shopsync.
//!
//! This module provides formatters for displaying queue contents in various formats.

mod json;
mod pretty;

use crate::cli::args::OutputFormat;
use crate::error::ShopSyncError;
use crate::queue::{QueueStats, QueuedAction};

pub use json::*;
pub use pretty::*;

/// Format actions based on output format
///
/// # Errors
///
/// Returns `ShopSyncError::Parse` if JSON serialization fails.
pub fn format_actions(
    actions: &[QueuedAction],
    title: &str,
    format: OutputFormat,
) -> Result<String, ShopSyncError> {
    match format {
        OutputFormat::Pretty => Ok(format_actions_pretty(actions, title)),
        OutputFormat::Json => format_actions_json(actions, title),
    }
}

/// Format a single action based on output format
///
/// # Errors
///
/// Returns `ShopSyncError::Parse` if JSON serialization fails.
pub fn format_action(action: &QueuedAction, format: OutputFormat) -> Result<String, ShopSyncError> {
    match format {
        OutputFormat::Pretty => Ok(format_action_pretty(action)),
        OutputFormat::Json => to_json(action),
    }
}

/// Format queue statistics based on output format
///
/// # Errors
///
/// Returns `ShopSyncError::Parse` if JSON serialization fails.
pub fn format_stats(stats: &QueueStats, format: OutputFormat) -> Result<String, ShopSyncError> {
    match format {
        OutputFormat::Pretty => Ok(format_stats_pretty(stats, chrono::Utc::now())),
        OutputFormat::Json => format_stats_json(stats),
    }
}
