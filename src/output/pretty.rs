use chrono::{DateTime, Utc};
use colored::{ColoredString, Colorize};

use crate::queue::{ActionStatus, QueueStats, QueuedAction};

fn status_badge(status: ActionStatus) -> ColoredString {
    match status {
        ActionStatus::Queued => "[queued]".yellow(),
        ActionStatus::Sending => "[sending]".cyan(),
        ActionStatus::Failed => "[failed]".red(),
        ActionStatus::Completed => "[done]".green(),
    }
}

/// Format a list of actions as a pretty table
pub fn format_actions_pretty(actions: &[QueuedAction], title: &str) -> String {
    if actions.is_empty() {
        return format!("{title} (0 actions)\n  Nothing queued");
    }

    let mut output = format!("{} ({} actions)\n", title, actions.len());
    output.push_str(&"─".repeat(60));
    output.push('\n');

    for action in actions {
        let mut line = format!(
            "{} {}  {}",
            status_badge(action.status),
            action.action_type.bold(),
            action.id.dimmed()
        );

        if action.retry_count > 0 {
            line.push_str(&format!("  {}", format!("retries: {}", action.retry_count).yellow()));
        }

        output.push_str(&line);
        output.push('\n');

        if let Some(error) = &action.error {
            output.push_str(&format!("    {}\n", error.red()));
        }
    }

    output
}

/// Format a single action as pretty output
pub fn format_action_pretty(action: &QueuedAction) -> String {
    let mut output = format!(
        "{} {}\n",
        status_badge(action.status),
        action.action_type.bold()
    );
    output.push_str(&format!("  {}: {}\n", "ID".dimmed(), action.id));
    output.push_str(&format!("  {}: {}\n", "Status".dimmed(), action.status));
    output.push_str(&format!(
        "  {}: {}\n",
        "Created".dimmed(),
        action.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    if let Some(last) = action.last_attempt_at {
        output.push_str(&format!(
            "  {}: {}\n",
            "Last attempt".dimmed(),
            last.format("%Y-%m-%d %H:%M:%S UTC")
        ));
    }

    if action.retry_count > 0 {
        output.push_str(&format!("  {}: {}\n", "Retries".dimmed(), action.retry_count));
    }

    if let Some(error) = &action.error {
        output.push_str(&format!("  {}: {}\n", "Error".dimmed(), error.red()));
    }

    output.push_str(&format!("  {}: {}\n", "Payload".dimmed(), action.payload));

    output
}

/// Format queue statistics
pub fn format_stats_pretty(stats: &QueueStats, now: DateTime<Utc>) -> String {
    let mut output = format!("{}\n", "Offline queue".bold());
    output.push_str(&"─".repeat(40));
    output.push('\n');

    output.push_str(&format!(
        "  Queued: {}  Sending: {}  Failed: {}  Completed: {}\n",
        stats.queued.to_string().yellow(),
        stats.sending.to_string().cyan(),
        if stats.failed > 0 {
            stats.failed.to_string().red().to_string()
        } else {
            "0".green().to_string()
        },
        stats.completed.to_string().green()
    ));
    output.push_str(&format!("  Total: {}\n", stats.total()));

    if let Some(oldest) = stats.oldest_queued {
        output.push_str(&format!(
            "  Oldest queued: {} ago\n",
            format_age(now.signed_duration_since(oldest))
        ));
    }

    output
}

/// Format an elapsed time compactly, e.g. `3h 12m`.
pub fn format_age(elapsed: chrono::Duration) -> String {
    let secs = elapsed.num_seconds().max(0);
    let (days, hours, mins) = (secs / 86_400, (secs % 86_400) / 3600, (secs % 3600) / 60);

    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {mins}m")
    } else if mins > 0 {
        format!("{mins}m")
    } else {
        format!("{secs}s")
    }
}
