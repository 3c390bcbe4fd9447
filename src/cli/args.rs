use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::queue::ActionStatus;

#[derive(Parser)]
#[command(name = "shopsync")]
#[command(about = "Inspect and replay the offline action queue of the shop client")]
#[command(long_about = "shopsync - Offline action queue for the shop client

Actions such as placing an order or sending a chat message are captured
while offline and replayed against the shop backend once connectivity
returns. This tool inspects that queue and drives it by hand.

QUICK START:
  shopsync add order:place --payload '{\"total\": 5000}'
  shopsync list             Show queued actions
  shopsync run              Replay the queue against the backend
  shopsync retry --all      Requeue everything that failed

OUTPUT FORMATS:
  --output pretty    Human-readable colored output (default)
  --output json      Machine-readable JSON for scripting

For more information on a specific command, run:
  shopsync <command> --help")]
#[command(version, propagate_version = true)]
pub struct Cli {
    /// Output format for command results
    ///
    /// Use 'pretty' for human-readable colored output, or 'json' for
    /// machine-readable output. Defaults to `general.default_output` from
    /// the config file.
    #[arg(short, long, value_enum, global = true)]
    pub output: Option<OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for command results.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable colored output.
    #[default]
    Pretty,
    /// Machine-readable JSON output.
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show queue counts per status
    ///
    /// # Examples
    ///
    ///   shopsync status
    ///   shopsync status -o json
    #[command(alias = "s")]
    Status,

    /// List queued actions in execution order
    ///
    /// Failed actions show the error from their last attempt.
    ///
    /// # Examples
    ///
    ///   shopsync list
    ///   shopsync list --status failed
    ///   shopsync ls --limit 5 -o json
    #[command(alias = "ls")]
    List(ListArgs),

    /// Queue an action without sending it
    ///
    /// The action is stored for the next `run`. Nothing is sent.
    ///
    /// # Examples
    ///
    ///   shopsync add order:place --payload '{"total": 5000}'
    ///   shopsync add chat:send --payload '{"text": "hello"}'
    Add(AddArgs),

    /// Replay the queue against the backend
    ///
    /// Registers an HTTP handler for every configured route, goes online,
    /// and keeps draining until nothing is queued or pending a backoff
    /// retry. Completed actions are removed afterwards.
    ///
    /// # Examples
    ///
    ///   shopsync run
    ///   shopsync run --timeout 30
    Run(RunArgs),

    /// Requeue a failed action with a fresh retry budget
    ///
    /// # Examples
    ///
    ///   shopsync retry 0192b7c4-...
    ///   shopsync retry --all
    Retry(RetryArgs),

    /// Delete an action from the queue
    ///
    /// # Examples
    ///
    ///   shopsync remove 0192b7c4-...
    #[command(alias = "rm")]
    Remove {
        /// Action ID
        id: String,
    },

    /// Delete every queued action
    Clear {
        /// Required; there is no undo
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args)]
pub struct ListArgs {
    /// Only show actions with this status (queued, sending, failed, completed)
    #[arg(long, value_parser = parse_status)]
    pub status: Option<ActionStatus>,

    /// Show at most this many actions
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

#[derive(Args)]
pub struct AddArgs {
    /// Action type, e.g. order:place
    pub action_type: String,

    /// JSON payload handed to the handler
    #[arg(short, long, default_value = "{}")]
    pub payload: String,
}

#[derive(Args)]
pub struct RunArgs {
    /// Give up waiting after this many seconds (0 waits indefinitely)
    #[arg(short, long, default_value_t = 0)]
    pub timeout: u64,
}

#[derive(Args)]
#[command(group(clap::ArgGroup::new("target").required(true).args(["id", "all"])))]
pub struct RetryArgs {
    /// Action ID
    pub id: Option<String>,

    /// Requeue every failed action
    #[arg(long)]
    pub all: bool,
}

fn parse_status(s: &str) -> Result<ActionStatus, String> {
    ActionStatus::parse(s).ok_or_else(|| {
        format!("invalid status '{s}' (expected queued, sending, failed, or completed)")
    })
}
