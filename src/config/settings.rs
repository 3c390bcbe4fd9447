//! Configuration settings for shopsync.
//!
//! Settings are loaded from `~/.shopsync/config.yaml`.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::args::OutputFormat;
use crate::config::Paths;
use crate::error::ShopSyncError;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// General settings.
    pub general: GeneralConfig,
    /// Offline queue settings.
    pub queue: QueueConfig,
    /// Shop backend settings.
    pub api: ApiConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Default output format.
    #[serde(default = "default_output_format")]
    pub default_output: OutputFormat,
    /// Color output setting.
    #[serde(default = "default_color")]
    pub color: ColorSetting,
}

/// Color output setting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ColorSetting {
    /// Auto-detect based on terminal.
    #[default]
    Auto,
    /// Always use colors.
    Always,
    /// Never use colors.
    Never,
}

/// Offline queue settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QueueConfig {
    /// Failed attempts after which an action becomes terminally failed.
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    /// Backoff before the second attempt; doubles with every failure.
    #[serde(default = "default_initial_retry_delay_ms")]
    pub initial_retry_delay_ms: u64,
    /// Upper bound for a single backoff delay.
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
    /// How long a completed action stays visible before it is pruned.
    #[serde(default = "default_completed_grace_ms")]
    pub completed_grace_ms: u64,
    /// Per-attempt handler timeout; a timeout counts as a transient failure.
    #[serde(default = "default_handler_timeout_secs")]
    pub handler_timeout_secs: u64,
    /// Storage key holding the serialized queue.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
}

/// Shop backend settings used by the HTTP action handlers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the shop API, e.g. `https://api.example.com/v1`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Action type to endpoint path.
    #[serde(default = "default_routes")]
    pub routes: BTreeMap<String, String>,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions for serde
const fn default_output_format() -> OutputFormat {
    OutputFormat::Pretty
}

const fn default_color() -> ColorSetting {
    ColorSetting::Auto
}

const fn default_max_retry_attempts() -> u32 {
    3
}

const fn default_initial_retry_delay_ms() -> u64 {
    1000
}

const fn default_max_retry_delay_ms() -> u64 {
    300_000
}

const fn default_completed_grace_ms() -> u64 {
    2000
}

const fn default_handler_timeout_secs() -> u64 {
    30
}

fn default_storage_key() -> String {
    "offline_queue".to_string()
}

fn default_base_url() -> String {
    "http://localhost:8080/api".to_string()
}

const fn default_request_timeout_secs() -> u64 {
    15
}

fn default_routes() -> BTreeMap<String, String> {
    [
        ("order:place", "/orders"),
        ("chat:send", "/chat/messages"),
        ("return:request", "/returns"),
        ("wallet:topup", "/wallet/top-ups"),
    ]
    .into_iter()
    .map(|(action_type, path)| (action_type.to_string(), path.to_string()))
    .collect()
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_output: default_output_format(),
            color: default_color(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retry_attempts: default_max_retry_attempts(),
            initial_retry_delay_ms: default_initial_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            completed_grace_ms: default_completed_grace_ms(),
            handler_timeout_secs: default_handler_timeout_secs(),
            storage_key: default_storage_key(),
        }
    }
}

impl QueueConfig {
    /// Backoff before the next attempt after `failures` failed attempts.
    ///
    /// `initial * 2^(failures - 1)`, capped at `max_retry_delay_ms`.
    #[must_use]
    pub fn retry_delay(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(32);
        let delay = self
            .initial_retry_delay_ms
            .saturating_mul(2_u64.saturating_pow(exponent));
        Duration::from_millis(delay.min(self.max_retry_delay_ms))
    }

    /// Grace delay before a completed action is pruned.
    #[must_use]
    pub const fn completed_grace(&self) -> Duration {
        Duration::from_millis(self.completed_grace_ms)
    }

    /// Per-attempt handler timeout.
    #[must_use]
    pub const fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            routes: default_routes(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self, ShopSyncError> {
        let paths = Paths::new()?;
        Self::load_from_path(&paths.config_file)
    }

    /// Load configuration from a specific path.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load_from_path(path: &std::path::Path) -> Result<Self, ShopSyncError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            ShopSyncError::Config(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        serde_yaml::from_str(&contents).map_err(|e| {
            ShopSyncError::Config(format!(
                "Failed to parse config file {}: {e}",
                path.display()
            ))
        })
    }

    /// Save configuration to a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be written.
    pub fn save_to_path(&self, path: &std::path::Path) -> Result<(), ShopSyncError> {
        let contents = serde_yaml::to_string(self)
            .map_err(|e| ShopSyncError::Config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, contents).map_err(|e| {
            ShopSyncError::Config(format!(
                "Failed to write config file {}: {e}",
                path.display()
            ))
        })
    }
}
