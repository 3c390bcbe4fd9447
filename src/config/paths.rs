//! Path resolution for shopsync configuration and data files.
//!
//! All shopsync data is stored in `~/.shopsync/` (or `$SHOPSYNC_HOME`):
//! - `config.yaml` - Main configuration file
//! - `shopsync.db` - SQLite database holding the durable action queue

use std::path::PathBuf;

use crate::error::ShopSyncError;

/// Environment variable overriding the data root.
pub const HOME_ENV: &str = "SHOPSYNC_HOME";

/// Paths to shopsync configuration and data files.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Root directory: `~/.shopsync/`
    pub root: PathBuf,
    /// Config file: `~/.shopsync/config.yaml`
    pub config_file: PathBuf,
    /// Database file: `~/.shopsync/shopsync.db`
    pub database: PathBuf,
}

impl Paths {
    /// Resolve paths from `$SHOPSYNC_HOME`, falling back to `~/.shopsync`.
    ///
    /// # Errors
    ///
    /// Returns an error if neither variable is set.
    pub fn new() -> Result<Self, ShopSyncError> {
        if let Ok(root) = std::env::var(HOME_ENV) {
            if !root.is_empty() {
                return Ok(Self::with_root(PathBuf::from(root)));
            }
        }

        let home = std::env::var("HOME").map_err(|_| {
            ShopSyncError::Config("Could not determine home directory".to_string())
        })?;

        Ok(Self::with_root(PathBuf::from(home).join(".shopsync")))
    }

    /// Create paths with a custom root directory (useful for testing).
    #[must_use]
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            config_file: root.join("config.yaml"),
            database: root.join("shopsync.db"),
            root,
        }
    }

    /// Ensure the root directory exists.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation fails.
    pub fn ensure_dirs(&self) -> Result<(), ShopSyncError> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root).map_err(|e| {
                ShopSyncError::Config(format!(
                    "Failed to create directory {}: {e}",
                    self.root.display()
                ))
            })?;
        }

        Ok(())
    }
}
