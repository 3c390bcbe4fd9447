//! Configuration management for shopsync.
//!
//! This module handles loading configuration from `~/.shopsync/`.

mod paths;
mod settings;

pub use paths::{Paths, HOME_ENV};
pub use settings::{ApiConfig, ColorSetting, Config, GeneralConfig, LoggingConfig, QueueConfig};
