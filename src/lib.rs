//! shopsync - Offline action queue for a mobile shopping client
//!
//! User actions taken while offline (placing an order, sending a chat
//! message, requesting a return, topping up the wallet) are captured in a
//! durable queue and replayed against the shop backend once connectivity
//! returns.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod output;
pub mod queue;
pub mod storage;

pub use cli::args::{Cli, Commands, OutputFormat};
pub use error::ShopSyncError;
pub use queue::{Connectivity, HandlerRegistry, OfflineQueue, QueuedAction};
