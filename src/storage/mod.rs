//! Storage layer for shopsync.
//!
//! This module provides SQLite-based persistence behind a small key-value
//! interface, plus an in-memory variant.

mod database;
mod kv;
mod migrations;

pub use database::Database;
#[cfg(test)]
pub use kv::MockKeyValueStorage;
pub use kv::{KeyValueStorage, MemoryStorage, SqliteStorage};
