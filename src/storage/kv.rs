//! String-keyed durable storage consumed by the queue store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::Database;
use crate::error::ShopSyncError;

/// Minimal key-value interface the queue persists through.
///
/// Every call is a suspension point for the caller; implementations decide
/// whether the work actually blocks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    /// Read the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, ShopSyncError>;

    /// Atomically replace the value stored under `key`.
    async fn set(&self, key: &str, value: &str) -> Result<(), ShopSyncError>;

    /// Delete `key`; deleting a missing key succeeds.
    async fn remove(&self, key: &str) -> Result<(), ShopSyncError>;
}

/// `SQLite`-backed storage; the default for the binary.
///
/// Statements run on the blocking thread pool, one at a time.
pub struct SqliteStorage {
    db: Arc<Mutex<Database>>,
}

impl SqliteStorage {
    /// Wrap an open database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Open the database at the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open() -> Result<Self, ShopSyncError> {
        Ok(Self::new(Database::open()?))
    }

    async fn with_db<T, F>(&self, f: F) -> Result<T, ShopSyncError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T, ShopSyncError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let db = db.lock().unwrap_or_else(PoisonError::into_inner);
            f(&db)
        })
        .await
        .map_err(|e| ShopSyncError::Storage(format!("Storage task failed: {e}")))?
    }
}

#[async_trait]
impl KeyValueStorage for SqliteStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, ShopSyncError> {
        let key = key.to_string();
        self.with_db(move |db| db.get_value(&key)).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ShopSyncError> {
        let (key, value) = (key.to_string(), value.to_string());
        self.with_db(move |db| db.set_value(&key, &value)).await
    }

    async fn remove(&self, key: &str) -> Result<(), ShopSyncError> {
        let key = key.to_string();
        self.with_db(move |db| db.remove_value(&key).map(|_| ())).await
    }
}

/// Process-local storage for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl KeyValueStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, ShopSyncError> {
        Ok(self.values().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ShopSyncError> {
        self.values().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), ShopSyncError> {
        self.values().remove(key);
        Ok(())
    }
}
