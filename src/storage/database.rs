//! `SQLite` database connection and operations.
//!
//! The database is stored at `~/.shopsync/shopsync.db` and holds the
//! `kv_store` table backing the durable action queue.

use rusqlite::{params, Connection, OptionalExtension};

use crate::config::Paths;
use crate::error::ShopSyncError;

use super::migrations;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at the default location.
    ///
    /// Creates the database file and runs migrations if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub fn open() -> Result<Self, ShopSyncError> {
        let paths = Paths::new()?;
        paths.ensure_dirs()?;
        Self::open_at(&paths.database)
    }

    /// Open the database at a specific path.
    ///
    /// Creates the database file and runs migrations if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub fn open_at(path: &std::path::Path) -> Result<Self, ShopSyncError> {
        let conn = Connection::open(path).map_err(|e| {
            ShopSyncError::Database(format!("Failed to open database {}: {e}", path.display()))
        })?;

        // Survive power loss between the queue write and the next read
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })
        .map_err(|e| ShopSyncError::Database(format!("Failed to configure journal: {e}")))?;
        conn.pragma_update(None, "synchronous", "FULL")
            .map_err(|e| ShopSyncError::Database(format!("Failed to configure sync: {e}")))?;

        let db = Self { conn };
        db.migrate()?;

        Ok(db)
    }

    /// Open an in-memory database (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub fn open_in_memory() -> Result<Self, ShopSyncError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            ShopSyncError::Database(format!("Failed to open in-memory database: {e}"))
        })?;

        let db = Self { conn };
        db.migrate()?;

        Ok(db)
    }

    /// Run database migrations.
    fn migrate(&self) -> Result<(), ShopSyncError> {
        migrations::run(&self.conn)
    }

    /// Get the current schema version.
    ///
    /// # Errors
    ///
    /// Returns an error if the version cannot be read.
    pub fn schema_version(&self) -> Result<i32, ShopSyncError> {
        migrations::get_version(&self.conn)
    }

    /// Read a value from the key-value table.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_value(&self, key: &str) -> Result<Option<String>, ShopSyncError> {
        self.conn
            .query_row("SELECT value FROM kv_store WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| ShopSyncError::Database(format!("Failed to read key {key}: {e}")))
    }

    /// Insert or replace a value in a single statement.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn set_value(&self, key: &str, value: &str) -> Result<(), ShopSyncError> {
        self.conn
            .execute(
                r"INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
                  ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                 updated_at = excluded.updated_at",
                params![key, value, chrono::Utc::now().to_rfc3339()],
            )
            .map_err(|e| ShopSyncError::Database(format!("Failed to write key {key}: {e}")))?;

        Ok(())
    }

    /// Delete a value. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn remove_value(&self, key: &str) -> Result<bool, ShopSyncError> {
        let rows = self
            .conn
            .execute("DELETE FROM kv_store WHERE key = ?1", [key])
            .map_err(|e| ShopSyncError::Database(format!("Failed to remove key {key}: {e}")))?;

        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.schema_version().unwrap() > 0);
    }

    #[test]
    fn test_open_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let db = Database::open_at(&db_path).unwrap();
        assert!(db.schema_version().unwrap() > 0);
        assert!(db_path.exists());
    }

    #[test]
    fn test_value_roundtrip() {
        let db = Database::open_in_memory().unwrap();

        assert_eq!(db.get_value("offline_queue").unwrap(), None);

        db.set_value("offline_queue", "[]").unwrap();
        assert_eq!(db.get_value("offline_queue").unwrap().as_deref(), Some("[]"));

        db.set_value("offline_queue", "[1]").unwrap();
        assert_eq!(db.get_value("offline_queue").unwrap().as_deref(), Some("[1]"));

        assert!(db.remove_value("offline_queue").unwrap());
        assert!(!db.remove_value("offline_queue").unwrap());
        assert_eq!(db.get_value("offline_queue").unwrap(), None);
    }

    #[test]
    fn test_values_survive_reopen() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        {
            let db = Database::open_at(&db_path).unwrap();
            db.set_value("k", "v").unwrap();
        }

        // Reopen - should not run migrations again
        {
            let db = Database::open_at(&db_path).unwrap();
            assert!(db.schema_version().unwrap() > 0);
            assert_eq!(db.get_value("k").unwrap().as_deref(), Some("v"));
        }
    }
}
