//! Schema migrations for the queue database.
//!
//! Steps are listed in order; the schema version kept in `PRAGMA
//! user_version` is the number of steps already applied. Each step runs in
//! its own transaction together with the version bump.

use rusqlite::Connection;

use crate::error::ShopSyncError;

const MIGRATIONS: &[&str] = &[
    // 1: key-value table backing the durable queue
    r"
    CREATE TABLE IF NOT EXISTS kv_store (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    ",
];

/// Schema version of a fully migrated database.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub const CURRENT_VERSION: i32 = MIGRATIONS.len() as i32;

/// Read the schema version; 0 for a fresh database.
pub fn get_version(conn: &Connection) -> Result<i32, ShopSyncError> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(|e| ShopSyncError::Database(format!("Failed to read schema version: {e}")))
}

/// Apply every step the database has not seen yet.
pub fn run(conn: &Connection) -> Result<(), ShopSyncError> {
    let applied = get_version(conn)?;

    if applied > CURRENT_VERSION {
        return Err(ShopSyncError::Database(format!(
            "Database schema v{applied} is newer than this build (v{CURRENT_VERSION})"
        )));
    }

    for (version, sql) in (1..).zip(MIGRATIONS.iter()).skip(usize::try_from(applied).unwrap_or(0)) {
        apply(conn, version, sql)?;
        tracing::debug!(version, "Applied schema migration");
    }

    Ok(())
}

fn apply(conn: &Connection, version: i32, sql: &str) -> Result<(), ShopSyncError> {
    let fail = |e: rusqlite::Error| ShopSyncError::Database(format!("Migration v{version} failed: {e}"));

    let tx = conn.unchecked_transaction().map_err(fail)?;
    tx.execute_batch(sql).map_err(fail)?;
    tx.pragma_update(None, "user_version", version).map_err(fail)?;
    tx.commit().map_err(fail)
}
