//! Database schema migrations for SQLite.
//!
//! Versions are recorded in `schema_migrations`.

use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::now_millis;

/// Schema scripts; entry `i` takes the schema from version `i` to `i + 1`.
const MIGRATIONS: &[&str] = &[
    // v1: message streams and key-value entries
    r#"
    CREATE TABLE stream_entries (
        stream TEXT NOT NULL,             -- channel name
        id INTEGER NOT NULL,              -- message id, 1-based per stream
        payload TEXT NOT NULL,            -- signed payload string, verbatim
        appended_at INTEGER NOT NULL,     -- Unix ms
        PRIMARY KEY (stream, id)
    );

    CREATE TABLE kv_entries (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,              -- JSON
        stored_at INTEGER NOT NULL        -- Unix ms
    );
    "#,
];

/// Current schema version.
pub const CURRENT_VERSION: u32 = MIGRATIONS.len() as u32;

/// Bring the schema up to [`CURRENT_VERSION`]. Idempotent.
///
/// Pending scripts run in a single transaction. A database written by a newer
/// build is refused rather than downgraded.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
    )?;

    let applied: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if applied > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema v{applied} is newer than supported v{CURRENT_VERSION}"
        )));
    }
    if applied == CURRENT_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (version, script) in (1u32..).zip(MIGRATIONS).skip(applied as usize) {
        tx.execute_batch(script)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![version, now_millis()],
        )?;
        tracing::debug!(version, "applied schema migration");
    }
    tx.commit()?;

    Ok(())
}
