//! Database schema migrations for SQLite.
//!
//! A simple versioned migration system. Each migration transforms the
//! schema from version N-1 to N.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// Idempotent: safe to call on every open.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
            tracing::debug!(version, "applied preference schema migration");
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- One row per (user, app, key)
        CREATE TABLE preferences (
            userid TEXT NOT NULL,
            appid TEXT NOT NULL,
            configkey TEXT NOT NULL,
            configvalue TEXT NOT NULL DEFAULT '',   -- stored form, marker-prefixed when sensitive
            type INTEGER NOT NULL DEFAULT 0,        -- 0=mixed,1=string,2=int,3=float,4=array,5=bool
            lazy INTEGER NOT NULL DEFAULT 0,
            sensitive_flags INTEGER NOT NULL DEFAULT 0,
            indexed TEXT NOT NULL DEFAULT '',       -- plaintext search shadow, empty when sensitive

            PRIMARY KEY (userid, appid, configkey)
        );

        CREATE INDEX idx_preferences_user_lazy ON preferences(userid, lazy);
        CREATE INDEX idx_preferences_app_key_indexed ON preferences(appid, configkey, indexed);
        CREATE INDEX idx_preferences_user_key ON preferences(userid, configkey);
        "#,
    )?;

    Ok(())
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
