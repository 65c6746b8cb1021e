//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: event log and support tickets
    r#"
    -- Append-only event log. seq is assigned by the tracker, not SQLite.
    CREATE TABLE IF NOT EXISTS events (
        seq              INTEGER PRIMARY KEY,
        id               TEXT NOT NULL UNIQUE,
        user_id          TEXT NOT NULL,
        event_type       TEXT NOT NULL,
        event_name       TEXT NOT NULL,
        properties       JSON NOT NULL,
        ts               DATETIME NOT NULL,
        session_id       TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_events_user ON events(user_id, seq);
    CREATE INDEX IF NOT EXISTS idx_events_ts ON events(ts);

    CREATE TABLE IF NOT EXISTS tickets (
        id               TEXT PRIMARY KEY,
        seq              INTEGER NOT NULL,
        user_id          TEXT NOT NULL,
        subject          TEXT NOT NULL,
        category         TEXT NOT NULL,
        priority         TEXT NOT NULL,
        description      TEXT NOT NULL,
        status           TEXT NOT NULL,
        created_at       DATETIME NOT NULL,
        updated_at       DATETIME NOT NULL,
        assigned_to      TEXT,
        user_plan        TEXT NOT NULL,
        responses        JSON NOT NULL,
        metadata         JSON NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_tickets_status ON tickets(status);
    "#,
    // Version 2: admin feature-usage log
    r#"
    CREATE TABLE IF NOT EXISTS feature_usage_log (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id          TEXT NOT NULL,
        feature_name     TEXT NOT NULL,
        metadata         JSON NOT NULL,
        logged_at        DATETIME NOT NULL,
        event_id         TEXT NOT NULL UNIQUE
    );

    CREATE INDEX IF NOT EXISTS idx_usage_log_feature ON feature_usage_log(feature_name);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute_batch(&format!("PRAGMA user_version = {}", version))?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
