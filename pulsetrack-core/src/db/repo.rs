//! Database repository layer
//!
//! Provides the durable-store operations the CLI uses to persist and
//! reload tracker state between runs.
//!
//! Writes are strict: an event sequence number, ticket id, or usage-log
//! event id that is already stored is a [`Error::Conflict`], never a
//! silent skip. [`Database::commit`] writes everything one command
//! produced in a single `IMMEDIATE` transaction and first checks that no
//! other writer has appended since the caller loaded its state.

use crate::error::{Error, Result};
use crate::types::*;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, Row, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const EVENT_COLUMNS: &str =
    "seq, id, user_id, event_type, event_name, properties, ts, session_id";

const TICKET_COLUMNS: &str = "id, seq, user_id, subject, category, priority, description, \
     status, created_at, updated_at, assigned_to, user_plan, responses, metadata";

/// How long a writer waits for another process's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A ticket modified since load, with the `updated_at` it was loaded with.
#[derive(Debug, Clone, Copy)]
pub struct TicketChange<'a> {
    pub ticket: &'a SupportTicket,
    pub loaded_updated_at: DateTime<Utc>,
}

/// Everything one command produced, written atomically by [`Database::commit`].
#[derive(Debug, Default)]
pub struct CommitBatch<'a> {
    /// Highest stored event sequence number when the caller loaded its state
    pub base_seq: u64,
    pub events: &'a [Event],
    pub usage_log: &'a [FeatureUsageLogEntry],
    pub new_tickets: Vec<&'a SupportTicket>,
    pub changed_tickets: Vec<TicketChange<'a>>,
}

impl CommitBatch<'_> {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
            && self.usage_log.is_empty()
            && self.new_tickets.is_empty()
            && self.changed_tickets.is_empty()
    }
}

/// Database handle (single connection)
pub struct Database {
    conn: Mutex<Connection>,
}

fn conversion_error(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn parse_ts(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn parse_enum<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e: String| conversion_error(idx, e))
}

fn parse_json<T: serde::de::DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

/// Map a uniqueness violation to [`Error::Conflict`].
fn conflict_on_duplicate(err: rusqlite::Error, what: impl FnOnce() -> String) -> Error {
    match err {
        rusqlite::Error::SqliteFailure(ref e, _) if e.code == ErrorCode::ConstraintViolation => {
            Error::Conflict(what())
        }
        other => Error::Database(other),
    }
}

fn max_seq(conn: &Connection) -> Result<u64> {
    let seq: i64 = conn.query_row("SELECT COALESCE(MAX(seq), 0) FROM events", [], |r| {
        r.get(0)
    })?;
    Ok(seq as u64)
}

fn insert_events(conn: &Connection, events: &[Event]) -> Result<usize> {
    let mut stmt = conn.prepare(
        r#"
        INSERT INTO events
            (seq, id, user_id, event_type, event_name, properties, ts, session_id)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )?;
    for event in events {
        stmt.execute(params![
            event.seq as i64,
            event.id,
            event.user_id,
            event.event_type.as_str(),
            event.event_name,
            serde_json::to_string(&event.properties)?,
            event.timestamp.to_rfc3339(),
            event.session_id,
        ])
        .map_err(|e| {
            conflict_on_duplicate(e, || {
                format!("event seq {} ({}) is already stored", event.seq, event.id)
            })
        })?;
    }
    Ok(events.len())
}

fn insert_usage_log(conn: &Connection, entries: &[FeatureUsageLogEntry]) -> Result<usize> {
    let mut stmt = conn.prepare(
        r#"
        INSERT INTO feature_usage_log
            (user_id, feature_name, metadata, logged_at, event_id)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )?;
    for entry in entries {
        stmt.execute(params![
            entry.user_id,
            entry.feature_name,
            serde_json::to_string(&entry.metadata)?,
            entry.logged_at.to_rfc3339(),
            entry.event_id,
        ])
        .map_err(|e| {
            conflict_on_duplicate(e, || {
                format!("usage entry for event {} is already stored", entry.event_id)
            })
        })?;
    }
    Ok(entries.len())
}

fn insert_ticket(conn: &Connection, ticket: &SupportTicket) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO tickets (id, seq, user_id, subject, category, priority, description,
                             status, created_at, updated_at, assigned_to, user_plan,
                             responses, metadata)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        "#,
        params![
            ticket.id,
            ticket.seq as i64,
            ticket.user_id,
            ticket.subject,
            ticket.category.as_str(),
            ticket.priority.as_str(),
            ticket.description,
            ticket.status.as_str(),
            ticket.created_at.to_rfc3339(),
            ticket.updated_at.to_rfc3339(),
            ticket.assigned_to,
            ticket.user_plan,
            serde_json::to_string(&ticket.responses)?,
            serde_json::to_string(&ticket.metadata)?,
        ],
    )
    .map_err(|e| conflict_on_duplicate(e, || format!("ticket {} is already stored", ticket.id)))?;
    Ok(())
}

/// Write the mutable ticket columns, only if the stored row is still the one
/// the caller loaded.
fn update_ticket(conn: &Connection, change: &TicketChange<'_>) -> Result<()> {
    let ticket = change.ticket;
    let updated = conn.execute(
        r#"
        UPDATE tickets SET
            status = ?2,
            updated_at = ?3,
            assigned_to = ?4,
            responses = ?5
        WHERE id = ?1 AND updated_at = ?6
        "#,
        params![
            ticket.id,
            ticket.status.as_str(),
            ticket.updated_at.to_rfc3339(),
            ticket.assigned_to,
            serde_json::to_string(&ticket.responses)?,
            change.loaded_updated_at.to_rfc3339(),
        ],
    )?;
    if updated == 0 {
        return Err(Error::Conflict(format!(
            "ticket {} was changed by another writer",
            ticket.id
        )));
    }
    Ok(())
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        tracing::debug!(path = %path.display(), "Opened database");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn();
        super::schema::run_migrations(&conn)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ============================================
    // Commit
    // ============================================

    /// Persist one command's output atomically.
    ///
    /// Fails with [`Error::Conflict`] and writes nothing when the event log
    /// has grown past `base_seq`, when any id is already stored, or when a
    /// changed ticket was modified by someone else. Returns the number of
    /// events written.
    pub fn commit(&self, batch: &CommitBatch<'_>) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let stored_seq = max_seq(&tx)?;
        if stored_seq != batch.base_seq {
            return Err(Error::Conflict(format!(
                "event log moved from seq {} to {} since it was loaded",
                batch.base_seq, stored_seq
            )));
        }

        let written = insert_events(&tx, batch.events)?;
        insert_usage_log(&tx, batch.usage_log)?;
        for ticket in &batch.new_tickets {
            insert_ticket(&tx, ticket)?;
        }
        for change in &batch.changed_tickets {
            update_ticket(&tx, change)?;
        }
        tx.commit()?;

        tracing::debug!(
            base_seq = batch.base_seq,
            events = written,
            usage_entries = batch.usage_log.len(),
            new_tickets = batch.new_tickets.len(),
            changed_tickets = batch.changed_tickets.len(),
            "Committed batch"
        );
        Ok(written)
    }

    // ============================================
    // Event operations
    // ============================================

    /// Append events in one transaction. Any already-stored sequence number
    /// or id fails the whole append with [`Error::Conflict`].
    pub fn append_events(&self, events: &[Event]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let written = insert_events(&tx, events)?;
        tx.commit()?;

        tracing::debug!(written, "Appended events");
        Ok(written)
    }

    /// All stored events in sequence order
    pub fn load_events(&self) -> Result<Vec<Event>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM events ORDER BY seq ASC",
            EVENT_COLUMNS
        ))?;
        let events = stmt
            .query_map([], Self::row_to_event)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }

    pub fn count_events(&self) -> Result<u64> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |r| r.get(0))?;
        Ok(count as u64)
    }

    /// Highest stored sequence number (0 when empty)
    pub fn last_event_seq(&self) -> Result<u64> {
        max_seq(&self.conn())
    }

    fn row_to_event(row: &Row) -> rusqlite::Result<Event> {
        let seq: i64 = row.get(0)?;
        Ok(Event {
            seq: seq as u64,
            id: row.get(1)?,
            user_id: row.get(2)?,
            event_type: parse_enum(row, 3)?,
            event_name: row.get(4)?,
            properties: parse_json(row, 5)?,
            timestamp: parse_ts(row, 6)?,
            session_id: row.get(7)?,
        })
    }

    // ============================================
    // Ticket operations
    // ============================================

    /// All stored tickets in creation order
    pub fn load_tickets(&self) -> Result<Vec<SupportTicket>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tickets ORDER BY seq ASC",
            TICKET_COLUMNS
        ))?;
        let tickets = stmt
            .query_map([], Self::row_to_ticket)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tickets)
    }

    fn row_to_ticket(row: &Row) -> rusqlite::Result<SupportTicket> {
        let seq: i64 = row.get(1)?;
        Ok(SupportTicket {
            id: row.get(0)?,
            seq: seq as u64,
            user_id: row.get(2)?,
            subject: row.get(3)?,
            category: parse_enum(row, 4)?,
            priority: parse_enum(row, 5)?,
            description: row.get(6)?,
            status: parse_enum(row, 7)?,
            created_at: parse_ts(row, 8)?,
            updated_at: parse_ts(row, 9)?,
            assigned_to: row.get(10)?,
            user_plan: row.get(11)?,
            responses: parse_json(row, 12)?,
            metadata: parse_json(row, 13)?,
        })
    }

    // ============================================
    // Feature usage log
    // ============================================

    /// Append usage-log entries in one transaction. An already-stored event
    /// id fails the whole append with [`Error::Conflict`].
    pub fn append_usage_log(&self, entries: &[FeatureUsageLogEntry]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let written = insert_usage_log(&tx, entries)?;
        tx.commit()?;
        Ok(written)
    }

    pub fn load_usage_log(&self) -> Result<Vec<FeatureUsageLogEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT user_id, feature_name, metadata, logged_at, event_id
             FROM feature_usage_log ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map([], |row| {
                Ok(FeatureUsageLogEntry {
                    user_id: row.get(0)?,
                    feature_name: row.get(1)?,
                    metadata: parse_json(row, 2)?,
                    logged_at: parse_ts(row, 3)?,
                    event_id: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}
