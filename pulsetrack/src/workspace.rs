//! Durable state for a single CLI invocation.
//!
//! The database is the source of truth. On open, the stored log is replayed
//! into a fresh tracker; on persist, only what the command added or changed
//! is written, in one transaction that fails if another run wrote first.

use anyhow::{Context, Result};
use pulsetrack_core::db::{CommitBatch, TicketChange};
use pulsetrack_core::{Config, Database, SupportTicket, Tracker};
use std::collections::HashMap;

pub struct Workspace {
    db: Database,
    tracker: Tracker,
    loaded_seq: u64,
    loaded_usage: usize,
    loaded_tickets: HashMap<String, SupportTicket>,
}

impl Workspace {
    pub fn open(config: &Config) -> Result<Self> {
        let db_path = Config::database_path();
        tracing::info!(path = %db_path.display(), "Opening database");

        let db = Database::open(&db_path).context("failed to open database")?;
        db.migrate().context("failed to run database migrations")?;
        Self::load(db, config)
    }

    fn load(db: Database, config: &Config) -> Result<Self> {
        let events = db.load_events().context("failed to load events")?;
        let tickets = db.load_tickets().context("failed to load tickets")?;
        let usage_log = db.load_usage_log().context("failed to load usage log")?;
        let loaded_seq = events.last().map_or(0, |e| e.seq);
        let loaded_usage = usage_log.len();
        let loaded_tickets = tickets
            .iter()
            .map(|t| (t.id.clone(), t.clone()))
            .collect();

        let tracker = Tracker::from_config(config);
        tracker
            .replay(events, tickets, usage_log)
            .context("failed to replay stored events")?;

        Ok(Self {
            db,
            tracker,
            loaded_seq,
            loaded_usage,
            loaded_tickets,
        })
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Commit new events, usage entries, and new or changed tickets.
    ///
    /// Fails with [`pulsetrack_core::Error::Conflict`] when another run
    /// committed after this one loaded; nothing is written in that case.
    pub fn persist(&mut self) -> Result<()> {
        let events = self.tracker.events_since(self.loaded_seq);
        let usage_log = self.tracker.usage_log();
        let usage_tail = usage_log.get(self.loaded_usage..).unwrap_or_default();
        let tickets = self.tracker.tickets();

        let mut batch = CommitBatch {
            base_seq: self.loaded_seq,
            events: &events,
            usage_log: usage_tail,
            ..Default::default()
        };
        for ticket in &tickets {
            match self.loaded_tickets.get(&ticket.id) {
                None => batch.new_tickets.push(ticket),
                Some(loaded) if loaded != ticket => batch.changed_tickets.push(TicketChange {
                    ticket,
                    loaded_updated_at: loaded.updated_at,
                }),
                Some(_) => {}
            }
        }

        if batch.is_empty() {
            tracing::debug!("Nothing to persist");
            return Ok(());
        }

        let written = self
            .db
            .commit(&batch)
            .context("failed to persist state")?;
        tracing::info!(
            events_written = written,
            tickets_created = batch.new_tickets.len(),
            tickets_updated = batch.changed_tickets.len(),
            "Persisted state"
        );

        self.loaded_seq = events.last().map_or(self.loaded_seq, |e| e.seq);
        self.loaded_usage = usage_log.len();
        self.loaded_tickets = tickets.into_iter().map(|t| (t.id.clone(), t)).collect();
        Ok(())
    }
}
