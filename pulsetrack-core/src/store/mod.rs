//! In-memory event log and the aggregates derived from it.
//!
//! ```text
//! ┌──────────────┐   append   ┌─────────────┐
//! │   Tracker    │ ─────────► │ EventStore  │
//! └──────┬───────┘            └─────────────┘
//!        │ record(&Event)
//!        ├──────────► FeatureUsageAggregator  (per event name)
//!        ├──────────► FunnelTracker           (per user, state machine)
//!        └──────────► EngagementAggregator    (per user)
//! ```
//!
//! Every aggregate is a fold over the event log: feeding the same events in
//! the same order into empty aggregates yields identical values.

mod engagement;
mod features;
mod funnel;

pub use engagement::{feature_key, EngagementAggregator};
pub use features::FeatureUsageAggregator;
pub use funnel::{next_stage, FunnelTracker};

use crate::types::{Event, EventType, Properties};
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

/// How much of the event log is kept in memory.
///
/// Eviction only trims the log. Aggregates already folded from evicted events
/// keep their values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Keep at most this many events (oldest dropped first)
    pub max_events: Option<usize>,
    /// Drop events older than this relative to the newest ingestion time
    pub max_age: Option<Duration>,
}

impl RetentionPolicy {
    /// Keep everything.
    pub fn unbounded() -> Self {
        Self::default()
    }
}

/// Append-only, time-ordered event log.
#[derive(Debug, Clone, Default)]
pub struct EventStore {
    events: VecDeque<Event>,
    next_seq: u64,
    retention: RetentionPolicy,
}

impl EventStore {
    pub fn new(retention: RetentionPolicy) -> Self {
        Self {
            events: VecDeque::new(),
            next_seq: 1,
            retention,
        }
    }

    /// Build and append a new event, assigning its id and sequence number.
    pub fn append(
        &mut self,
        user_id: &str,
        event_type: EventType,
        event_name: &str,
        properties: Properties,
        timestamp: DateTime<Utc>,
        session_id: String,
    ) -> &Event {
        let seq = self.next_seq.max(1);
        self.next_seq = seq + 1;

        self.events.push_back(Event {
            id: uuid::Uuid::new_v4().to_string(),
            seq,
            user_id: user_id.to_string(),
            event_type,
            event_name: event_name.to_string(),
            properties,
            timestamp,
            session_id,
        });
        // Just pushed
        &self.events[self.events.len() - 1]
    }

    /// Append an event that already has an id and sequence number (replay).
    pub fn restore(&mut self, event: Event) {
        self.next_seq = self.next_seq.max(event.seq + 1);
        self.events.push_back(event);
    }

    /// Apply the retention policy. Returns how many events were evicted.
    pub fn enforce_retention(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.events.len();

        if let Some(max_age) = self.retention.max_age {
            let cutoff = now - max_age;
            while self
                .events
                .front()
                .map(|e| e.timestamp < cutoff)
                .unwrap_or(false)
            {
                self.events.pop_front();
            }
        }

        if let Some(max_events) = self.retention.max_events {
            while self.events.len() > max_events {
                self.events.pop_front();
            }
        }

        let evicted = before - self.events.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.events.len(), "Event retention applied");
        }
        evicted
    }

    /// All retained events, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Events with `start <= timestamp <= end`, oldest first.
    pub fn in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Iterator<Item = &Event> {
        self.events
            .iter()
            .filter(move |e| e.timestamp >= start && e.timestamp <= end)
    }

    /// Events appended after sequence number `seq`.
    pub fn since(&self, seq: u64) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(move |e| e.seq > seq)
    }

    pub fn get(&self, id: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Sequence number of the most recent event (0 when empty).
    pub fn last_seq(&self) -> u64 {
        self.next_seq.saturating_sub(1)
    }
}
