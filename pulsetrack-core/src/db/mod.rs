//! Database layer for pulsetrack
//!
//! This module provides the durable store using SQLite with:
//! - Schema migrations
//! - Append-only event log keyed by tracker sequence number
//! - Atomic commits of events, tickets, and the admin feature-usage log

pub mod repo;
pub mod schema;

pub use repo::{CommitBatch, Database, TicketChange};
