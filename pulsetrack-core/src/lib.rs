//! # pulsetrack-core
//!
//! Core library for pulsetrack - a user-activity analytics engine.
//!
//! This library provides:
//! - Domain types for events, sessions, funnel state, and support tickets
//! - Session stitching and the in-memory event log with its aggregates
//! - Support ticket triage
//! - The operational dashboard
//! - Database storage layer with SQLite
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Data flows through three layers:
//! - **Ingestion:** [`Tracker`] resolves a session, appends the event, and
//!   updates the feature, funnel, and engagement aggregates in one step
//! - **Read path:** [`analytics::dashboard`] derives reports from the log and
//!   the aggregates without mutating either
//! - **Durable store:** [`Database`] persists the log and tickets; replaying
//!   it into a fresh tracker reproduces the same aggregates
//!
//! ## Example
//!
//! ```rust,no_run
//! use pulsetrack_core::{Config, Database, Tracker};
//!
//! let config = Config::load().expect("failed to load config");
//!
//! let db = Database::open(&Config::database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//!
//! let tracker = Tracker::from_config(&config);
//! tracker
//!     .replay(
//!         db.load_events().unwrap(),
//!         db.load_tickets().unwrap(),
//!         db.load_usage_log().unwrap(),
//!     )
//!     .expect("failed to replay");
//! ```

// Re-export commonly used items at the crate root
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use plans::{PlanDirectory, StaticPlanDirectory};
pub use tickets::{NewTicket, TicketFilter, TicketPage};
pub use tracker::{AggregateSnapshot, Tracker, TrackerSettings};
pub use types::*;

// Public modules
pub mod analytics;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod plans;
pub mod session;
pub mod store;
pub mod tickets;
pub mod tracker;
pub mod types;
