//! Error types for pulsetrack-core

use thiserror::Error;

/// Main error type for the pulsetrack-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or malformed required input; nothing was recorded
    #[error("validation error: {0}")]
    Validation(String),

    /// Ticket lookup by id found nothing
    #[error("ticket not found: {0}")]
    TicketNotFound(String),

    /// Ticket status change that would move backwards or leave a terminal state
    #[error("invalid ticket status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// The durable store changed underneath this handle's loaded state
    #[error("conflicting write: {0}")]
    Conflict(String),

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Shorthand for a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    /// Rejected input (including disallowed status transitions).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::InvalidTransition { .. }
        )
    }

    /// Direct lookup by id found nothing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::TicketNotFound(_))
    }

    /// Another writer got to the store first; reload and retry.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }
}

/// Result type alias for pulsetrack-core
pub type Result<T> = std::result::Result<T, Error>;
