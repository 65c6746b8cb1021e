//! Session stitching.
//!
//! Each user has at most one active session. A session is retired once the gap
//! between its last activity and a new event exceeds the idle timeout; the next
//! event then opens a fresh session with a new id. Retired sessions are not kept
//! here, only referenced by the events that carry their id.

use crate::types::Session;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Default idle gap after which a session is retired.
pub const DEFAULT_IDLE_TIMEOUT_MINUTES: i64 = 30;

/// Resolves users to their active session.
#[derive(Debug, Clone)]
pub struct SessionManager {
    idle_timeout: Duration,
    active: HashMap<String, Session>,
}

impl SessionManager {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            idle_timeout,
            active: HashMap::new(),
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Return the session id for an event at `at`, opening a new session when
    /// the user has none or the previous one has gone idle.
    pub fn resolve(&mut self, user_id: &str, at: DateTime<Utc>) -> String {
        if let Some(session) = self.active.get_mut(user_id) {
            if at.signed_duration_since(session.last_activity) <= self.idle_timeout {
                session.last_activity = session.last_activity.max(at);
                return session.id.clone();
            }
            tracing::debug!(
                user_id,
                session_id = %session.id,
                idle_minutes = at.signed_duration_since(session.last_activity).num_minutes(),
                "Session expired"
            );
        }

        let session = Session {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            start_time: at,
            last_activity: at,
        };
        tracing::debug!(user_id, session_id = %session.id, "Opened session");
        let id = session.id.clone();
        self.active.insert(user_id.to_string(), session);
        id
    }

    /// Re-attach a stored event to session state during replay.
    ///
    /// The stored session id wins over the timeout decision so replayed state
    /// matches what was recorded.
    pub fn restore(&mut self, user_id: &str, session_id: &str, at: DateTime<Utc>) {
        match self.active.get_mut(user_id) {
            Some(session) if session.id == session_id => {
                session.last_activity = session.last_activity.max(at);
            }
            _ => {
                self.active.insert(
                    user_id.to_string(),
                    Session {
                        id: session_id.to_string(),
                        user_id: user_id.to_string(),
                        start_time: at,
                        last_activity: at,
                    },
                );
            }
        }
    }

    /// The user's current session, if any.
    pub fn get(&self, user_id: &str) -> Option<&Session> {
        self.active.get(user_id)
    }

    /// Number of users with a session on record.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_IDLE_TIMEOUT_MINUTES))
    }
}
