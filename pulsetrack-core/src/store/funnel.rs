//! Per-user funnel state machine.
//!
//! Transitions are single-step promotions evaluated against the user's
//! current stage:
//!
//! | From | Event name contains | To |
//! |------|---------------------|----|
//! | visitor | `onboarding_goals` | engaged |
//! | engaged | `feature_blocked` | considering |
//! | any | `subscription_created` | subscribed |
//!
//! No rule leads into `interested` or `advocate`. Both stages still appear in
//! reporting with a zero count.

use crate::types::{Event, FunnelEntry, FunnelStage, UserFunnelState};
use std::collections::HashMap;

/// The stage `current` moves to on `event_name`, or `None` when no rule fires.
pub fn next_stage(current: FunnelStage, event_name: &str) -> Option<FunnelStage> {
    if event_name.contains("subscription_created") {
        return (current != FunnelStage::Subscribed).then_some(FunnelStage::Subscribed);
    }

    match current {
        FunnelStage::Visitor if event_name.contains("onboarding_goals") => {
            Some(FunnelStage::Engaged)
        }
        FunnelStage::Engaged if event_name.contains("feature_blocked") => {
            Some(FunnelStage::Considering)
        }
        _ => None,
    }
}

/// Maintains one [`UserFunnelState`] per user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunnelTracker {
    states: HashMap<String, UserFunnelState>,
}

impl FunnelTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the event to the user's history and apply any transition.
    ///
    /// Returns `(from, to)` when the stage changed.
    pub fn record(&mut self, event: &Event) -> Option<(FunnelStage, FunnelStage)> {
        let state = self
            .states
            .entry(event.user_id.clone())
            .or_insert_with(|| UserFunnelState {
                stage: FunnelStage::Visitor,
                event_history: Vec::new(),
                first_seen: event.timestamp,
                last_activity: event.timestamp,
            });

        state.event_history.push(FunnelEntry {
            event_name: event.event_name.clone(),
            timestamp: event.timestamp,
        });
        state.last_activity = state.last_activity.max(event.timestamp);

        let from = state.stage;
        let to = next_stage(from, &event.event_name)?;
        state.stage = to;
        Some((from, to))
    }

    pub fn get(&self, user_id: &str) -> Option<&UserFunnelState> {
        self.states.get(user_id)
    }

    pub fn stage(&self, user_id: &str) -> Option<FunnelStage> {
        self.states.get(user_id).map(|s| s.stage)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &UserFunnelState)> {
        self.states.iter()
    }

    /// Number of users in each stage, in progression order (zeros included).
    pub fn stage_counts(&self) -> Vec<(FunnelStage, usize)> {
        FunnelStage::ALL
            .iter()
            .map(|stage| {
                let count = self.states.values().filter(|s| s.stage == *stage).count();
                (*stage, count)
            })
            .collect()
    }

    /// Number of tracked users.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
