//! Per-user engagement counters.

use crate::types::{Event, UserEngagementStat};
use std::collections::{BTreeSet, HashMap};

/// Event-name prefixes that wrap a feature name.
const FEATURE_PREFIXES: &[&str] = &["feature_accessed_", "feature_blocked_", "feature_used_"];

/// The feature an event name refers to.
///
/// `feature_blocked_export` and `feature_accessed_export` both touch `export`.
/// Names without a feature prefix count as their own feature.
pub fn feature_key(event_name: &str) -> &str {
    FEATURE_PREFIXES
        .iter()
        .find_map(|prefix| event_name.strip_prefix(*prefix))
        .filter(|rest| !rest.is_empty())
        .unwrap_or(event_name)
}

/// Maintains one [`UserEngagementStat`] per user, created lazily.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngagementAggregator {
    stats: HashMap<String, UserEngagementStat>,
}

impl EngagementAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: &Event) {
        let stat = self
            .stats
            .entry(event.user_id.clone())
            .or_insert_with(|| UserEngagementStat {
                total_feature_usage: 0,
                features_used: BTreeSet::new(),
                last_activity: event.timestamp,
            });

        stat.total_feature_usage += 1;
        stat.features_used
            .insert(feature_key(&event.event_name).to_string());
        stat.last_activity = stat.last_activity.max(event.timestamp);
    }

    pub fn get(&self, user_id: &str) -> Option<&UserEngagementStat> {
        self.stats.get(user_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &UserEngagementStat)> {
        self.stats.iter()
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventType, Properties};
    use chrono::{TimeZone, Utc};

    fn event(user: &str, name: &str) -> Event {
        Event {
            id: format!("{user}-{name}"),
            seq: 0,
            user_id: user.to_string(),
            event_type: EventType::UserAction,
            event_name: name.to_string(),
            properties: Properties::new(),
            timestamp: Utc.with_ymd_and_hms(2026, 4, 1, 10, 0, 0).unwrap(),
            session_id: "s".to_string(),
        }
    }

    #[test]
    fn test_feature_key() {
        assert_eq!(feature_key("feature_blocked_export"), "export");
        assert_eq!(feature_key("feature_accessed_export"), "export");
        assert_eq!(feature_key("feature_used_reports"), "reports");
        assert_eq!(feature_key("onboarding_goals"), "onboarding_goals");
        assert_eq!(feature_key("feature_blocked_"), "feature_blocked_");
    }

    #[test]
    fn test_score_tracks_volume_and_breadth() {
        let mut engagement = EngagementAggregator::new();
        engagement.record(&event("u1", "onboarding_goals"));
        for _ in 0..3 {
            engagement.record(&event("u1", "feature_blocked_export"));
        }
        engagement.record(&event("u1", "feature_accessed_export"));

        let stat = engagement.get("u1").unwrap();
        assert_eq!(stat.total_feature_usage, 5);
        assert_eq!(stat.features_used.len(), 2);
        assert_eq!(stat.engagement_score(), 10);
        assert!(engagement.get("u2").is_none());
    }
}
