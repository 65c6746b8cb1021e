//! Per-event-name usage counters.

use crate::types::{Event, FeatureUsageStat};
use std::collections::{BTreeSet, HashMap};

/// Maintains one [`FeatureUsageStat`] per event name, created lazily.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureUsageAggregator {
    stats: HashMap<String, FeatureUsageStat>,
}

impl FeatureUsageAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the counters for its name.
    pub fn record(&mut self, event: &Event) {
        let stat = self
            .stats
            .entry(event.event_name.clone())
            .or_insert_with(|| FeatureUsageStat {
                total_usage: 0,
                unique_users: BTreeSet::new(),
                last_used: event.timestamp,
            });

        stat.total_usage += 1;
        stat.unique_users.insert(event.user_id.clone());
        stat.last_used = stat.last_used.max(event.timestamp);
    }

    pub fn get(&self, event_name: &str) -> Option<&FeatureUsageStat> {
        self.stats.get(event_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FeatureUsageStat)> {
        self.stats.iter()
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}
