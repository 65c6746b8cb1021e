//! The tracker: one owned handle over all analytics state.
//!
//! ## Architecture
//!
//! ```text
//! track_event ──► SessionManager ──► EventStore ──┬─► FeatureUsageAggregator
//!                                                  ├─► FunnelTracker
//!                                                  └─► EngagementAggregator
//! create_ticket ──► TicketBook ──► track_event path (support_ticket / ticket_created)
//! dashboard ──► analytics::build_report (read lock only)
//! ```
//!
//! All state sits behind a single `RwLock`. Writers hold the write lock for
//! the whole session-resolve/append/aggregate sequence, so two events for the
//! same user can never interleave their timeout decision or counter updates.
//! Plan-tier lookups run before the lock is taken.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pulsetrack_core::{Config, Tracker};
//!
//! let config = Config::load()?;
//! let tracker = Tracker::from_config(&config);
//!
//! tracker.track_onboarding_step("user-1", "goals", Properties::new())?;
//! tracker.track_feature_access("user-1", "export", false)?;
//!
//! let report = tracker.dashboard(30)?;
//! println!("{} active users", report.overview.active_users);
//! ```

use crate::analytics::{build_report, DashboardSnapshot, Report};
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, DashboardConfig};
use crate::error::{Error, Result};
use crate::plans::{PlanDirectory, StaticPlanDirectory};
use crate::session::SessionManager;
use crate::store::{
    EngagementAggregator, EventStore, FeatureUsageAggregator, FunnelTracker, RetentionPolicy,
};
use crate::tickets::{NewTicket, TicketBook, TicketFilter, TicketPage};
use crate::types::*;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Construction-time settings for a [`Tracker`].
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub idle_timeout: Duration,
    pub retention: RetentionPolicy,
    pub dashboard: DashboardConfig,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::minutes(crate::session::DEFAULT_IDLE_TIMEOUT_MINUTES),
            retention: RetentionPolicy::unbounded(),
            dashboard: DashboardConfig::default(),
        }
    }
}

impl TrackerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            idle_timeout: config.session.idle_timeout(),
            retention: config.retention.policy(),
            dashboard: config.dashboard.clone(),
        }
    }
}

/// Value snapshot of every per-key aggregate, ordered by key.
///
/// Two trackers fed the same events compare equal here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateSnapshot {
    pub features: BTreeMap<String, FeatureUsageStat>,
    pub funnel: BTreeMap<String, UserFunnelState>,
    pub engagement: BTreeMap<String, UserEngagementStat>,
}

struct TrackerState {
    sessions: SessionManager,
    events: EventStore,
    features: FeatureUsageAggregator,
    funnel: FunnelTracker,
    engagement: EngagementAggregator,
    tickets: TicketBook,
    usage_log: Vec<FeatureUsageLogEntry>,
}

impl TrackerState {
    fn new(settings: &TrackerSettings) -> Self {
        Self {
            sessions: SessionManager::new(settings.idle_timeout),
            events: EventStore::new(settings.retention),
            features: FeatureUsageAggregator::new(),
            funnel: FunnelTracker::new(),
            engagement: EngagementAggregator::new(),
            tickets: TicketBook::new(),
            usage_log: Vec::new(),
        }
    }

    /// Session resolve, append, and aggregate fan-out for one event.
    fn ingest(
        &mut self,
        user_id: &str,
        event_type: EventType,
        event_name: &str,
        properties: Properties,
        at: DateTime<Utc>,
    ) -> String {
        let session_id = self.sessions.resolve(user_id, at);
        let event = self
            .events
            .append(user_id, event_type, event_name, properties, at, session_id)
            .clone();

        self.fold(&event);
        self.events.enforce_retention(at);

        tracing::debug!(
            event_id = %event.id,
            seq = event.seq,
            user_id,
            event_type = %event_type,
            event_name,
            session_id = %event.session_id,
            "Event tracked"
        );
        event.id
    }

    fn fold(&mut self, event: &Event) {
        self.features.record(event);
        if let Some((from, to)) = self.funnel.record(event) {
            tracing::info!(
                user_id = %event.user_id,
                from = %from,
                to = %to,
                event_name = %event.event_name,
                "Funnel stage changed"
            );
        }
        self.engagement.record(event);
    }

    fn snapshot(&self) -> DashboardSnapshot<'_> {
        DashboardSnapshot {
            events: &self.events,
            features: &self.features,
            funnel: &self.funnel,
            engagement: &self.engagement,
            tickets: &self.tickets,
        }
    }
}

fn require(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{} is required", field)));
    }
    Ok(())
}

/// Owned analytics engine. Create one at startup and share it by reference.
pub struct Tracker {
    state: RwLock<TrackerState>,
    settings: TrackerSettings,
    clock: Arc<dyn Clock>,
    plans: Arc<dyn PlanDirectory>,
}

impl Tracker {
    /// Create an empty tracker on the system clock with no plan table.
    pub fn new(settings: TrackerSettings) -> Self {
        Self {
            state: RwLock::new(TrackerState::new(&settings)),
            settings,
            clock: Arc::new(SystemClock),
            plans: Arc::new(StaticPlanDirectory::default()),
        }
    }

    /// Create an empty tracker from loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(TrackerSettings::from_config(config)).with_plans(Arc::new(config.plans.directory()))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_plans(mut self, plans: Arc<dyn PlanDirectory>) -> Self {
        self.plans = plans;
        self
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    fn read(&self) -> RwLockReadGuard<'_, TrackerState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, TrackerState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    // ============================================
    // Ingestion
    // ============================================

    /// Record one event and update every aggregate. Returns the event id.
    pub fn track_event(
        &self,
        user_id: &str,
        event_type: EventType,
        event_name: &str,
        properties: Properties,
    ) -> Result<String> {
        require(user_id, "userId")?;
        require(event_name, "eventName")?;

        let now = self.clock.now();
        let mut state = self.write();
        Ok(state.ingest(user_id, event_type, event_name, properties, now))
    }

    /// Record an onboarding step as `onboarding_<step>`.
    pub fn track_onboarding_step(
        &self,
        user_id: &str,
        step: &str,
        mut properties: Properties,
    ) -> Result<String> {
        require(step, "step")?;
        properties.insert("step".to_string(), step.into());
        self.track_event(
            user_id,
            EventType::OnboardingStep,
            &format!("onboarding_{}", step),
            properties,
        )
    }

    /// Record a feature access attempt, granted or blocked.
    ///
    /// Annotates the event with the user's current plan tier.
    pub fn track_feature_access(
        &self,
        user_id: &str,
        feature: &str,
        access_granted: bool,
    ) -> Result<String> {
        require(user_id, "userId")?;
        require(feature, "feature")?;

        let plan = self.plans.user_plan(user_id);
        let (event_type, event_name) = if access_granted {
            (EventType::FeatureAccess, format!("feature_accessed_{}", feature))
        } else {
            (EventType::BlockedFeature, format!("feature_blocked_{}", feature))
        };

        let mut properties = Properties::new();
        properties.insert("feature".to_string(), feature.into());
        properties.insert("accessGranted".to_string(), access_granted.into());
        properties.insert("userPlan".to_string(), plan.into());

        self.track_event(user_id, event_type, &event_name, properties)
    }

    /// Record a subscription lifecycle action as `subscription_<action>`.
    pub fn track_subscription_event(
        &self,
        user_id: &str,
        action: &str,
        plan: &str,
    ) -> Result<String> {
        require(action, "action")?;

        let mut properties = Properties::new();
        properties.insert("action".to_string(), action.into());
        properties.insert("plan".to_string(), plan.into());

        self.track_event(
            user_id,
            EventType::SubscriptionEvent,
            &format!("subscription_{}", action),
            properties,
        )
    }

    /// Record the user's response to an upgrade prompt as `upgrade_prompt_<action>`.
    pub fn track_upgrade_prompt(&self, user_id: &str, trigger: &str, action: &str) -> Result<String> {
        require(action, "action")?;

        let mut properties = Properties::new();
        properties.insert("trigger".to_string(), trigger.into());
        properties.insert("action".to_string(), action.into());

        self.track_event(
            user_id,
            EventType::UpgradePrompt,
            &format!("upgrade_prompt_{}", action),
            properties,
        )
    }

    /// Admin-facing usage log: keeps a log entry and records `feature_used_<feature>`.
    pub fn log_feature_usage(
        &self,
        user_id: &str,
        feature_name: &str,
        metadata: Properties,
    ) -> Result<String> {
        require(user_id, "userId")?;
        require(feature_name, "featureName")?;

        let now = self.clock.now();
        let mut state = self.write();
        let event_id = state.ingest(
            user_id,
            EventType::UserAction,
            &format!("feature_used_{}", feature_name),
            metadata.clone(),
            now,
        );
        state.usage_log.push(FeatureUsageLogEntry {
            user_id: user_id.to_string(),
            feature_name: feature_name.to_string(),
            metadata,
            logged_at: now,
            event_id: event_id.clone(),
        });
        Ok(event_id)
    }

    // ============================================
    // Support tickets
    // ============================================

    /// Create a ticket with computed priority and record `ticket_created`.
    ///
    /// An empty `user_plan` is filled from the plan directory.
    pub fn create_ticket(&self, mut new: NewTicket) -> Result<SupportTicket> {
        if new.user_plan.trim().is_empty() && !new.user_id.trim().is_empty() {
            new.user_plan = self.plans.user_plan(&new.user_id);
        }

        let now = self.clock.now();
        let mut state = self.write();
        let ticket = state.tickets.create(new, now)?;

        let mut properties = Properties::new();
        properties.insert("ticketId".to_string(), ticket.id.clone().into());
        properties.insert("category".to_string(), ticket.category.as_str().into());
        properties.insert("priority".to_string(), ticket.priority.as_str().into());
        state.ingest(
            &ticket.user_id,
            EventType::SupportTicket,
            "ticket_created",
            properties,
            now,
        );

        tracing::info!(
            ticket_id = %ticket.id,
            user_id = %ticket.user_id,
            category = ticket.category.as_str(),
            priority = ticket.priority.as_str(),
            "Ticket created"
        );
        Ok(ticket)
    }

    pub fn list_tickets(
        &self,
        filter: &TicketFilter,
        page: usize,
        page_size: usize,
    ) -> Result<TicketPage> {
        self.read().tickets.list(filter, page, page_size)
    }

    pub fn get_ticket(&self, id: &str) -> Result<SupportTicket> {
        self.read().tickets.get(id).cloned()
    }

    pub fn update_ticket_status(&self, id: &str, status: TicketStatus) -> Result<SupportTicket> {
        let now = self.clock.now();
        let ticket = self.write().tickets.update_status(id, status, now)?;
        tracing::info!(ticket_id = id, status = %status, "Ticket status updated");
        Ok(ticket)
    }

    pub fn assign_ticket(&self, id: &str, assignee: &str) -> Result<SupportTicket> {
        let now = self.clock.now();
        let ticket = self.write().tickets.assign(id, assignee, now)?;
        tracing::info!(ticket_id = id, assignee, "Ticket assigned");
        Ok(ticket)
    }

    pub fn add_ticket_response(
        &self,
        id: &str,
        author: &str,
        message: &str,
    ) -> Result<SupportTicket> {
        let now = self.clock.now();
        self.write().tickets.add_response(id, author, message, now)
    }

    // ============================================
    // Dashboard
    // ============================================

    /// Build the dashboard for the last `window_days` days.
    pub fn dashboard(&self, window_days: u32) -> Result<Report> {
        if window_days == 0 {
            return Err(Error::validation("windowDays must be at least 1"));
        }
        let now = self.clock.now();
        let state = self.read();
        Ok(build_report(
            state.snapshot(),
            now,
            window_days,
            &self.settings.dashboard,
        ))
    }

    /// Build the dashboard for the configured default window.
    pub fn default_dashboard(&self) -> Result<Report> {
        self.dashboard(self.settings.dashboard.window_days)
    }

    // ============================================
    // Read accessors
    // ============================================

    pub fn feature_stat(&self, event_name: &str) -> Option<FeatureUsageStat> {
        self.read().features.get(event_name).cloned()
    }

    pub fn funnel_state(&self, user_id: &str) -> Option<UserFunnelState> {
        self.read().funnel.get(user_id).cloned()
    }

    pub fn funnel_stage(&self, user_id: &str) -> Option<FunnelStage> {
        self.read().funnel.stage(user_id)
    }

    pub fn engagement(&self, user_id: &str) -> Option<UserEngagementStat> {
        self.read().engagement.get(user_id).cloned()
    }

    pub fn session(&self, user_id: &str) -> Option<Session> {
        self.read().sessions.get(user_id).cloned()
    }

    pub fn event(&self, event_id: &str) -> Option<Event> {
        self.read().events.get(event_id).cloned()
    }

    /// Number of events currently retained in memory.
    pub fn event_count(&self) -> usize {
        self.read().events.len()
    }

    /// Sequence number of the latest event (0 when none).
    pub fn last_event_seq(&self) -> u64 {
        self.read().events.last_seq()
    }

    /// Retained events appended after `seq`, oldest first.
    pub fn events_since(&self, seq: u64) -> Vec<Event> {
        self.read().events.since(seq).cloned().collect()
    }

    pub fn tickets(&self) -> Vec<SupportTicket> {
        self.read().tickets.iter().cloned().collect()
    }

    pub fn usage_log(&self) -> Vec<FeatureUsageLogEntry> {
        self.read().usage_log.clone()
    }

    pub fn aggregates(&self) -> AggregateSnapshot {
        let state = self.read();
        AggregateSnapshot {
            features: state
                .features
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            funnel: state
                .funnel
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            engagement: state
                .engagement
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    // ============================================
    // Replay
    // ============================================

    /// Rebuild state from a stored log.
    ///
    /// Events are folded in sequence order and keep their recorded ids and
    /// session ids. Only valid on an empty tracker.
    pub fn replay(
        &self,
        mut events: Vec<Event>,
        tickets: Vec<SupportTicket>,
        usage_log: Vec<FeatureUsageLogEntry>,
    ) -> Result<usize> {
        let mut state = self.write();
        if !state.events.is_empty() || !state.tickets.is_empty() {
            return Err(Error::validation("replay requires an empty tracker"));
        }

        events.sort_by_key(|e| e.seq);
        let replayed = events.len();
        let mut latest = None;
        for event in events {
            state
                .sessions
                .restore(&event.user_id, &event.session_id, event.timestamp);
            state.fold(&event);
            latest = latest.max(Some(event.timestamp));
            state.events.restore(event);
        }
        if let Some(latest) = latest {
            state.events.enforce_retention(latest);
        }

        for ticket in tickets {
            state.tickets.restore(ticket);
        }
        state.usage_log = usage_log;

        tracing::info!(
            events = replayed,
            tickets = state.tickets.len(),
            users = state.funnel.len(),
            "Replayed stored state"
        );
        Ok(replayed)
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new(TrackerSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 1, 9, 0, 0).unwrap()
    }

    fn tracker_at(clock: &Arc<ManualClock>) -> Tracker {
        Tracker::default().with_clock(clock.clone())
    }

    #[test]
    fn test_track_event_rejects_missing_fields() {
        let tracker = Tracker::default();
        let err = tracker
            .track_event("", EventType::UserAction, "login", Properties::new())
            .unwrap_err();
        assert!(err.is_validation());
        let err = tracker
            .track_event("u1", EventType::UserAction, " ", Properties::new())
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(tracker.event_count(), 0);
        assert!(tracker.funnel_state("u1").is_none());
    }

    #[test]
    fn test_track_event_fans_out() {
        let clock = Arc::new(ManualClock::new(start()));
        let tracker = tracker_at(&clock);

        let id = tracker
            .track_event("u1", EventType::UserAction, "login", Properties::new())
            .unwrap();

        let event = tracker.event(&id).unwrap();
        assert_eq!(event.timestamp, start());
        assert_eq!(tracker.session("u1").unwrap().id, event.session_id);
        assert_eq!(tracker.feature_stat("login").unwrap().total_usage, 1);
        assert_eq!(tracker.funnel_stage("u1"), Some(FunnelStage::Visitor));
        assert_eq!(tracker.engagement("u1").unwrap().engagement_score(), 1);
    }

    #[test]
    fn test_session_boundary() {
        let clock = Arc::new(ManualClock::new(start()));
        let tracker = tracker_at(&clock);

        let a = tracker
            .track_event("u1", EventType::UserAction, "a", Properties::new())
            .unwrap();
        clock.advance(Duration::minutes(29));
        let b = tracker
            .track_event("u1", EventType::UserAction, "b", Properties::new())
            .unwrap();
        clock.advance(Duration::minutes(31));
        let c = tracker
            .track_event("u1", EventType::UserAction, "c", Properties::new())
            .unwrap();

        let session_of = |id: &str| tracker.event(id).unwrap().session_id;
        assert_eq!(session_of(&a), session_of(&b));
        assert_ne!(session_of(&b), session_of(&c));
    }

    #[test]
    fn test_wrappers_derive_names() {
        let clock = Arc::new(ManualClock::new(start()));
        let mut plans = StaticPlanDirectory::default();
        plans.insert("u1", "premium");
        let tracker = tracker_at(&clock).with_plans(Arc::new(plans));

        let onboarding = tracker
            .track_onboarding_step("u1", "goals", Properties::new())
            .unwrap();
        let blocked = tracker.track_feature_access("u1", "export", false).unwrap();
        let granted = tracker.track_feature_access("u1", "export", true).unwrap();
        let sub = tracker
            .track_subscription_event("u1", "created", "premium")
            .unwrap();
        let prompt = tracker
            .track_upgrade_prompt("u1", "export_limit", "dismissed")
            .unwrap();

        let name = |id: &str| tracker.event(id).unwrap().event_name;
        assert_eq!(name(&onboarding), "onboarding_goals");
        assert_eq!(name(&blocked), "feature_blocked_export");
        assert_eq!(name(&granted), "feature_accessed_export");
        assert_eq!(name(&sub), "subscription_created");
        assert_eq!(name(&prompt), "upgrade_prompt_dismissed");

        let blocked_event = tracker.event(&blocked).unwrap();
        assert_eq!(blocked_event.event_type, EventType::BlockedFeature);
        assert_eq!(
            blocked_event.properties.get("userPlan").and_then(|v| v.as_str()),
            Some("premium")
        );
        assert_eq!(
            blocked_event.properties.get("accessGranted").and_then(|v| v.as_bool()),
            Some(false)
        );
        assert_eq!(tracker.funnel_stage("u1"), Some(FunnelStage::Subscribed));
    }

    #[test]
    fn test_feature_access_defaults_to_basic_plan() {
        let tracker = Tracker::default();
        let id = tracker.track_feature_access("u9", "reports", true).unwrap();
        let event = tracker.event(&id).unwrap();
        assert_eq!(
            event.properties.get("userPlan").and_then(|v| v.as_str()),
            Some("basic")
        );
    }

    #[test]
    fn test_log_feature_usage_records_entry_and_event() {
        let tracker = Tracker::default();
        let mut metadata = Properties::new();
        metadata.insert("source".into(), "admin".into());

        let id = tracker.log_feature_usage("u1", "reports", metadata).unwrap();

        let log = tracker.usage_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].event_id, id);
        assert_eq!(log[0].feature_name, "reports");
        assert_eq!(tracker.event(&id).unwrap().event_name, "feature_used_reports");
        assert!(tracker
            .engagement("u1")
            .unwrap()
            .features_used
            .contains("reports"));
    }

    #[test]
    fn test_create_ticket_emits_event() {
        let tracker = Tracker::default();
        let ticket = tracker
            .create_ticket(NewTicket {
                user_id: "u1".into(),
                subject: "Refund".into(),
                category: TicketCategory::Billing,
                description: "Charged twice".into(),
                user_plan: "pro".into(),
                metadata: RequestMetadata {
                    user_agent: Some("Mozilla/5.0".into()),
                    ip_address: Some("10.0.0.1".into()),
                    current_url: Some("/billing".into()),
                },
            })
            .unwrap();

        assert_eq!(ticket.priority, TicketPriority::High);
        assert_eq!(tracker.feature_stat("ticket_created").unwrap().total_usage, 1);
        assert_eq!(tracker.get_ticket(&ticket.id).unwrap().metadata.ip_address.as_deref(), Some("10.0.0.1"));
        assert!(tracker.get_ticket("TKT-404").unwrap_err().is_not_found());
    }

    #[test]
    fn test_create_ticket_fills_missing_plan() {
        let mut plans = StaticPlanDirectory::default();
        plans.insert("u1", "premium");
        let tracker = Tracker::default().with_plans(Arc::new(plans));

        let ticket = tracker
            .create_ticket(NewTicket {
                user_id: "u1".into(),
                subject: "Export".into(),
                category: TicketCategory::Technical,
                description: "Export fails".into(),
                user_plan: String::new(),
                metadata: RequestMetadata::default(),
            })
            .unwrap();
        assert_eq!(ticket.user_plan, "premium");
        assert_eq!(ticket.priority, TicketPriority::Medium);
    }

    #[test]
    fn test_invalid_ticket_records_nothing() {
        let tracker = Tracker::default();
        let err = tracker
            .create_ticket(NewTicket {
                user_id: "u1".into(),
                subject: String::new(),
                category: TicketCategory::General,
                description: "x".into(),
                user_plan: "basic".into(),
                metadata: RequestMetadata::default(),
            })
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(tracker.event_count(), 0);
        assert!(tracker.tickets().is_empty());
    }

    #[test]
    fn test_dashboard_rejects_zero_window() {
        let tracker = Tracker::default();
        assert!(tracker.dashboard(0).unwrap_err().is_validation());
        assert!(tracker.default_dashboard().is_ok());
    }

    #[test]
    fn test_replay_reproduces_aggregates_and_sessions() {
        let clock = Arc::new(ManualClock::new(start()));
        let original = tracker_at(&clock);
        original
            .track_onboarding_step("u1", "goals", Properties::new())
            .unwrap();
        clock.advance(Duration::minutes(45));
        original.track_feature_access("u1", "export", false).unwrap();
        original
            .track_event("u2", EventType::UserAction, "login", Properties::new())
            .unwrap();

        let rebuilt = Tracker::default();
        let count = rebuilt
            .replay(original.events_since(0), original.tickets(), original.usage_log())
            .unwrap();

        assert_eq!(count, 3);
        assert_eq!(rebuilt.aggregates(), original.aggregates());
        assert_eq!(rebuilt.session("u1"), original.session("u1"));
        assert_eq!(rebuilt.last_event_seq(), 3);

        // A second replay onto populated state is refused
        assert!(rebuilt
            .replay(original.events_since(0), Vec::new(), Vec::new())
            .is_err());
    }

    #[test]
    fn test_concurrent_tracking_keeps_counts_consistent() {
        let tracker = Arc::new(Tracker::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = tracker.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        tracker
                            .track_event("shared", EventType::UserAction, "click", Properties::new())
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tracker.event_count(), 400);
        assert_eq!(tracker.feature_stat("click").unwrap().total_usage, 400);
        assert_eq!(tracker.engagement("shared").unwrap().total_feature_usage, 400);
        // All within one idle window, so one session
        let sessions: std::collections::HashSet<String> = tracker
            .events_since(0)
            .into_iter()
            .map(|e| e.session_id)
            .collect();
        assert_eq!(sessions.len(), 1);
    }
}
