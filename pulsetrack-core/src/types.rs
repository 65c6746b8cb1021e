//! Core domain types for pulsetrack
//!
//! These types describe the canonical data model shared by the ingestion
//! pipeline, the aggregators, ticket triage, and the dashboard read path.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Event** | An immutable record of one user action |
//! | **Session** | A contiguous span of user activity bounded by an idle timeout |
//! | **Feature** | The product capability an event name refers to |
//! | **Funnel stage** | A point in the fixed user lifecycle (visitor ... advocate) |
//! | **Ticket** | A support request with a computed priority |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ============================================
// Events
// ============================================

/// Category of an ingested event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    UserAction,
    FeatureAccess,
    SubscriptionEvent,
    OnboardingStep,
    BlockedFeature,
    UpgradePrompt,
    /// Emitted by ticket triage so engagement and funnel state stay consistent
    SupportTicket,
}

impl EventType {
    /// Returns the identifier used in storage and on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::UserAction => "user_action",
            EventType::FeatureAccess => "feature_access",
            EventType::SubscriptionEvent => "subscription_event",
            EventType::OnboardingStep => "onboarding_step",
            EventType::BlockedFeature => "blocked_feature",
            EventType::UpgradePrompt => "upgrade_prompt",
            EventType::SupportTicket => "support_ticket",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user_action" => Ok(EventType::UserAction),
            "feature_access" => Ok(EventType::FeatureAccess),
            "subscription_event" => Ok(EventType::SubscriptionEvent),
            "onboarding_step" => Ok(EventType::OnboardingStep),
            "blocked_feature" => Ok(EventType::BlockedFeature),
            "upgrade_prompt" => Ok(EventType::UpgradePrompt),
            "support_ticket" => Ok(EventType::SupportTicket),
            _ => Err(format!("unknown event type: {}", s)),
        }
    }
}

/// A single value in an event property bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    String(String),
    Number(f64),
    Bool(bool),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Number(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Number(value as f64)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

/// Free-form event properties. Ordered so serialized output is stable.
pub type Properties = BTreeMap<String, PropertyValue>;

/// An immutable record of one user action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier returned to the caller
    pub id: String,
    /// Position in the event log (monotonic, starts at 1)
    pub seq: u64,
    pub user_id: String,
    pub event_type: EventType,
    /// Free-form category, e.g. `feature_blocked_export`
    pub event_name: String,
    pub properties: Properties,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
}

// ============================================
// Sessions
// ============================================

/// A contiguous span of activity for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub start_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

// ============================================
// Aggregates
// ============================================

/// Rolling counters for one event name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureUsageStat {
    pub total_usage: u64,
    pub unique_users: BTreeSet<String>,
    pub last_used: DateTime<Utc>,
}

impl FeatureUsageStat {
    pub fn unique_user_count(&self) -> usize {
        self.unique_users.len()
    }
}

/// Lifecycle stages, in intended progression order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunnelStage {
    Visitor,
    Engaged,
    Interested,
    Considering,
    Subscribed,
    Advocate,
}

impl FunnelStage {
    /// Every stage in progression order
    pub const ALL: [FunnelStage; 6] = [
        FunnelStage::Visitor,
        FunnelStage::Engaged,
        FunnelStage::Interested,
        FunnelStage::Considering,
        FunnelStage::Subscribed,
        FunnelStage::Advocate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FunnelStage::Visitor => "visitor",
            FunnelStage::Engaged => "engaged",
            FunnelStage::Interested => "interested",
            FunnelStage::Considering => "considering",
            FunnelStage::Subscribed => "subscribed",
            FunnelStage::Advocate => "advocate",
        }
    }
}

impl std::fmt::Display for FunnelStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry in a user's funnel history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelEntry {
    pub event_name: String,
    pub timestamp: DateTime<Utc>,
}

/// Funnel position and history for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFunnelState {
    pub stage: FunnelStage,
    /// Append-only
    pub event_history: Vec<FunnelEntry>,
    pub first_seen: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// Per-user engagement counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEngagementStat {
    pub total_feature_usage: u64,
    pub features_used: BTreeSet<String>,
    pub last_activity: DateTime<Utc>,
}

impl UserEngagementStat {
    /// Usage volume times feature breadth. Derived on every read.
    pub fn engagement_score(&self) -> u64 {
        self.total_feature_usage * self.features_used.len() as u64
    }
}

/// An entry recorded by the admin-facing `log_feature_usage` path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureUsageLogEntry {
    pub user_id: String,
    pub feature_name: String,
    pub metadata: Properties,
    pub logged_at: DateTime<Utc>,
    /// Event recorded for this entry
    pub event_id: String,
}

// ============================================
// Support tickets
// ============================================

/// Support ticket category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketCategory {
    Billing,
    Technical,
    Features,
    General,
}

impl TicketCategory {
    pub const ALL: [TicketCategory; 4] = [
        TicketCategory::Billing,
        TicketCategory::Technical,
        TicketCategory::Features,
        TicketCategory::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketCategory::Billing => "billing",
            TicketCategory::Technical => "technical",
            TicketCategory::Features => "features",
            TicketCategory::General => "general",
        }
    }
}

impl std::str::FromStr for TicketCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "billing" => Ok(TicketCategory::Billing),
            "technical" => Ok(TicketCategory::Technical),
            "features" => Ok(TicketCategory::Features),
            "general" => Ok(TicketCategory::General),
            _ => Err(format!("unknown ticket category: {}", s)),
        }
    }
}

/// Computed ticket priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
}

impl TicketPriority {
    pub const ALL: [TicketPriority; 3] = [
        TicketPriority::Low,
        TicketPriority::Medium,
        TicketPriority::High,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketPriority::Low => "low",
            TicketPriority::Medium => "medium",
            TicketPriority::High => "high",
        }
    }
}

impl std::str::FromStr for TicketPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(TicketPriority::Low),
            "medium" => Ok(TicketPriority::Medium),
            "high" => Ok(TicketPriority::High),
            _ => Err(format!("unknown ticket priority: {}", s)),
        }
    }
}

/// Ticket lifecycle: open -> in_progress -> resolved -> closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 4] = [
        TicketStatus::Open,
        TicketStatus::InProgress,
        TicketStatus::Resolved,
        TicketStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
        }
    }

    /// Resolved or closed; counted by resolution rate and response time.
    pub fn is_finished(&self) -> bool {
        matches!(self, TicketStatus::Resolved | TicketStatus::Closed)
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(TicketStatus::Open),
            "in_progress" => Ok(TicketStatus::InProgress),
            "resolved" => Ok(TicketStatus::Resolved),
            "closed" => Ok(TicketStatus::Closed),
            _ => Err(format!("unknown ticket status: {}", s)),
        }
    }
}

/// A reply appended to a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketResponse {
    pub author: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Request context captured at ticket creation. Stored verbatim, never parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub current_url: Option<String>,
}

/// A support ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportTicket {
    pub id: String,
    /// Creation order, used to break `created_at` ties
    pub seq: u64,
    pub user_id: String,
    pub subject: String,
    pub category: TicketCategory,
    pub priority: TicketPriority,
    pub description: String,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub assigned_to: Option<String>,
    pub user_plan: String,
    pub responses: Vec<TicketResponse>,
    pub metadata: RequestMetadata,
}
