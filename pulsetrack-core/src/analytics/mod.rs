//! Analytics read path for pulsetrack
//!
//! Provides the operational dashboard:
//! - Activity overview for a time window
//! - Feature adoption rates
//! - Funnel stage distribution and conversion
//! - Support ticket metrics
//! - Upgrade-opportunity scoring
//! - Top users and rule-based alerts
//!
//! See [`dashboard`] for how each section is derived.

pub mod dashboard;

pub use dashboard::{
    build_report, Alert, AlertKind, AlertSeverity, DashboardSnapshot, DayCount, EventCount,
    FeatureAdoption, FunnelMetrics, Overview, Report, StageCount, SupportMetrics, TopUser,
    UpgradeOpportunities, UpgradeScore,
};
