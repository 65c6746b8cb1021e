//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/pulsetrack/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/pulsetrack/` (~/.config/pulsetrack/)
//! - Data: `$XDG_DATA_HOME/pulsetrack/` (~/.local/share/pulsetrack/)
//! - State/Logs: `$XDG_STATE_HOME/pulsetrack/` (~/.local/state/pulsetrack/)

use crate::error::{Error, Result};
use crate::plans::{StaticPlanDirectory, DEFAULT_PLAN};
use crate::store::RetentionPolicy;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Session stitching
    #[serde(default)]
    pub session: SessionConfig,

    /// In-memory event log retention
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Dashboard defaults and thresholds
    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// Static plan-tier table
    #[serde(default)]
    pub plans: PlansConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Session stitching configuration
#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    /// Minutes of inactivity after which the next event opens a new session
    #[serde(default = "default_idle_timeout_minutes")]
    pub idle_timeout_minutes: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_minutes: default_idle_timeout_minutes(),
        }
    }
}

fn default_idle_timeout_minutes() -> u32 {
    30
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.idle_timeout_minutes))
    }
}

/// Retention of the in-memory event log.
///
/// Both limits unset means the log grows without bound.
#[derive(Debug, Deserialize, Default, Clone, Copy)]
pub struct RetentionConfig {
    /// Keep at most this many events
    pub max_events: Option<usize>,
    /// Drop events older than this many days
    pub max_age_days: Option<u32>,
}

impl RetentionConfig {
    pub fn policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            max_events: self.max_events,
            max_age: self
                .max_age_days
                .map(|days| chrono::Duration::days(i64::from(days))),
        }
    }
}

/// Dashboard configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    /// Default query window in days
    #[serde(default = "default_window_days")]
    pub window_days: u32,

    /// Number of event names listed in the overview
    #[serde(default = "default_top_events")]
    pub top_events: usize,

    /// Number of users listed in the top-users section
    #[serde(default = "default_top_users")]
    pub top_users: usize,

    /// Engagement score below which a user triggers a low-engagement alert
    #[serde(default = "default_low_engagement_threshold")]
    pub low_engagement_threshold: u64,

    /// Upgrade score at which a user counts as high potential
    #[serde(default = "default_high_potential_score")]
    pub high_potential_score: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            top_events: default_top_events(),
            top_users: default_top_users(),
            low_engagement_threshold: default_low_engagement_threshold(),
            high_potential_score: default_high_potential_score(),
        }
    }
}

fn default_window_days() -> u32 {
    30
}

fn default_top_events() -> usize {
    5
}

fn default_top_users() -> usize {
    10
}

fn default_low_engagement_threshold() -> u64 {
    5
}

fn default_high_potential_score() -> u64 {
    10
}

/// Plan-tier table used when no external subscription service is wired in
#[derive(Debug, Deserialize)]
pub struct PlansConfig {
    /// Tier for users not listed in `users`
    #[serde(default = "default_plan")]
    pub default_plan: String,

    /// user id -> plan tier
    #[serde(default)]
    pub users: HashMap<String, String>,
}

impl Default for PlansConfig {
    fn default() -> Self {
        Self {
            default_plan: default_plan(),
            users: HashMap::new(),
        }
    }
}

fn default_plan() -> String {
    DEFAULT_PLAN.to_string()
}

impl PlansConfig {
    pub fn directory(&self) -> StaticPlanDirectory {
        StaticPlanDirectory::new(self.users.clone()).with_default(self.default_plan.clone())
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.session.idle_timeout_minutes == 0 {
            return Err(Error::Config(
                "session.idle_timeout_minutes must be at least 1".to_string(),
            ));
        }
        if self.retention.max_events == Some(0) {
            return Err(Error::Config(
                "retention.max_events must be at least 1 when set".to_string(),
            ));
        }
        if self.dashboard.window_days == 0 {
            return Err(Error::Config(
                "dashboard.window_days must be at least 1".to_string(),
            ));
        }
        if self.dashboard.top_events == 0 || self.dashboard.top_users == 0 {
            return Err(Error::Config(
                "dashboard.top_events and dashboard.top_users must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/pulsetrack/config.toml` (~/.config/pulsetrack/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("pulsetrack").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/pulsetrack/` (~/.local/share/pulsetrack/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("pulsetrack")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/pulsetrack/` (~/.local/state/pulsetrack/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("pulsetrack")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/pulsetrack/events.db` (~/.local/share/pulsetrack/events.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("events.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/pulsetrack/pulsetrack.log` (~/.local/state/pulsetrack/pulsetrack.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("pulsetrack.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plans::PlanDirectory;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.session.idle_timeout_minutes, 30);
        assert_eq!(config.dashboard.window_days, 30);
        assert_eq!(config.dashboard.low_engagement_threshold, 5);
        assert_eq!(config.dashboard.high_potential_score, 10);
        assert_eq!(config.plans.default_plan, "basic");
        assert_eq!(config.retention.policy(), RetentionPolicy::unbounded());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[session]
idle_timeout_minutes = 45

[retention]
max_events = 10000
max_age_days = 90

[dashboard]
top_users = 3

[plans]
default_plan = "basic"

[plans.users]
alice = "pro"

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.session.idle_timeout(), chrono::Duration::minutes(45));
        assert_eq!(config.retention.max_events, Some(10000));
        assert_eq!(
            config.retention.policy().max_age,
            Some(chrono::Duration::days(90))
        );
        assert_eq!(config.dashboard.top_users, 3);
        assert_eq!(config.dashboard.top_events, 5);
        assert_eq!(config.logging.level, "debug");

        let plans = config.plans.directory();
        assert_eq!(plans.user_plan("alice"), "pro");
        assert_eq!(plans.user_plan("bob"), "basic");
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        let config: Config = toml::from_str("[session]\nidle_timeout_minutes = 0\n").unwrap();
        assert!(config.validate().is_err());

        let config: Config = toml::from_str("[dashboard]\nwindow_days = 0\n").unwrap();
        assert!(config.validate().is_err());

        let config: Config = toml::from_str("[retention]\nmax_events = 0\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[dashboard]\nwindow_days = 7\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.dashboard.window_days, 7);

        std::fs::write(&path, "[dashboard\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }
}
