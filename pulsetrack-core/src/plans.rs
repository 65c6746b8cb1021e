//! Plan-tier lookup.
//!
//! The subscription system is external. The tracker only needs a user's
//! current tier as an opaque string, resolved before any state is locked.

use std::collections::HashMap;

/// Tier reported when a lookup has nothing for the user.
pub const DEFAULT_PLAN: &str = "basic";

/// Source of a user's current plan tier.
pub trait PlanDirectory: Send + Sync {
    /// The user's tier, or `None` when unknown or unavailable.
    fn lookup(&self, user_id: &str) -> Option<String>;

    /// The user's tier, falling back to `basic`.
    fn user_plan(&self, user_id: &str) -> String {
        self.lookup(user_id)
            .unwrap_or_else(|| DEFAULT_PLAN.to_string())
    }
}

/// Fixed user -> tier table, typically loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticPlanDirectory {
    plans: HashMap<String, String>,
    default_plan: Option<String>,
}

impl StaticPlanDirectory {
    pub fn new(plans: HashMap<String, String>) -> Self {
        Self {
            plans,
            default_plan: None,
        }
    }

    /// Tier for users missing from the table.
    pub fn with_default(mut self, plan: impl Into<String>) -> Self {
        self.default_plan = Some(plan.into());
        self
    }

    pub fn insert(&mut self, user_id: impl Into<String>, plan: impl Into<String>) {
        self.plans.insert(user_id.into(), plan.into());
    }
}

impl PlanDirectory for StaticPlanDirectory {
    fn lookup(&self, user_id: &str) -> Option<String> {
        self.plans
            .get(user_id)
            .or(self.default_plan.as_ref())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_user_defaults_to_basic() {
        let plans = StaticPlanDirectory::default();
        assert_eq!(plans.user_plan("nobody"), "basic");
    }

    #[test]
    fn test_table_and_configured_default() {
        let mut plans = StaticPlanDirectory::default().with_default("premium");
        plans.insert("u1", "pro");

        assert_eq!(plans.user_plan("u1"), "pro");
        assert_eq!(plans.user_plan("u2"), "premium");
    }
}
