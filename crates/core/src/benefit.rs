//! Subscription benefit domain types: plan tiers and the per-user benefit
//! record the campaign contributes free months to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

// ─── Plan Tiers ─────────────────────────────────────────────────────────────

/// Subscription plan the application was made under.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    Premium,
    Standard,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Premium => "premium",
            PlanType::Standard => "standard",
        }
    }
}

impl fmt::Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Subscription Benefit ───────────────────────────────────────────────────

/// Campaign-contributed subscription state for one user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionBenefit {
    pub user_id: String,
    /// Never decreased by this pipeline.
    pub free_months_remaining: u32,
    pub campaign_benefit_applied: bool,
    pub campaign_benefit_applied_at: Option<DateTime<Utc>>,
    /// Applications that have already contributed months.
    #[serde(default)]
    pub granted_applications: BTreeSet<Uuid>,
    #[serde(default)]
    pub version: u64,
}

impl SubscriptionBenefit {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    pub fn has_grant_for(&self, application_id: &Uuid) -> bool {
        self.granted_applications.contains(application_id)
    }

    /// Credit `months` on behalf of `application_id`. Returns false, leaving
    /// the record untouched, if that application was already credited.
    pub fn credit(&mut self, application_id: Uuid, months: u32, at: DateTime<Utc>) -> bool {
        if !self.granted_applications.insert(application_id) {
            return false;
        }
        self.free_months_remaining = self.free_months_remaining.saturating_add(months);
        self.campaign_benefit_applied = true;
        self.campaign_benefit_applied_at = Some(at);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_once_per_application() {
        let mut sub = SubscriptionBenefit::new("user-1");
        let app = Uuid::new_v4();
        let now = Utc::now();

        assert!(sub.credit(app, 2, now));
        assert!(!sub.credit(app, 2, now));
        assert_eq!(sub.free_months_remaining, 2);
        assert!(sub.campaign_benefit_applied);
        assert_eq!(sub.campaign_benefit_applied_at, Some(now));
    }

    #[test]
    fn test_credits_accumulate_across_applications() {
        let mut sub = SubscriptionBenefit::new("user-1");
        sub.credit(Uuid::new_v4(), 1, Utc::now());
        sub.credit(Uuid::new_v4(), 2, Utc::now());
        assert_eq!(sub.free_months_remaining, 3);
        assert_eq!(sub.granted_applications.len(), 2);
    }

    #[test]
    fn test_plan_serde() {
        let plan: PlanType = serde_json::from_str("\"standard\"").unwrap();
        assert_eq!(plan, PlanType::Standard);
        assert_eq!(PlanType::Premium.to_string(), "premium");
    }
}
