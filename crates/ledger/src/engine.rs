//! Core benefit ledger: approves an application and credits the owning
//! user's free months in one transaction, at most once per application.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use claim_core::config::CampaignConfig;
use claim_core::{
    ApplicationStatus, PlanType, SubscriptionBenefit, VerifyError, VerifyResult,
};
use claim_store::ApplicationStore;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GrantOutcome {
    /// The application is now approved and `months` were credited.
    Granted {
        months: u32,
        free_months_remaining: u32,
    },
    /// The application had already reached a terminal status; nothing changed.
    AlreadyFinalized { status: ApplicationStatus },
}

/// The approve-and-credit step, as seen by the orchestrator.
#[async_trait]
pub trait BenefitGranter: Send + Sync {
    async fn grant(
        &self,
        application_id: Uuid,
        user_id: &str,
        plan: PlanType,
    ) -> VerifyResult<GrantOutcome>;
}

/// Ledger over the application store.
pub struct BenefitLedger {
    store: Arc<ApplicationStore>,
    campaign: CampaignConfig,
}

impl BenefitLedger {
    pub fn new(store: Arc<ApplicationStore>, campaign: &CampaignConfig) -> Self {
        info!(
            premium_months = campaign.premium_benefit_months,
            standard_months = campaign.standard_benefit_months,
            "Benefit ledger initialized"
        );
        Self {
            store,
            campaign: campaign.clone(),
        }
    }

    pub fn benefit_months(&self, plan: PlanType) -> u32 {
        self.campaign.benefit_months(plan)
    }

    /// Approve `application_id` and credit its benefit.
    ///
    /// The application's status is read inside the same transaction that
    /// writes it, so a second invocation (sweeper re-run, duplicate trigger)
    /// observes the terminal status and changes nothing.
    pub fn grant_benefit(
        &self,
        application_id: Uuid,
        user_id: &str,
        plan: PlanType,
    ) -> VerifyResult<GrantOutcome> {
        let months = self.benefit_months(plan);

        let outcome = self.store.transaction(|tx| {
            let mut app = tx.application(application_id).ok_or_else(|| {
                VerifyError::NotFound(format!("application {application_id}"))
            })?;

            if app.user_id != user_id {
                return Err(VerifyError::Store(format!(
                    "application {application_id} does not belong to user {user_id}"
                )));
            }
            if app.status.is_terminal() {
                return Ok(GrantOutcome::AlreadyFinalized { status: app.status });
            }
            if app.status != ApplicationStatus::Checking {
                return Err(VerifyError::InvalidTransition {
                    from: app.status,
                    to: ApplicationStatus::Approved,
                });
            }

            let now = Utc::now();
            let mut sub = tx
                .subscription(user_id)
                .unwrap_or_else(|| SubscriptionBenefit::new(user_id));
            let credited = if sub.credit(application_id, months, now) {
                months
            } else {
                debug!(application_id = %application_id, "Benefit already credited for application");
                0
            };

            app.status = ApplicationStatus::Approved;
            app.rejection_reason = None;
            app.verified_at = Some(now);
            app.benefit_applied_at = Some(now);

            let free_months_remaining = sub.free_months_remaining;
            tx.put_application(app);
            tx.put_subscription(sub);

            Ok(GrantOutcome::Granted {
                months: credited,
                free_months_remaining,
            })
        })?;

        match &outcome {
            GrantOutcome::Granted {
                months,
                free_months_remaining,
            } => {
                metrics::counter!("ledger.benefit_months_granted").increment(*months as u64);
                info!(
                    application_id = %application_id,
                    user_id = %user_id,
                    plan = %plan,
                    months = months,
                    balance = free_months_remaining,
                    "Benefit applied"
                );
            }
            GrantOutcome::AlreadyFinalized { status } => {
                metrics::counter!("ledger.duplicate_grants_prevented").increment(1);
                info!(
                    application_id = %application_id,
                    status = %status,
                    "Application already finalized, benefit not applied again"
                );
            }
        }

        Ok(outcome)
    }
}

#[async_trait]
impl BenefitGranter for BenefitLedger {
    async fn grant(
        &self,
        application_id: Uuid,
        user_id: &str,
        plan: PlanType,
    ) -> VerifyResult<GrantOutcome> {
        self.grant_benefit(application_id, user_id, plan)
    }
}
