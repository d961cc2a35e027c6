//! Verification orchestrator — one strictly sequential run per triggering
//! change: locate → validate → grant → notify.
//!
//! Every caught failure ends in a terminal write except a commit conflict,
//! which leaves the application in `checking` for the sweeper.

use std::sync::Arc;

use chrono::Utc;
use claim_channels::{approval_message, Notifier};
use claim_content::ContentValidator;
use claim_core::event_bus::{make_event, EventSink, VerificationEventType};
use claim_core::{
    ApplicationStatus, CampaignApplication, PlanType, RejectionReason, VerifyResult,
};
use claim_ledger::{BenefitGranter, GrantOutcome};
use claim_social::PostLocator;
use claim_store::ApplicationStore;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerificationOutcome {
    Approved { benefit_months: u32 },
    Rejected { reason: RejectionReason },
    /// Another run (or an earlier one) already decided this application.
    AlreadyFinalized { status: ApplicationStatus },
    /// The decision could not be committed; the application stays `checking`.
    Deferred,
    /// Missing application, or not in `checking`.
    Skipped,
}

enum Decision {
    Approve,
    Reject(RejectionReason),
}

pub struct Orchestrator {
    store: Arc<ApplicationStore>,
    locator: Arc<PostLocator>,
    validator: Arc<ContentValidator>,
    ledger: Arc<dyn BenefitGranter>,
    notifier: Arc<dyn Notifier>,
    event_sink: Arc<dyn EventSink>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<ApplicationStore>,
        locator: Arc<PostLocator>,
        validator: Arc<ContentValidator>,
        ledger: Arc<dyn BenefitGranter>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            locator,
            validator,
            ledger,
            notifier,
            event_sink: claim_core::event_bus::noop_sink(),
        }
    }

    /// Attach an event sink for emitting verification events.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    fn emit(&self, kind: VerificationEventType, app: &CampaignApplication, detail: Option<String>) {
        self.event_sink
            .emit(make_event(kind, app.id, Some(&app.user_id), detail));
    }

    /// Verify one application. Never panics on a caught failure and never
    /// returns an error: every path ends the run with an outcome.
    pub async fn run(&self, application_id: Uuid) -> VerificationOutcome {
        let Some(app) = self.store.get_application(&application_id) else {
            warn!(application_id = %application_id, "Verification requested for unknown application");
            return VerificationOutcome::Skipped;
        };

        if app.status != ApplicationStatus::Checking {
            debug!(application_id = %application_id, status = %app.status, "Application not checking, skipping");
            return if app.status.is_terminal() {
                VerificationOutcome::AlreadyFinalized { status: app.status }
            } else {
                VerificationOutcome::Skipped
            };
        }

        info!(
            application_id = %app.id,
            code = %app.unique_code,
            plan = %app.plan_type,
            attempt = app.requeue_count + 1,
            "Verifying application"
        );
        self.emit(VerificationEventType::Started, &app, None);
        let start = std::time::Instant::now();

        let outcome = match self.decide(&app).await {
            Ok(Decision::Approve) => self.approve(&app).await,
            Ok(Decision::Reject(reason)) => self.reject(&app, reason),
            Err(e) => {
                error!(application_id = %app.id, error = %e, "Verification failed");
                self.reject(&app, RejectionReason::SystemError)
            }
        };

        metrics::histogram!("verification.duration_ms").record(start.elapsed().as_millis() as f64);
        outcome
    }

    async fn decide(&self, app: &CampaignApplication) -> VerifyResult<Decision> {
        let Some(post) = self.locator.locate(&app.unique_code).await else {
            self.emit(VerificationEventType::PostNotFound, app, None);
            return Ok(Decision::Reject(RejectionReason::PostNotFound));
        };
        self.emit(VerificationEventType::PostFound, app, post.id.clone());

        let report = self
            .validator
            .validate(&post.text, &app.unique_code, app.plan_type)
            .await?;
        if !report.passed() {
            self.emit(
                VerificationEventType::ContentRejected,
                app,
                Some(format!("{:?}", report.semantic)),
            );
            return Ok(Decision::Reject(RejectionReason::ContentRequirementsNotMet));
        }

        Ok(Decision::Approve)
    }

    async fn approve(&self, app: &CampaignApplication) -> VerificationOutcome {
        match self.ledger.grant(app.id, &app.user_id, app.plan_type).await {
            Ok(GrantOutcome::Granted { months, .. }) => {
                metrics::counter!("verification.approved").increment(1);
                self.emit(VerificationEventType::Approved, app, Some(months.to_string()));
                self.notify_approval(&app.user_id, app.plan_type, months).await;
                VerificationOutcome::Approved {
                    benefit_months: months,
                }
            }
            Ok(GrantOutcome::AlreadyFinalized { status }) => {
                VerificationOutcome::AlreadyFinalized { status }
            }
            Err(e) if e.is_commit_conflict() => {
                metrics::counter!("verification.deferred").increment(1);
                warn!(application_id = %app.id, error = %e, "Benefit commit conflicted, leaving application checking");
                self.emit(VerificationEventType::Deferred, app, Some(e.to_string()));
                VerificationOutcome::Deferred
            }
            Err(e) => {
                error!(application_id = %app.id, error = %e, "Benefit grant failed");
                self.reject(app, RejectionReason::SystemError)
            }
        }
    }

    fn reject(&self, app: &CampaignApplication, reason: RejectionReason) -> VerificationOutcome {
        match self.store.reject(&app.id, reason.message(), Utc::now()) {
            Ok(Some(_)) => {
                metrics::counter!("verification.rejected", "reason" => reason.label()).increment(1);
                info!(application_id = %app.id, reason = %reason, "Application rejected");
                self.emit(VerificationEventType::Rejected, app, Some(reason.message().to_string()));
                VerificationOutcome::Rejected { reason }
            }
            Ok(None) => {
                let status = self
                    .store
                    .get_application(&app.id)
                    .map(|a| a.status)
                    .filter(ApplicationStatus::is_terminal);
                debug!(application_id = %app.id, status = ?status, "Application left checking before rejection");
                match status {
                    Some(status) => VerificationOutcome::AlreadyFinalized { status },
                    None => VerificationOutcome::Skipped,
                }
            }
            Err(e) => {
                error!(application_id = %app.id, error = %e, "Failed to record rejection");
                VerificationOutcome::Deferred
            }
        }
    }

    /// Best effort: failures are logged, never propagated.
    async fn notify_approval(&self, user_id: &str, plan: PlanType, months: u32) {
        let Some(token) = self.store.get_user(user_id).and_then(|u| u.push_token) else {
            warn!(user_id = %user_id, "No push token for user, skipping approval notification");
            return;
        };
        let message = approval_message(token, plan, months);
        if let Err(e) = self.notifier.send(&message).await {
            warn!(user_id = %user_id, error = %e, "Approval notification failed");
        }
    }
}
