//! Verification trigger — a Tokio task that consumes the store's change feed
//! and starts one orchestrator run per qualifying change.

use std::sync::Arc;

use claim_store::ApplicationChange;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

use crate::orchestrator::{Orchestrator, VerificationOutcome};

pub struct VerificationTrigger {
    orchestrator: Arc<Orchestrator>,
}

impl VerificationTrigger {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Spawn the trigger as a Tokio task. It runs until the change feed closes.
    pub fn spawn(self, receiver: broadcast::Receiver<ApplicationChange>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Verification trigger started");
            self.consume(receiver).await;
            info!("Change feed closed, verification trigger stopped");
        })
    }

    async fn consume(&self, receiver: broadcast::Receiver<ApplicationChange>) {
        let mut changes = BroadcastStream::new(receiver);
        while let Some(item) = changes.next().await {
            match item {
                Ok(change) => {
                    self.dispatch(change);
                }
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    // Missed changes are picked up by the sweeper.
                    metrics::counter!("trigger.lagged_changes").increment(skipped);
                    warn!(skipped = skipped, "Verification trigger lagged behind change feed");
                }
            }
        }
    }

    /// Start a run for `change` if it enters `checking`. Each run is its own
    /// task, so a panic in one run is confined to its handle.
    pub fn dispatch(&self, change: ApplicationChange) -> Option<JoinHandle<VerificationOutcome>> {
        if !change.enters_checking() {
            debug!(
                application_id = %change.application_id,
                before = %change.before,
                after = %change.after,
                "Change does not start verification"
            );
            return None;
        }

        metrics::counter!("trigger.runs_started").increment(1);
        let orchestrator = self.orchestrator.clone();
        let application_id = change.application_id;
        let run = tokio::spawn(async move { orchestrator.run(application_id).await });

        Some(tokio::spawn(async move {
            match run.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(application_id = %application_id, error = %e, "Verification run panicked");
                    VerificationOutcome::Deferred
                }
            }
        }))
    }
}
