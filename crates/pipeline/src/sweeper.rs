//! Retry sweeper — periodically re-drives applications stuck in `checking`.
//!
//! A run can be lost (trigger lag, process restart, deferred commit). The
//! sweeper finds `checking` applications whose reported post time is older
//! than the stale threshold and requeues them, which republishes a change
//! the trigger acts on.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use claim_core::config::SweeperConfig;
use claim_core::event_bus::{make_event, EventSink, VerificationEventType};
use claim_store::ApplicationStore;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Result of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Stale `checking` applications found.
    pub scanned: usize,
    pub requeued: usize,
    /// Requeued recently enough that a run may still be in flight.
    pub skipped: usize,
    pub failed: usize,
}

pub struct RetrySweeper {
    store: Arc<ApplicationStore>,
    interval: Duration,
    stale_after: chrono::Duration,
    event_sink: Arc<dyn EventSink>,
}

impl RetrySweeper {
    pub fn new(store: Arc<ApplicationStore>, config: &SweeperConfig) -> Self {
        Self {
            store,
            interval: Duration::from_secs(config.interval_secs.max(1)),
            stale_after: stale_threshold(config.stale_after_secs),
            event_sink: claim_core::event_bus::noop_sink(),
        }
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    pub fn sweep_once(&self, now: DateTime<Utc>) -> SweepReport {
        // A threshold reaching past the earliest representable time matches nothing.
        let Some(cutoff) = now.checked_sub_signed(self.stale_after) else {
            return SweepReport::default();
        };
        let stale = self.store.find_stale_checking(cutoff);
        let mut report = SweepReport {
            scanned: stale.len(),
            ..Default::default()
        };

        for app in stale {
            if app.last_requeued_at.is_some_and(|at| at > cutoff) {
                report.skipped += 1;
                continue;
            }
            match self.store.requeue(&app.id, now) {
                Ok(Some(_)) => {
                    report.requeued += 1;
                    debug!(application_id = %app.id, requeue_count = app.requeue_count + 1, "Requeued stale application");
                    self.event_sink.emit(make_event(
                        VerificationEventType::Requeued,
                        app.id,
                        Some(&app.user_id),
                        None,
                    ));
                }
                // Finalized between the scan and the requeue.
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(application_id = %app.id, error = %e, "Failed to requeue application");
                }
            }
        }

        metrics::counter!("sweeper.requeued").increment(report.requeued as u64);
        if report.scanned > 0 {
            info!(
                scanned = report.scanned,
                requeued = report.requeued,
                skipped = report.skipped,
                failed = report.failed,
                "Sweep complete"
            );
        }
        report
    }

    /// Spawn the periodic sweep as a Tokio task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                interval_secs = self.interval.as_secs(),
                stale_after_secs = self.stale_after.num_seconds(),
                "Retry sweeper started"
            );
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.sweep_once(Utc::now());
            }
        })
    }
}

/// Saturates instead of wrapping for thresholds beyond the `Duration` range.
fn stale_threshold(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use claim_core::event_bus::capture_sink;
    use claim_core::{ApplicationStatus, CampaignApplication, PlanType};
    use claim_store::ChangeCause;

    fn config() -> SweeperConfig {
        SweeperConfig {
            enabled: true,
            interval_secs: 60,
            stale_after_secs: 300,
        }
    }

    fn checking(store: &ApplicationStore, posted_mins_ago: i64) -> uuid::Uuid {
        let posted = Utc::now() - chrono::Duration::minutes(posted_mins_ago);
        let app = store
            .insert_application(CampaignApplication::new(
                "user-1",
                format!("#GM2025{posted_mins_ago:06}"),
                PlanType::Premium,
                Some(posted),
            ))
            .unwrap();
        store
            .update_status(&app.id, ApplicationStatus::Checking)
            .unwrap();
        app.id
    }

    #[test]
    fn test_requeues_only_stale_checking() {
        let store = Arc::new(ApplicationStore::new());
        let stale = checking(&store, 10);
        let fresh = checking(&store, 1);
        let sink = capture_sink();
        let sweeper = RetrySweeper::new(store.clone(), &config()).with_event_sink(sink.clone());

        let mut feed = store.subscribe();
        let report = sweeper.sweep_once(Utc::now());

        assert_eq!(report.scanned, 1);
        assert_eq!(report.requeued, 1);
        let change = feed.try_recv().unwrap();
        assert_eq!(change.application_id, stale);
        assert_eq!(change.cause, ChangeCause::Requeue);
        assert!(change.enters_checking());
        assert!(feed.try_recv().is_err());

        assert_eq!(store.get_application(&stale).unwrap().requeue_count, 1);
        assert_eq!(store.get_application(&fresh).unwrap().requeue_count, 0);
        assert_eq!(sink.count_type(VerificationEventType::Requeued), 1);
    }

    #[test]
    fn test_terminal_applications_are_ignored() {
        let store = Arc::new(ApplicationStore::new());
        let id = checking(&store, 10);
        store.reject(&id, "post not found", Utc::now()).unwrap();

        let report = RetrySweeper::new(store, &config()).sweep_once(Utc::now());
        assert_eq!(report, SweepReport::default());
    }

    #[test]
    fn test_recent_requeue_is_not_repeated() {
        let store = Arc::new(ApplicationStore::new());
        checking(&store, 10);
        let sweeper = RetrySweeper::new(store, &config());

        let now = Utc::now();
        assert_eq!(sweeper.sweep_once(now).requeued, 1);
        let second = sweeper.sweep_once(now + chrono::Duration::seconds(30));
        assert_eq!(second.requeued, 0);
        assert_eq!(second.skipped, 1);

        let later = sweeper.sweep_once(now + chrono::Duration::minutes(6));
        assert_eq!(later.requeued, 1);
    }

    #[test]
    fn test_huge_threshold_saturates() {
        assert_eq!(stale_threshold(300), chrono::Duration::seconds(300));
        assert_eq!(stale_threshold(u64::MAX), chrono::Duration::MAX);
        assert!(stale_threshold(i64::MAX as u64) > chrono::Duration::zero());

        let store = Arc::new(ApplicationStore::new());
        checking(&store, 60 * 24 * 365);
        let sweeper = RetrySweeper::new(
            store,
            &SweeperConfig {
                stale_after_secs: u64::MAX,
                ..config()
            },
        );
        assert_eq!(sweeper.sweep_once(Utc::now()), SweepReport::default());
    }
}
