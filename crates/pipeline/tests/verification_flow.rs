//! End-to-end verification flows over the in-memory store, with the social
//! search and classifier services faked.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use claim_channels::LogNotifier;
use claim_content::{ContentValidator, QualityClassifier, QualityRequest, Verdict};
use claim_core::config::{CampaignConfig, ClassifierFailurePolicy, SweeperConfig};
use claim_core::{
    ApplicationStatus, CampaignApplication, PlanType, SocialPost, VerifyError, VerifyResult,
};
use claim_ledger::BenefitLedger;
use claim_pipeline::{Orchestrator, RetrySweeper, VerificationOutcome, VerificationTrigger};
use claim_social::{PostLocator, SocialSearch};
use claim_store::{ApplicationChange, ApplicationStore, ChangeCause};
use uuid::Uuid;

const CODE: &str = "#GM2025A3B7C9";

/// Search index keyed by exact query.
#[derive(Default)]
struct FakeSearch {
    posts: HashMap<String, Vec<SocialPost>>,
    calls: AtomicUsize,
}

impl FakeSearch {
    fn with_post(code: &str, text: &str) -> Self {
        let mut posts = HashMap::new();
        posts.insert(
            code.to_string(),
            vec![SocialPost {
                id: Some("1790000000000000000".into()),
                text: text.to_string(),
                created_at: Utc::now(),
            }],
        );
        Self {
            posts,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SocialSearch for FakeSearch {
    async fn search_recent(&self, query: &str, _max_results: u32) -> VerifyResult<Vec<SocialPost>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.posts.get(query).cloned().unwrap_or_default())
    }
}

enum ClassifierMode {
    Answer(Verdict),
    Down,
}

struct FakeClassifier(ClassifierMode);

#[async_trait]
impl QualityClassifier for FakeClassifier {
    async fn classify(&self, _request: &QualityRequest) -> VerifyResult<Verdict> {
        match self.0 {
            ClassifierMode::Answer(v) => Ok(v),
            ClassifierMode::Down => Err(VerifyError::Classifier("connection timed out".into())),
        }
    }
}

fn campaign() -> CampaignConfig {
    CampaignConfig {
        required_hashtags: vec!["#SwitchDeal".into(), "#AIWorkout".into()],
        ..Default::default()
    }
}

fn complete_post() -> String {
    format!("Three weeks in and the AI coach fixed my squat form {CODE} #SwitchDeal #AIWorkout")
}

struct Pipeline {
    store: Arc<ApplicationStore>,
    orchestrator: Arc<Orchestrator>,
    search: Arc<FakeSearch>,
}

fn pipeline(search: FakeSearch, classifier: ClassifierMode) -> Pipeline {
    let store = Arc::new(ApplicationStore::new());
    let search = Arc::new(search);
    let locator = Arc::new(PostLocator::new(search.clone(), 10));
    let validator = Arc::new(ContentValidator::new(
        &campaign(),
        Arc::new(FakeClassifier(classifier)),
        ClassifierFailurePolicy::FailOpen,
    ));
    let ledger = Arc::new(BenefitLedger::new(store.clone(), &campaign()));
    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        locator,
        validator,
        ledger,
        Arc::new(LogNotifier),
    ));
    Pipeline {
        store,
        orchestrator,
        search,
    }
}

fn insert(store: &ApplicationStore, plan: PlanType, posted_mins_ago: i64) -> Uuid {
    let posted = Utc::now() - chrono::Duration::minutes(posted_mins_ago);
    store
        .insert_application(CampaignApplication::new("user-1", CODE, plan, Some(posted)))
        .unwrap()
        .id
}

async fn wait_for_terminal(store: &ApplicationStore, id: Uuid) -> CampaignApplication {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(app) = store.get_application(&id) {
                if app.status.is_terminal() {
                    return app;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("application did not reach a terminal status")
}

fn months(store: &ApplicationStore) -> u32 {
    store
        .get_subscription("user-1")
        .map(|s| s.free_months_remaining)
        .unwrap_or(0)
}

#[tokio::test]
async fn premium_application_is_approved_through_change_feed() {
    let p = pipeline(
        FakeSearch::with_post(CODE, &complete_post()),
        ClassifierMode::Answer(Verdict::Pass),
    );
    let trigger = VerificationTrigger::new(p.orchestrator.clone()).spawn(p.store.subscribe());

    let id = insert(&p.store, PlanType::Premium, 0);
    p.store.update_status(&id, ApplicationStatus::Checking).unwrap();

    let app = wait_for_terminal(&p.store, id).await;
    assert_eq!(app.status, ApplicationStatus::Approved);
    assert!(app.benefit_applied_at.is_some());
    assert_eq!(months(&p.store), 1);
    trigger.abort();
}

#[tokio::test]
async fn standard_application_gets_two_months() {
    let p = pipeline(
        FakeSearch::with_post(CODE, &complete_post()),
        ClassifierMode::Answer(Verdict::Pass),
    );
    let trigger = VerificationTrigger::new(p.orchestrator.clone()).spawn(p.store.subscribe());

    let id = insert(&p.store, PlanType::Standard, 0);
    p.store.update_status(&id, ApplicationStatus::Checking).unwrap();

    assert_eq!(
        wait_for_terminal(&p.store, id).await.status,
        ApplicationStatus::Approved
    );
    assert_eq!(months(&p.store), 2);
    trigger.abort();
}

#[tokio::test]
async fn missing_hashtag_is_rejected() {
    let p = pipeline(
        FakeSearch::with_post(CODE, &format!("Loving the new app {CODE} #SwitchDeal")),
        ClassifierMode::Answer(Verdict::Pass),
    );
    let trigger = VerificationTrigger::new(p.orchestrator.clone()).spawn(p.store.subscribe());

    let id = insert(&p.store, PlanType::Premium, 0);
    p.store.update_status(&id, ApplicationStatus::Checking).unwrap();

    let app = wait_for_terminal(&p.store, id).await;
    assert_eq!(app.status, ApplicationStatus::Rejected);
    assert_eq!(
        app.rejection_reason.as_deref(),
        Some("content requirements not met")
    );
    assert_eq!(months(&p.store), 0);
    trigger.abort();
}

#[tokio::test]
async fn lost_run_is_swept_and_rejected_when_post_never_appears() {
    let p = pipeline(FakeSearch::default(), ClassifierMode::Answer(Verdict::Pass));

    // Enters checking before the trigger subscribes: the first run is lost.
    let id = insert(&p.store, PlanType::Premium, 10);
    p.store.update_status(&id, ApplicationStatus::Checking).unwrap();
    let trigger = VerificationTrigger::new(p.orchestrator.clone()).spawn(p.store.subscribe());

    let sweeper = RetrySweeper::new(
        p.store.clone(),
        &SweeperConfig {
            enabled: true,
            interval_secs: 300,
            stale_after_secs: 300,
        },
    );
    let report = sweeper.sweep_once(Utc::now());
    assert_eq!(report.requeued, 1);

    let app = wait_for_terminal(&p.store, id).await;
    assert_eq!(app.status, ApplicationStatus::Rejected);
    assert_eq!(app.rejection_reason.as_deref(), Some("post not found"));
    assert_eq!(app.requeue_count, 1);
    assert_eq!(p.search.calls.load(Ordering::SeqCst), 1);
    assert_eq!(months(&p.store), 0);
    trigger.abort();
}

#[tokio::test]
async fn classifier_outage_fails_open() {
    let p = pipeline(
        FakeSearch::with_post(CODE, &complete_post()),
        ClassifierMode::Down,
    );
    let id = insert(&p.store, PlanType::Premium, 0);
    p.store.update_status(&id, ApplicationStatus::Checking).unwrap();

    assert_eq!(
        p.orchestrator.run(id).await,
        VerificationOutcome::Approved { benefit_months: 1 }
    );
    assert_eq!(months(&p.store), 1);
}

#[tokio::test]
async fn reinvoking_approved_application_changes_nothing() {
    let p = pipeline(
        FakeSearch::with_post(CODE, &complete_post()),
        ClassifierMode::Answer(Verdict::Pass),
    );
    let id = insert(&p.store, PlanType::Standard, 0);
    p.store.update_status(&id, ApplicationStatus::Checking).unwrap();

    assert!(matches!(
        p.orchestrator.run(id).await,
        VerificationOutcome::Approved { .. }
    ));
    let approved = p.store.get_application(&id).unwrap();

    for _ in 0..3 {
        assert_eq!(
            p.orchestrator.run(id).await,
            VerificationOutcome::AlreadyFinalized {
                status: ApplicationStatus::Approved
            }
        );
    }
    assert_eq!(p.store.get_application(&id).unwrap(), approved);
    assert_eq!(months(&p.store), 2);
}

#[tokio::test]
async fn concurrent_runs_grant_exactly_once() {
    let p = pipeline(
        FakeSearch::with_post(CODE, &complete_post()),
        ClassifierMode::Answer(Verdict::Pass),
    );
    let id = insert(&p.store, PlanType::Standard, 0);
    p.store.update_status(&id, ApplicationStatus::Checking).unwrap();

    let mut handles = Vec::new();
    for _ in 0..6 {
        let orchestrator = p.orchestrator.clone();
        handles.push(tokio::spawn(async move { orchestrator.run(id).await }));
    }
    let mut approved = 0;
    for handle in handles {
        if let VerificationOutcome::Approved { .. } = handle.await.unwrap() {
            approved += 1;
        }
    }

    assert_eq!(approved, 1);
    assert_eq!(months(&p.store), 2);
}

#[tokio::test]
async fn trigger_guard_only_fires_on_entry_to_checking() {
    let p = pipeline(FakeSearch::default(), ClassifierMode::Answer(Verdict::Pass));
    let trigger = VerificationTrigger::new(p.orchestrator.clone());
    let change = |before, after, cause| ApplicationChange {
        application_id: Uuid::new_v4(),
        before,
        after,
        cause,
        version: 2,
    };

    use ApplicationStatus::*;
    assert!(trigger
        .dispatch(change(Pending, Checking, ChangeCause::Write))
        .is_some());
    assert!(trigger
        .dispatch(change(Checking, Checking, ChangeCause::Requeue))
        .is_some());
    assert!(trigger
        .dispatch(change(Checking, Checking, ChangeCause::Write))
        .is_none());
    assert!(trigger
        .dispatch(change(Checking, Approved, ChangeCause::Write))
        .is_none());
    assert!(trigger
        .dispatch(change(Checking, Pending, ChangeCause::Write))
        .is_none());
}

#[tokio::test]
async fn dispatched_run_reports_outcome() {
    let p = pipeline(FakeSearch::default(), ClassifierMode::Answer(Verdict::Pass));
    let id = insert(&p.store, PlanType::Premium, 0);
    let change = p.store.update_status(&id, ApplicationStatus::Checking).unwrap();

    let handle = VerificationTrigger::new(p.orchestrator.clone())
        .dispatch(change)
        .unwrap();
    assert_eq!(
        handle.await.unwrap(),
        VerificationOutcome::Rejected {
            reason: claim_core::RejectionReason::PostNotFound
        }
    );
}
