//! Two-phase content gate.
//!
//! The deterministic phase always runs first; the semantic phase is only
//! consulted when it passes. A classifier that cannot answer is handled by
//! the configured [`ClassifierFailurePolicy`].

use std::sync::Arc;

use claim_core::config::{CampaignConfig, ClassifierFailurePolicy};
use claim_core::{PlanType, VerifyResult};
use serde::Serialize;
use tracing::{info, warn};

use crate::classifier::{QualityClassifier, QualityRequest, Verdict};
use crate::rules::{RuleCheck, RuleSet};

/// How the semantic phase ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SemanticOutcome {
    /// Not reached because the deterministic phase failed.
    Skipped,
    Passed,
    Failed,
    /// Classifier unavailable; passed under the fail-open policy.
    PassedOnFailure { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub rules: RuleCheck,
    pub semantic: SemanticOutcome,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.rules.passed()
            && matches!(
                self.semantic,
                SemanticOutcome::Passed | SemanticOutcome::PassedOnFailure { .. }
            )
    }
}

pub struct ContentValidator {
    rules: RuleSet,
    classifier: Arc<dyn QualityClassifier>,
    failure_policy: ClassifierFailurePolicy,
    topic: String,
    min_description_chars: usize,
}

impl ContentValidator {
    pub fn new(
        campaign: &CampaignConfig,
        classifier: Arc<dyn QualityClassifier>,
        failure_policy: ClassifierFailurePolicy,
    ) -> Self {
        info!(
            hashtags = ?campaign.required_hashtags,
            policy = ?failure_policy,
            "Content validator initialized"
        );
        Self {
            rules: RuleSet::new(campaign.required_hashtags.clone()),
            classifier,
            failure_policy,
            topic: campaign.topic.clone(),
            min_description_chars: campaign.min_description_chars,
        }
    }

    pub fn failure_policy(&self) -> ClassifierFailurePolicy {
        self.failure_policy
    }

    /// Validate a post for an application. Returns an error only when the
    /// classifier fails under [`ClassifierFailurePolicy::FailClosed`].
    pub async fn validate(
        &self,
        post_text: &str,
        unique_code: &str,
        plan: PlanType,
    ) -> VerifyResult<ValidationReport> {
        let rules = self.rules.check(post_text, unique_code);
        if !rules.passed() {
            info!(
                plan = %plan,
                has_unique_code = rules.has_unique_code,
                missing_hashtags = ?rules.missing_hashtags,
                "Post failed required-element check"
            );
            return Ok(ValidationReport {
                rules,
                semantic: SemanticOutcome::Skipped,
            });
        }

        let request = QualityRequest {
            post_text: post_text.to_string(),
            topic: self.topic.clone(),
            min_description_chars: self.min_description_chars,
        };

        let semantic = match self.classifier.classify(&request).await {
            Ok(Verdict::Pass) => SemanticOutcome::Passed,
            Ok(Verdict::Fail) => SemanticOutcome::Failed,
            Err(e) => {
                metrics::counter!("content.classifier_failures").increment(1);
                match self.failure_policy {
                    ClassifierFailurePolicy::FailOpen => {
                        warn!(error = %e, "Classifier unavailable, passing on deterministic checks alone");
                        SemanticOutcome::PassedOnFailure {
                            error: e.to_string(),
                        }
                    }
                    ClassifierFailurePolicy::FailClosed => {
                        warn!(error = %e, "Classifier unavailable, failing closed");
                        return Err(e);
                    }
                }
            }
        };

        info!(plan = %plan, semantic = ?semantic, "Semantic check complete");
        Ok(ValidationReport { rules, semantic })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use claim_core::VerifyError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CODE: &str = "#GM2025A3B7C9";

    struct FixedClassifier {
        answer: Option<Verdict>,
        calls: AtomicUsize,
    }

    impl FixedClassifier {
        fn new(answer: Option<Verdict>) -> Arc<Self> {
            Arc::new(Self {
                answer,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl QualityClassifier for FixedClassifier {
        async fn classify(&self, _request: &QualityRequest) -> VerifyResult<Verdict> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer
                .ok_or_else(|| VerifyError::Classifier("503 Service Unavailable".into()))
        }
    }

    fn campaign() -> CampaignConfig {
        CampaignConfig {
            required_hashtags: vec!["#SwitchDeal".into(), "#AIWorkout".into()],
            ..Default::default()
        }
    }

    fn good_post() -> String {
        format!("Moved my lifting log over, the form tips are spot on {CODE} #SwitchDeal #AIWorkout")
    }

    #[tokio::test]
    async fn test_pass_when_both_phases_pass() {
        let classifier = FixedClassifier::new(Some(Verdict::Pass));
        let validator =
            ContentValidator::new(&campaign(), classifier.clone(), ClassifierFailurePolicy::FailOpen);
        let report = validator.validate(&good_post(), CODE, PlanType::Premium).await.unwrap();
        assert!(report.passed());
        assert_eq!(report.semantic, SemanticOutcome::Passed);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_semantic_fail_rejects() {
        let validator = ContentValidator::new(
            &campaign(),
            FixedClassifier::new(Some(Verdict::Fail)),
            ClassifierFailurePolicy::FailOpen,
        );
        let report = validator.validate(&good_post(), CODE, PlanType::Standard).await.unwrap();
        assert!(!report.passed());
    }

    #[tokio::test]
    async fn test_deterministic_failure_skips_classifier() {
        let classifier = FixedClassifier::new(Some(Verdict::Pass));
        let validator =
            ContentValidator::new(&campaign(), classifier.clone(), ClassifierFailurePolicy::FailOpen);
        let post = format!("love it {CODE} #SwitchDeal");
        let report = validator.validate(&post, CODE, PlanType::Premium).await.unwrap();
        assert!(!report.passed());
        assert_eq!(report.semantic, SemanticOutcome::Skipped);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fail_open_on_classifier_outage() {
        let validator = ContentValidator::new(
            &campaign(),
            FixedClassifier::new(None),
            ClassifierFailurePolicy::FailOpen,
        );
        let report = validator.validate(&good_post(), CODE, PlanType::Premium).await.unwrap();
        assert!(report.passed());
        assert!(matches!(report.semantic, SemanticOutcome::PassedOnFailure { .. }));
    }

    #[tokio::test]
    async fn test_fail_open_does_not_rescue_rule_failure() {
        let validator = ContentValidator::new(
            &campaign(),
            FixedClassifier::new(None),
            ClassifierFailurePolicy::FailOpen,
        );
        let report = validator
            .validate("#SwitchDeal #AIWorkout no code here", CODE, PlanType::Premium)
            .await
            .unwrap();
        assert!(!report.passed());
    }

    #[tokio::test]
    async fn test_fail_closed_propagates_outage() {
        let validator = ContentValidator::new(
            &campaign(),
            FixedClassifier::new(None),
            ClassifierFailurePolicy::FailClosed,
        );
        let err = validator
            .validate(&good_post(), CODE, PlanType::Premium)
            .await
            .unwrap_err();
        assert!(matches!(err, VerifyError::Classifier(_)));
    }
}
