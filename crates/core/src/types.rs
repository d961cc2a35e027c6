use crate::benefit::PlanType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ─── Application Status ─────────────────────────────────────────────────────

/// Lifecycle status of a campaign application.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    /// Created by the user, post not yet submitted for checking.
    Pending,
    /// Waiting for (or undergoing) automatic verification.
    Checking,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ApplicationStatus::Approved | ApplicationStatus::Rejected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Checking => "checking",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Campaign Application ───────────────────────────────────────────────────

/// A user's claim that they posted the campaign message on social media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignApplication {
    pub id: Uuid,
    pub user_id: String,
    /// Opaque token the user must include verbatim in the post.
    pub unique_code: String,
    pub plan_type: PlanType,
    pub status: ApplicationStatus,
    /// Present iff `status == Rejected`.
    pub rejection_reason: Option<String>,
    pub submitted_at: DateTime<Utc>,
    /// When the user reports having published the post.
    pub sns_posted_at: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
    pub benefit_applied_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub requeue_count: u32,
    pub last_requeued_at: Option<DateTime<Utc>>,
    /// Store-managed record version, bumped on every write.
    #[serde(default)]
    pub version: u64,
}

impl CampaignApplication {
    /// A fresh application in `pending`.
    pub fn new(
        user_id: impl Into<String>,
        unique_code: impl Into<String>,
        plan_type: PlanType,
        sns_posted_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            unique_code: unique_code.into(),
            plan_type,
            status: ApplicationStatus::Pending,
            rejection_reason: None,
            submitted_at: Utc::now(),
            sns_posted_at,
            verified_at: None,
            benefit_applied_at: None,
            requeue_count: 0,
            last_requeued_at: None,
            version: 0,
        }
    }

    /// Reference time for sweep age: the reported post time, else submission.
    pub fn posted_at(&self) -> DateTime<Utc> {
        self.sns_posted_at.unwrap_or(self.submitted_at)
    }
}

// ─── Social Post ────────────────────────────────────────────────────────────

/// A post returned by the social search service. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialPost {
    pub id: Option<String>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

// ─── User Profile ───────────────────────────────────────────────────────────

/// The slice of a user account the pipeline needs: where to push notifications.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub push_token: Option<String>,
}

// ─── Rejection Reasons ──────────────────────────────────────────────────────

/// User-facing reason recorded on a rejected application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    PostNotFound,
    ContentRequirementsNotMet,
    SystemError,
}

impl RejectionReason {
    pub fn message(&self) -> &'static str {
        match self {
            RejectionReason::PostNotFound => "post not found",
            RejectionReason::ContentRequirementsNotMet => "content requirements not met",
            RejectionReason::SystemError => "system error",
        }
    }

    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            RejectionReason::PostNotFound => "post_not_found",
            RejectionReason::ContentRequirementsNotMet => "content_invalid",
            RejectionReason::SystemError => "system_error",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
