//! Shared domain model for campaign-claim verification: application and
//! benefit records, the status state machine, configuration, the error
//! taxonomy, and the verification event bus.

pub mod benefit;
pub mod config;
pub mod error;
pub mod event_bus;
pub mod state_machine;
pub mod types;

pub use benefit::{PlanType, SubscriptionBenefit};
pub use config::AppConfig;
pub use error::{VerifyError, VerifyResult};
pub use state_machine::ApplicationStateMachine;
pub use types::{
    ApplicationStatus, CampaignApplication, RejectionReason, SocialPost, UserProfile,
};
