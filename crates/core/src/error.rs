use crate::types::ApplicationStatus;
use thiserror::Error;

pub type VerifyResult<T> = Result<T, VerifyError>;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },

    #[error("Transaction aborted after {attempts} conflicting attempts")]
    CommitConflict { attempts: u32 },

    #[error("Social search error: {0}")]
    SocialSearch(String),

    #[error("Content classifier error: {0}")]
    Classifier(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl VerifyError {
    /// Commit conflicts leave the application in `checking`.
    pub fn is_commit_conflict(&self) -> bool {
        matches!(self, VerifyError::CommitConflict { .. })
    }
}
