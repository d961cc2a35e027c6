use claim_core::ApplicationStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a status change was published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeCause {
    /// An ordinary status write.
    Write,
    /// An explicit re-queue of a `checking` application; status is unchanged.
    Requeue,
}

/// One entry of the store's change feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationChange {
    pub application_id: Uuid,
    pub before: ApplicationStatus,
    pub after: ApplicationStatus,
    pub cause: ChangeCause,
    /// Record version after the write.
    pub version: u64,
}

impl ApplicationChange {
    /// True when this change should start a verification run: the record
    /// entered `checking` from another status, or was explicitly re-queued.
    /// A write that leaves an already-`checking` record in `checking` does not
    /// qualify, so the pipeline's own writes never re-trigger it.
    pub fn enters_checking(&self) -> bool {
        if self.after != ApplicationStatus::Checking {
            return false;
        }
        self.before != ApplicationStatus::Checking || self.cause == ChangeCause::Requeue
    }
}
