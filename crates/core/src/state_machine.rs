use serde::Serialize;

use crate::error::{VerifyError, VerifyResult};
use crate::types::ApplicationStatus;

/// Describes a single valid status transition for a campaign application.
#[derive(Debug, Clone, Serialize)]
pub struct StatusTransition {
    pub from: ApplicationStatus,
    pub to: ApplicationStatus,
    pub trigger: &'static str,
}

const TRANSITIONS: &[StatusTransition] = &[
    StatusTransition {
        from: ApplicationStatus::Pending,
        to: ApplicationStatus::Checking,
        trigger: "submit",
    },
    StatusTransition {
        from: ApplicationStatus::Checking,
        to: ApplicationStatus::Approved,
        trigger: "benefit_granted",
    },
    StatusTransition {
        from: ApplicationStatus::Checking,
        to: ApplicationStatus::Rejected,
        trigger: "verification_failed",
    },
    StatusTransition {
        from: ApplicationStatus::Checking,
        to: ApplicationStatus::Pending,
        trigger: "reset",
    },
];

/// Guards the application lifecycle: pending → checking → {approved, rejected},
/// with checking → pending as the only backwards edge. Terminal states have
/// no outgoing transitions.
pub struct ApplicationStateMachine;

impl ApplicationStateMachine {
    pub fn transitions() -> &'static [StatusTransition] {
        TRANSITIONS
    }

    /// Returns `true` if the given transition is allowed.
    pub fn can_transition(from: ApplicationStatus, to: ApplicationStatus) -> bool {
        TRANSITIONS.iter().any(|t| t.from == from && t.to == to)
    }

    /// Returns the trigger name for an allowed transition, or an error.
    pub fn check(from: ApplicationStatus, to: ApplicationStatus) -> VerifyResult<&'static str> {
        TRANSITIONS
            .iter()
            .find(|t| t.from == from && t.to == to)
            .map(|t| t.trigger)
            .ok_or(VerifyError::InvalidTransition { from, to })
    }
}
