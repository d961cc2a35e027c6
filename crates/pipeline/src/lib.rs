//! Verification pipeline: drives each campaign application from `checking`
//! to a terminal outcome, and recovers applications that got stuck.
//!
//! ```text
//!   store change feed ──▶ VerificationTrigger ──▶ Orchestrator
//!                                                   │ locate (claim-social)
//!                                                   │ validate (claim-content)
//!                                                   │ grant (claim-ledger)
//!                                                   ▼ notify (claim-channels)
//!   RetrySweeper ── requeue stale `checking` ──▶ store change feed
//! ```

pub mod orchestrator;
pub mod sweeper;
pub mod trigger;

pub use orchestrator::{Orchestrator, VerificationOutcome};
pub use sweeper::{RetrySweeper, SweepReport};
pub use trigger::VerificationTrigger;
