//! Benefit ledger: the atomic approve-and-credit step of verification.

pub mod engine;

pub use engine::{BenefitGranter, BenefitLedger, GrantOutcome};
