//! Application state store: campaign applications, subscription benefits and
//! user push targets, with optimistic multi-record transactions and a change
//! feed of status writes.

pub mod change;
pub mod memory;
pub mod transaction;

pub use change::{ApplicationChange, ChangeCause};
pub use memory::ApplicationStore;
pub use transaction::Transaction;
