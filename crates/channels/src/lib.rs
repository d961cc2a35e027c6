//! Notification dispatch for verification results.

pub mod push;

pub use push::{approval_message, FcmNotifier, LogNotifier, Notifier, PushMessage};
