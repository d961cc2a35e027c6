//! Verification event bus — trait for emitting audit events from the
//! pipeline stages.
//!
//! Components accept an `Arc<dyn EventSink>` so the hosting process can route
//! events to an audit log or analytics pipeline without the pipeline knowing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationEventType {
    Started,
    PostFound,
    PostNotFound,
    ContentRejected,
    Approved,
    Rejected,
    Deferred,
    Requeued,
}

/// One step of one application's verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationEvent {
    pub event_id: Uuid,
    pub event_type: VerificationEventType,
    pub application_id: Uuid,
    pub user_id: Option<String>,
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Trait for emitting verification events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: VerificationEvent);
}

/// No-op sink for modules that don't need event emission.
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn emit(&self, _event: VerificationEvent) {}
}

/// Forwards every event to `tracing` at debug level.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: VerificationEvent) {
        tracing::debug!(
            event_type = ?event.event_type,
            application_id = %event.application_id,
            user_id = ?event.user_id,
            detail = ?event.detail,
            "Verification event"
        );
    }
}

/// In-memory sink that captures events for testing.
#[derive(Default)]
pub struct CaptureSink {
    events: Mutex<Vec<VerificationEvent>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<VerificationEvent> {
        self.events.lock().expect("event bus mutex poisoned").clone()
    }

    pub fn count_type(&self, event_type: VerificationEventType) -> usize {
        self.events
            .lock()
            .expect("event bus mutex poisoned")
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

impl EventSink for CaptureSink {
    fn emit(&self, event: VerificationEvent) {
        self.events.lock().expect("event bus mutex poisoned").push(event);
    }
}

/// Convenience builder for creating a `VerificationEvent` with minimal boilerplate.
pub fn make_event(
    event_type: VerificationEventType,
    application_id: Uuid,
    user_id: Option<&str>,
    detail: Option<String>,
) -> VerificationEvent {
    VerificationEvent {
        event_id: Uuid::new_v4(),
        event_type,
        application_id,
        user_id: user_id.map(str::to_string),
        detail,
        timestamp: Utc::now(),
    }
}

/// Convenience: create a no-op event bus for modules that don't need it.
pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoOpSink)
}

/// Convenience: create a capture sink for tests.
pub fn capture_sink() -> Arc<CaptureSink> {
    Arc::new(CaptureSink::new())
}
