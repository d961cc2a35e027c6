//! In-memory application store guarded by a single lock.
//!
//! Every public operation is atomic with respect to every other. Status
//! writes are published on a broadcast change feed after the lock is released.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use claim_core::{
    ApplicationStateMachine, ApplicationStatus, CampaignApplication, SubscriptionBenefit,
    UserProfile, VerifyError, VerifyResult,
};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::change::{ApplicationChange, ChangeCause};
use crate::transaction::{RecordKey, Transaction};

const DEFAULT_FEED_CAPACITY: usize = 1024;
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Default)]
struct StoreState {
    applications: HashMap<Uuid, CampaignApplication>,
    subscriptions: HashMap<String, SubscriptionBenefit>,
    users: HashMap<String, UserProfile>,
    /// Unique code → owning application.
    codes: HashMap<String, Uuid>,
}

impl StoreState {
    fn claim_code(&mut self, application: &CampaignApplication) -> VerifyResult<()> {
        let code = application.unique_code.trim();
        match self.codes.get(code) {
            Some(owner) if *owner != application.id => Err(VerifyError::AlreadyExists(format!(
                "unique code {code} is already used by application {owner}"
            ))),
            _ => {
                self.codes.insert(code.to_string(), application.id);
                Ok(())
            }
        }
    }
}

/// Thread-safe in-memory store for applications, subscription benefits and
/// user push targets.
pub struct ApplicationStore {
    state: Mutex<StoreState>,
    changes: broadcast::Sender<ApplicationChange>,
    max_attempts: u32,
}

enum CommitError {
    Conflict,
    Rejected(VerifyError),
}

impl ApplicationStore {
    pub fn new() -> Self {
        Self::with_max_attempts(DEFAULT_MAX_ATTEMPTS)
    }

    /// Store whose transactions give up after `max_attempts` conflicting commits.
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        let (changes, _) = broadcast::channel(DEFAULT_FEED_CAPACITY);
        info!(max_attempts, "Application store initialized (in-memory)");
        Self {
            state: Mutex::new(StoreState::default()),
            changes,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Subscribe to the change feed. Only changes published after this call
    /// are delivered.
    pub fn subscribe(&self) -> broadcast::Receiver<ApplicationChange> {
        self.changes.subscribe()
    }

    fn publish(&self, changes: Vec<ApplicationChange>) {
        for change in changes {
            // No subscribers is fine: the sweeper picks up anything missed.
            let _ = self.changes.send(change);
        }
    }

    // ─── Applications ──────────────────────────────────────────────────────

    /// Insert a new application. The store assigns its version.
    pub fn insert_application(
        &self,
        mut application: CampaignApplication,
    ) -> VerifyResult<CampaignApplication> {
        let mut state = self.state.lock();
        if state.applications.contains_key(&application.id) {
            return Err(VerifyError::AlreadyExists(format!(
                "application {}",
                application.id
            )));
        }
        state.claim_code(&application)?;
        application.version = 1;
        state
            .applications
            .insert(application.id, application.clone());
        debug!(application_id = %application.id, status = %application.status, "Application inserted");
        Ok(application)
    }

    pub fn get_application(&self, id: &Uuid) -> Option<CampaignApplication> {
        self.read_application(id)
    }

    pub fn application_count(&self) -> usize {
        self.state.lock().applications.len()
    }

    pub fn list_applications(&self) -> Vec<CampaignApplication> {
        let mut apps: Vec<CampaignApplication> =
            self.state.lock().applications.values().cloned().collect();
        apps.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        apps
    }

    /// Move an application to `to`, enforcing the status state machine.
    pub fn update_status(&self, id: &Uuid, to: ApplicationStatus) -> VerifyResult<ApplicationChange> {
        let change = {
            let mut state = self.state.lock();
            let app = state
                .applications
                .get_mut(id)
                .ok_or_else(|| VerifyError::NotFound(format!("application {id}")))?;
            ApplicationStateMachine::check(app.status, to)?;
            let before = app.status;
            app.status = to;
            app.version += 1;
            ApplicationChange {
                application_id: *id,
                before,
                after: to,
                cause: ChangeCause::Write,
                version: app.version,
            }
        };
        self.publish(vec![change.clone()]);
        Ok(change)
    }

    /// Reject an application that is still `checking`. Returns `None` without
    /// writing if it has already left `checking`.
    pub fn reject(
        &self,
        id: &Uuid,
        reason: &str,
        at: DateTime<Utc>,
    ) -> VerifyResult<Option<ApplicationChange>> {
        let change = {
            let mut state = self.state.lock();
            let app = state
                .applications
                .get_mut(id)
                .ok_or_else(|| VerifyError::NotFound(format!("application {id}")))?;
            if app.status != ApplicationStatus::Checking {
                return Ok(None);
            }
            app.status = ApplicationStatus::Rejected;
            app.rejection_reason = Some(reason.to_string());
            app.verified_at = Some(at);
            app.version += 1;
            ApplicationChange {
                application_id: *id,
                before: ApplicationStatus::Checking,
                after: ApplicationStatus::Rejected,
                cause: ChangeCause::Write,
                version: app.version,
            }
        };
        self.publish(vec![change.clone()]);
        Ok(Some(change))
    }

    /// Re-drive a `checking` application through verification in one step.
    /// Status stays `checking`; a single `Requeue` change is published.
    /// Returns `None` if the application is no longer `checking`.
    pub fn requeue(&self, id: &Uuid, at: DateTime<Utc>) -> VerifyResult<Option<ApplicationChange>> {
        let change = {
            let mut state = self.state.lock();
            let app = state
                .applications
                .get_mut(id)
                .ok_or_else(|| VerifyError::NotFound(format!("application {id}")))?;
            if app.status != ApplicationStatus::Checking {
                return Ok(None);
            }
            app.requeue_count += 1;
            app.last_requeued_at = Some(at);
            app.version += 1;
            ApplicationChange {
                application_id: *id,
                before: ApplicationStatus::Checking,
                after: ApplicationStatus::Checking,
                cause: ChangeCause::Requeue,
                version: app.version,
            }
        };
        self.publish(vec![change.clone()]);
        Ok(Some(change))
    }

    /// Applications in `checking` whose reported post time is before `cutoff`,
    /// oldest first.
    pub fn find_stale_checking(&self, cutoff: DateTime<Utc>) -> Vec<CampaignApplication> {
        let state = self.state.lock();
        let mut stale: Vec<CampaignApplication> = state
            .applications
            .values()
            .filter(|a| a.status == ApplicationStatus::Checking && a.posted_at() < cutoff)
            .cloned()
            .collect();
        stale.sort_by_key(|a| a.posted_at());
        stale
    }

    // ─── Subscriptions & Users ─────────────────────────────────────────────

    pub fn get_subscription(&self, user_id: &str) -> Option<SubscriptionBenefit> {
        self.read_subscription(user_id)
    }

    pub fn get_user(&self, user_id: &str) -> Option<UserProfile> {
        self.state.lock().users.get(user_id).cloned()
    }

    pub fn upsert_user(&self, profile: UserProfile) {
        self.state
            .lock()
            .users
            .insert(profile.user_id.clone(), profile);
    }

    // ─── Transactions ──────────────────────────────────────────────────────

    /// Run `body` as an optimistic transaction. The body may be re-run if a
    /// record it read changed before commit; after `max_attempts` conflicting
    /// commits the transaction fails with `CommitConflict`. An error from the
    /// body aborts immediately without writing anything.
    pub fn transaction<T, F>(&self, mut body: F) -> VerifyResult<T>
    where
        F: FnMut(&mut Transaction<'_>) -> VerifyResult<T>,
    {
        for attempt in 1..=self.max_attempts {
            let mut tx = Transaction::new(self);
            let value = body(&mut tx)?;
            if tx.is_read_only() {
                return Ok(value);
            }
            match self.commit(tx) {
                Ok(changes) => {
                    self.publish(changes);
                    return Ok(value);
                }
                Err(CommitError::Conflict) => {
                    metrics::counter!("store.transaction_conflicts").increment(1);
                    debug!(attempt, "Transaction conflicted, retrying");
                }
                Err(CommitError::Rejected(e)) => return Err(e),
            }
        }
        warn!(attempts = self.max_attempts, "Transaction abandoned after repeated conflicts");
        Err(VerifyError::CommitConflict {
            attempts: self.max_attempts,
        })
    }

    fn commit(&self, tx: Transaction<'_>) -> Result<Vec<ApplicationChange>, CommitError> {
        let mut state = self.state.lock();

        for (key, seen) in &tx.reads {
            let current = match key {
                RecordKey::Application(id) => state.applications.get(id).map_or(0, |a| a.version),
                RecordKey::Subscription(user) => {
                    state.subscriptions.get(user).map_or(0, |s| s.version)
                }
            };
            if current != *seen {
                return Err(CommitError::Conflict);
            }
        }

        // Validate every status change and code before applying anything.
        for app in tx.applications.values() {
            match state.applications.get(&app.id) {
                Some(existing) => {
                    if existing.unique_code != app.unique_code {
                        return Err(CommitError::Rejected(VerifyError::Store(format!(
                            "unique code of application {} cannot change",
                            app.id
                        ))));
                    }
                    if existing.status != app.status {
                        ApplicationStateMachine::check(existing.status, app.status)
                            .map_err(CommitError::Rejected)?;
                    }
                }
                None => {
                    if let Some(owner) = state.codes.get(app.unique_code.trim()) {
                        if *owner != app.id {
                            return Err(CommitError::Rejected(VerifyError::AlreadyExists(
                                format!("unique code {} is already used", app.unique_code.trim()),
                            )));
                        }
                    }
                }
            }
        }

        let mut changes = Vec::new();
        for (id, mut app) in tx.applications {
            let previous = state.applications.get(&id);
            let before = previous.map(|p| p.status);
            app.version = previous.map_or(1, |p| p.version + 1);
            if let Some(before) = before.filter(|b| *b != app.status) {
                changes.push(ApplicationChange {
                    application_id: id,
                    before,
                    after: app.status,
                    cause: ChangeCause::Write,
                    version: app.version,
                });
            }
            state.codes.insert(app.unique_code.trim().to_string(), id);
            state.applications.insert(id, app);
        }
        for (user, mut sub) in tx.subscriptions {
            sub.version = state.subscriptions.get(&user).map_or(1, |s| s.version + 1);
            state.subscriptions.insert(user, sub);
        }

        Ok(changes)
    }

    pub(crate) fn read_application(&self, id: &Uuid) -> Option<CampaignApplication> {
        self.state.lock().applications.get(id).cloned()
    }

    pub(crate) fn read_subscription(&self, user_id: &str) -> Option<SubscriptionBenefit> {
        self.state.lock().subscriptions.get(user_id).cloned()
    }
}

impl Default for ApplicationStore {
    fn default() -> Self {
        Self::new()
    }
}
