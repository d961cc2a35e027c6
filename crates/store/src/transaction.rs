//! Optimistic transactions over the application store.
//!
//! Reads record the version they observed; writes are buffered. On commit the
//! store re-checks every observed version under its lock and applies all
//! buffered writes together, or none of them.

use std::collections::HashMap;

use claim_core::{CampaignApplication, SubscriptionBenefit};
use uuid::Uuid;

use crate::memory::ApplicationStore;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum RecordKey {
    Application(Uuid),
    Subscription(String),
}

/// A unit of work against an [`ApplicationStore`]. Obtained from
/// [`ApplicationStore::transaction`]; never committed directly.
pub struct Transaction<'a> {
    store: &'a ApplicationStore,
    pub(crate) reads: HashMap<RecordKey, u64>,
    pub(crate) applications: HashMap<Uuid, CampaignApplication>,
    pub(crate) subscriptions: HashMap<String, SubscriptionBenefit>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(store: &'a ApplicationStore) -> Self {
        Self {
            store,
            reads: HashMap::new(),
            applications: HashMap::new(),
            subscriptions: HashMap::new(),
        }
    }

    /// Read an application, preferring this transaction's own pending write.
    pub fn application(&mut self, id: Uuid) -> Option<CampaignApplication> {
        if let Some(app) = self.applications.get(&id) {
            return Some(app.clone());
        }
        let current = self.store.read_application(&id);
        self.reads
            .entry(RecordKey::Application(id))
            .or_insert_with(|| current.as_ref().map_or(0, |a| a.version));
        current
    }

    /// Read a user's subscription benefit record.
    pub fn subscription(&mut self, user_id: &str) -> Option<SubscriptionBenefit> {
        if let Some(sub) = self.subscriptions.get(user_id) {
            return Some(sub.clone());
        }
        let current = self.store.read_subscription(user_id);
        self.reads
            .entry(RecordKey::Subscription(user_id.to_string()))
            .or_insert_with(|| current.as_ref().map_or(0, |s| s.version));
        current
    }

    /// Buffer an application write. A record not read earlier in this
    /// transaction is read now so the commit still detects interleaved writers.
    pub fn put_application(&mut self, application: CampaignApplication) {
        if !self
            .reads
            .contains_key(&RecordKey::Application(application.id))
        {
            self.application(application.id);
        }
        self.applications.insert(application.id, application);
    }

    /// Buffer a subscription write.
    pub fn put_subscription(&mut self, subscription: SubscriptionBenefit) {
        let key = RecordKey::Subscription(subscription.user_id.clone());
        if !self.reads.contains_key(&key) {
            self.subscription(&subscription.user_id);
        }
        self.subscriptions
            .insert(subscription.user_id.clone(), subscription);
    }

    pub fn is_read_only(&self) -> bool {
        self.applications.is_empty() && self.subscriptions.is_empty()
    }
}
