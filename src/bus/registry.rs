//! # Per-type subscription registry.
//!
//! [`Registry`] maps event-type strings to ordered subscriber lists and hands
//! out [`SubscriptionId`] tokens for removal. A single `RwLock` covers every
//! mutation and the snapshot the dispatcher takes before invoking handlers,
//! so concurrent subscribe/unsubscribe can never race a dispatch pass.
//!
//! ## Rules
//! - **Registration order preserved**: handlers for a type fire in the order
//!   they subscribed.
//! - **No dedup**: the same handler registered twice fires twice.
//! - **Snapshot dispatch**: the dispatcher iterates a copy taken under the
//!   lock; removing a subscription mid-pass affects only future passes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::bus::subscriber::SubscriberRef;

/// Opaque token identifying one subscription.
///
/// Returned by [`EventBus::subscribe`](crate::EventBus::subscribe) and
/// consumed by [`EventBus::unsubscribe`](crate::EventBus::unsubscribe).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A registered handler together with its removal token.
#[derive(Clone)]
pub(crate) struct Subscription {
    pub(crate) id: SubscriptionId,
    pub(crate) handler: SubscriberRef,
}

/// Event-type → ordered subscriber list mapping.
pub(crate) struct Registry {
    topics: RwLock<HashMap<Arc<str>, Vec<Subscription>>>,
    next_id: AtomicU64,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Appends a handler to the list for `event_type` and returns its token.
    pub(crate) fn add(&self, event_type: Arc<str>, handler: SubscriberRef) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, AtomicOrdering::Relaxed));
        let mut topics = self.write();
        topics
            .entry(event_type)
            .or_default()
            .push(Subscription { id, handler });
        id
    }

    /// Removes the subscription with the given token.
    ///
    /// Returns whether anything was removed. Empty per-type lists are dropped
    /// so the map does not accumulate dead keys.
    pub(crate) fn remove(&self, id: SubscriptionId) -> bool {
        let mut topics = self.write();
        let mut removed = false;
        topics.retain(|_, subs| {
            let before = subs.len();
            subs.retain(|s| s.id != id);
            removed |= subs.len() != before;
            !subs.is_empty()
        });
        removed
    }

    /// Returns a snapshot of the subscriptions for `event_type`, in
    /// registration order.
    pub(crate) fn snapshot(&self, event_type: &str) -> Vec<Subscription> {
        self.read().get(event_type).cloned().unwrap_or_default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Arc<str>, Vec<Subscription>>> {
        match self.topics.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Arc<str>, Vec<Subscription>>> {
        match self.topics.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
