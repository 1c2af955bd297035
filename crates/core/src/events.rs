//! Change notifications for record lifecycle transitions.
//!
//! Subscribers register per record type and are called synchronously after a
//! mutation succeeds. Delivery works on a snapshot of the subscriber list, so
//! a subscriber may subscribe or unsubscribe from inside its callback. Each
//! callback is isolated: an error or a panic is logged and counted, and the
//! remaining subscribers still run.

use crate::record::Record;
use crate::types::ChangeType;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Error type subscriber callbacks may return
pub type SubscriberError = Box<dyn std::error::Error + Send + Sync>;

type Callback = dyn Fn(&dyn Any, ChangeType) -> Result<(), SubscriberError> + Send + Sync;

/// Handle returned by [`EventEmitter::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    name: String,
    callback: Box<Callback>,
}

/// Delivery outcome of a single publish
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Event statistics for monitoring
#[derive(Debug, Default)]
pub struct EventStats {
    pub events_published: AtomicU64,
    pub events_delivered: AtomicU64,
    pub events_failed: AtomicU64,
}

/// Type-keyed publish/subscribe hub
#[derive(Default)]
pub struct EventEmitter {
    subscribers: RwLock<HashMap<&'static str, Vec<Arc<Subscription>>>>,
    next_id: AtomicU64,
    stats: EventStats,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to changes of record type `R`
    pub fn subscribe<R, F>(&self, callback: F) -> SubscriptionId
    where
        R: Record,
        F: Fn(&R, ChangeType) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        self.subscribe_named::<R, F>(std::any::type_name::<F>(), callback)
    }

    /// Subscribe with a name used in log output
    pub fn subscribe_named<R, F>(&self, name: impl Into<String>, callback: F) -> SubscriptionId
    where
        R: Record,
        F: Fn(&R, ChangeType) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let name = name.into();
        let subscription = Arc::new(Subscription {
            id,
            name: name.clone(),
            callback: Box::new(move |record: &dyn Any, change| {
                match record.downcast_ref::<R>() {
                    Some(record) => callback(record, change),
                    None => Ok(()),
                }
            }),
        });

        self.subscribers
            .write()
            .entry(R::TYPE_TAG)
            .or_default()
            .push(subscription);
        debug!(type_tag = R::TYPE_TAG, subscriber = %name, "Event subscriber added");
        id
    }

    /// Remove a subscription. Returns whether it existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let mut removed = false;
        for list in subscribers.values_mut() {
            let before = list.len();
            list.retain(|s| s.id != id);
            removed |= list.len() != before;
        }
        subscribers.retain(|_, list| !list.is_empty());
        removed
    }

    /// Number of live subscriptions for `type_tag`
    pub fn subscriber_count(&self, type_tag: &str) -> usize {
        self.subscribers
            .read()
            .get(type_tag)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Notify every subscriber of `R` about `change`
    pub fn publish<R: Record>(&self, record: &R, change: ChangeType) -> PublishReport {
        self.stats.events_published.fetch_add(1, Ordering::Relaxed);

        // Snapshot so callbacks can (un)subscribe without deadlocking
        let snapshot: Vec<Arc<Subscription>> = match self.subscribers.read().get(R::TYPE_TAG) {
            Some(list) => list.clone(),
            None => return PublishReport::default(),
        };

        let mut report = PublishReport::default();
        for subscription in snapshot {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                (subscription.callback)(record as &dyn Any, change)
            }));
            match outcome {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    warn!(
                        subscriber = %subscription.name,
                        type_tag = R::TYPE_TAG,
                        id = record.id(),
                        change = ?change,
                        error = %e,
                        "Event subscriber failed to handle event"
                    );
                }
                Err(_) => {
                    report.failed += 1;
                    error!(
                        subscriber = %subscription.name,
                        type_tag = R::TYPE_TAG,
                        id = record.id(),
                        change = ?change,
                        "Event subscriber panicked"
                    );
                }
            }
        }

        self.stats
            .events_delivered
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.stats
            .events_failed
            .fetch_add(report.failed as u64, Ordering::Relaxed);
        report
    }

    pub fn stats(&self) -> &EventStats {
        &self.stats
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let subscribers = self.subscribers.read();
        f.debug_struct("EventEmitter")
            .field("types", &subscribers.keys().collect::<Vec<_>>())
            .finish()
    }
}
