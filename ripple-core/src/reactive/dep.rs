//! Dependency sets.
//!
//! A [`Dep`] is the set of subscribers interested in one reactive source:
//! one property of one object, one ref, or one computed value. Subscribers
//! are kept in insertion order and referenced weakly, so a dep never keeps
//! an effect alive on its own.

use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::trace;

use super::context::ReactiveContext;
use super::subscriber::{Subscriber, SubscriberId};

type SubscriberMap = IndexMap<SubscriberId, Weak<dyn Subscriber>>;

/// A set of subscribers to a single reactive source.
#[derive(Clone, Default)]
pub struct Dep {
    subscribers: Arc<Mutex<SubscriberMap>>,
}

impl Dep {
    /// Create an empty dependency set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of subscribers, including ones whose effect has been dropped
    /// but not yet pruned.
    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.lock().is_empty()
    }

    /// Whether the given subscriber is a member.
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.lock().contains_key(&id)
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Dep) -> bool {
        Arc::ptr_eq(&self.subscribers, &other.subscribers)
    }

    /// Add a subscriber. Returns `false` if it was already a member.
    pub(crate) fn add(&self, subscriber: &Arc<dyn Subscriber>) -> bool {
        let mut subscribers = self.subscribers.lock();
        if subscribers.contains_key(&subscriber.id()) {
            return false;
        }
        subscribers.insert(subscriber.id(), Arc::downgrade(subscriber));
        true
    }

    pub(crate) fn remove(&self, id: SubscriberId) {
        self.subscribers.lock().shift_remove(&id);
    }

    /// Copy the live members out so the set can change while they run.
    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn Subscriber>> {
        let mut subscribers = self.subscribers.lock();
        let mut live = Vec::with_capacity(subscribers.len());
        subscribers.retain(|_, weak| match weak.upgrade() {
            Some(subscriber) => {
                live.push(subscriber);
                true
            }
            None => false,
        });
        live
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep").field("len", &self.len()).finish()
    }
}

/// Subscribe the active subscriber, if any, to `dep`.
pub fn track_effects(dep: &Dep) {
    let Some(active) = ReactiveContext::current() else {
        return;
    };
    if dep.add(&active) {
        active.record_dep(dep);
    }
}

/// Notify every member of `dep` except the one currently running.
pub fn trigger_effects(dep: &Dep) {
    let active = ReactiveContext::current_id();
    let subscribers = dep.snapshot();
    trace!(count = subscribers.len(), "triggering dependency set");

    for subscriber in subscribers {
        if Some(subscriber.id()) != active {
            subscriber.notify();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter {
        id: SubscriberId,
        notified: AtomicUsize,
        deps: Mutex<Vec<Dep>>,
    }

    impl Subscriber for Counter {
        fn id(&self) -> SubscriberId {
            self.id
        }
        fn record_dep(&self, dep: &Dep) {
            self.deps.lock().push(dep.clone());
        }
        fn notify(self: Arc<Self>) {
            self.notified.fetch_add(1, Ordering::SeqCst);
        }
        fn stop(&self) {}
    }

    fn counter() -> Arc<Counter> {
        Arc::new(Counter {
            id: SubscriberId::new(),
            notified: AtomicUsize::new(0),
            deps: Mutex::new(Vec::new()),
        })
    }

    #[test]
    fn tracking_is_idempotent() {
        let dep = Dep::new();
        let sub = counter();
        let dyn_sub: Arc<dyn Subscriber> = sub.clone();

        {
            let _ctx = ReactiveContext::enter(dyn_sub);
            track_effects(&dep);
            track_effects(&dep);
        }

        assert_eq!(dep.len(), 1);
        assert_eq!(sub.deps.lock().len(), 1);
    }

    #[test]
    fn trigger_skips_the_active_subscriber() {
        let dep = Dep::new();
        let running = counter();
        let other = counter();
        let running_dyn: Arc<dyn Subscriber> = running.clone();
        let other_dyn: Arc<dyn Subscriber> = other.clone();
        dep.add(&running_dyn);
        dep.add(&other_dyn);

        {
            let _ctx = ReactiveContext::enter(running_dyn);
            trigger_effects(&dep);
        }

        assert_eq!(running.notified.load(Ordering::SeqCst), 0);
        assert_eq!(other.notified.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let dep = Dep::new();
        {
            let sub: Arc<dyn Subscriber> = counter();
            dep.add(&sub);
            assert_eq!(dep.len(), 1);
        }
        assert!(dep.snapshot().is_empty());
        assert!(dep.is_empty());
    }
}
