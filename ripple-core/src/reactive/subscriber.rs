//! Subscriber types for the reactive system.
//!
//! A Subscriber represents any computation that depends on reactive values.
//! This includes plain effects, computed values, watchers and component
//! render effects. All of them are backed by a [`ReactiveEffect`], which is
//! the only implementor of [`Subscriber`].
//!
//! [`ReactiveEffect`]: super::ReactiveEffect

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::dep::Dep;

/// Unique identifier for a subscriber.
///
/// Each subscriber gets a unique ID when created. Dependency sets are keyed
/// by it, which makes subscribing idempotent, and the trigger path compares
/// it against the active subscriber to avoid self-triggering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A computation that can be registered in dependency sets.
pub(crate) trait Subscriber: Send + Sync {
    /// The subscriber's unique ID.
    fn id(&self) -> SubscriberId;

    /// Remember a dependency set this subscriber joined, for later cleanup.
    fn record_dep(&self, dep: &Dep);

    /// A dependency changed: run the scheduler if there is one, else re-run.
    fn notify(self: Arc<Self>);

    /// Deactivate and leave every dependency set.
    fn stop(&self);
}
