//! Effect Implementation
//!
//! A [`ReactiveEffect`] is a re-runnable unit of work. While it runs it is
//! the active subscriber, so every reactive read inside it subscribes it to
//! the corresponding dependency set.
//!
//! # How Effects Work
//!
//! 1. Before each run the effect leaves every dependency set it joined
//!    during the previous run. The run then re-establishes an exact set, so
//!    branches that are no longer taken stop triggering it.
//!
//! 2. When a dependency changes, the effect's scheduler is called if it has
//!    one; otherwise the effect re-runs synchronously.
//!
//! 3. `stop()` leaves every dependency set and deactivates the effect. A
//!    stopped effect can still be `run()`, but no longer tracks anything.
//!
//! # Ownership
//!
//! Dependency sets hold effects weakly. An effect stays subscribed while a
//! handle or an owning [`EffectScope`](super::EffectScope) keeps it alive.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::debug;

use super::context::ReactiveContext;
use super::dep::Dep;
use super::scope;
use super::subscriber::{Subscriber, SubscriberId};

/// A scheduler callback: decides when a notified effect re-runs.
pub type SchedulerFn = Arc<dyn Fn() + Send + Sync>;

type StopHook = Box<dyn FnOnce() + Send>;

struct EffectInner<T> {
    id: SubscriberId,
    func: Box<dyn Fn() -> T + Send + Sync>,
    scheduler: Option<SchedulerFn>,
    active: AtomicBool,
    deps: Mutex<SmallVec<[Dep; 4]>>,
    run_count: AtomicUsize,
    on_stop: Mutex<Option<StopHook>>,
}

impl<T: 'static> EffectInner<T> {
    fn run(self: &Arc<Self>) -> T {
        if !self.active.load(Ordering::SeqCst) {
            return (self.func)();
        }

        let _ctx = ReactiveContext::enter(self.clone());
        self.cleanup();
        let value = (self.func)();
        self.run_count.fetch_add(1, Ordering::SeqCst);
        value
    }

    fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.deps.lock());
        for dep in deps {
            dep.remove(self.id);
        }
    }
}

impl<T: 'static> Subscriber for EffectInner<T> {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn record_dep(&self, dep: &Dep) {
        self.deps.lock().push(dep.clone());
    }

    fn notify(self: Arc<Self>) {
        match &self.scheduler {
            Some(scheduler) => scheduler(),
            None => {
                self.run();
            }
        }
    }

    fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.cleanup();
            let on_stop = self.on_stop.lock().take();
            if let Some(on_stop) = on_stop {
                on_stop();
            }
            debug!(effect = ?self.id, "effect stopped");
        }
    }
}

/// Options for [`effect_with`].
#[derive(Default)]
pub struct EffectOptions {
    /// Called instead of re-running when a dependency changes.
    pub scheduler: Option<SchedulerFn>,
    /// Do not run the effect on creation.
    pub lazy: bool,
    /// Called once when the effect is stopped.
    pub on_stop: Option<Box<dyn FnOnce() + Send>>,
}

/// A re-runnable, dependency-tracking computation.
///
/// Cloning shares the same effect.
pub struct ReactiveEffect<T = ()> {
    inner: Arc<EffectInner<T>>,
}

impl<T: 'static> ReactiveEffect<T> {
    /// Create an effect without running it.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::build(func, None, None)
    }

    /// Create an effect whose notifications go through `scheduler`.
    pub fn with_scheduler<F, S>(func: F, scheduler: S) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        S: Fn() + Send + Sync + 'static,
    {
        Self::build(func, Some(Arc::new(scheduler)), None)
    }

    fn build<F>(func: F, scheduler: Option<SchedulerFn>, on_stop: Option<StopHook>) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let effect = Self {
            inner: Arc::new(EffectInner {
                id: SubscriberId::new(),
                func: Box::new(func),
                scheduler,
                active: AtomicBool::new(true),
                deps: Mutex::new(SmallVec::new()),
                run_count: AtomicUsize::new(0),
                on_stop: Mutex::new(on_stop),
            }),
        };
        scope::record_effect(effect.inner.clone());
        effect
    }

    /// Run the work function, tracking what it reads.
    pub fn run(&self) -> T {
        self.inner.run()
    }

    /// Leave every dependency set and stop reacting. Idempotent.
    pub fn stop(&self) {
        Subscriber::stop(&*self.inner);
    }

    /// The effect's subscriber ID.
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Whether the effect has not been stopped.
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Number of tracked runs so far.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Number of dependency sets joined during the last run.
    pub fn dependency_count(&self) -> usize {
        self.inner.deps.lock().len()
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> WeakEffect<T> {
        WeakEffect {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

/// A non-owning handle, for schedulers that need to reach their own effect.
pub(crate) struct WeakEffect<T> {
    inner: Weak<EffectInner<T>>,
}

impl<T: 'static> WeakEffect<T> {
    pub(crate) fn upgrade(&self) -> Option<ReactiveEffect<T>> {
        self.inner.upgrade().map(|inner| ReactiveEffect { inner })
    }
}

impl<T> Clone for ReactiveEffect<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for ReactiveEffect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveEffect")
            .field("id", &self.inner.id)
            .field("active", &self.inner.active.load(Ordering::SeqCst))
            .field("run_count", &self.inner.run_count.load(Ordering::SeqCst))
            .field("dependency_count", &self.inner.deps.lock().len())
            .finish()
    }
}

/// Create an effect and run it immediately.
///
/// The returned handle keeps the effect subscribed; drop it (or call
/// [`stop`]) to end the subscription.
#[must_use = "the effect stops reacting when its handle is dropped"]
pub fn effect<F>(func: F) -> ReactiveEffect
where
    F: Fn() + Send + Sync + 'static,
{
    effect_with(func, EffectOptions::default())
}

/// Create an effect with options.
#[must_use = "the effect stops reacting when its handle is dropped"]
pub fn effect_with<F>(func: F, options: EffectOptions) -> ReactiveEffect
where
    F: Fn() + Send + Sync + 'static,
{
    let effect = ReactiveEffect::build(func, options.scheduler, options.on_stop);
    if !options.lazy {
        effect.run();
    }
    effect
}

/// Stop an effect.
pub fn stop<T: 'static>(effect: &ReactiveEffect<T>) {
    effect.stop();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn effect_runs_on_creation() {
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let _effect = effect(move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(run_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn lazy_effect_does_not_run_on_creation() {
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let effect = effect_with(
            move || {
                run_count_clone.fetch_add(1, Ordering::SeqCst);
            },
            EffectOptions {
                lazy: true,
                ..Default::default()
            },
        );

        assert_eq!(run_count.load(Ordering::SeqCst), 0);
        assert_eq!(effect.run_count(), 0);

        effect.run();
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn run_returns_the_work_value() {
        let effect = ReactiveEffect::new(|| 21 * 2);
        assert_eq!(effect.run(), 42);
    }

    #[test]
    fn stopped_effect_runs_untracked() {
        let effect = ReactiveEffect::new(|| 1);
        effect.run();
        assert_eq!(effect.run_count(), 1);

        effect.stop();
        assert!(!effect.is_active());
        assert_eq!(effect.run(), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn stop_calls_on_stop_once() {
        let stopped = Arc::new(AtomicI32::new(0));
        let stopped_clone = stopped.clone();
        let effect = effect_with(
            || {},
            EffectOptions {
                on_stop: Some(Box::new(move || {
                    stopped_clone.fetch_add(1, Ordering::SeqCst);
                })),
                ..Default::default()
            },
        );

        stop(&effect);
        stop(&effect);
        assert_eq!(stopped.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn effect_clone_shares_state() {
        let effect1 = effect(|| {});
        let effect2 = effect1.clone();

        assert_eq!(effect1.id(), effect2.id());
        assert!(effect1.ptr_eq(&effect2));

        effect1.run();
        assert_eq!(effect2.run_count(), 2);

        effect1.stop();
        assert!(!effect2.is_active());
    }
}
