//! Effect Scopes
//!
//! An [`EffectScope`] collects the effects created while it is active so
//! they can be stopped together. Scopes nest: a non-detached scope registers
//! with whichever scope was active when it was created, and stopping a scope
//! cascades to its children.
//!
//! Scopes own their effects. An effect created inside `scope.run(..)` stays
//! subscribed until the scope stops, even if every other handle is dropped.

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use super::subscriber::Subscriber;
use crate::config::diagnostic;
use crate::error::{Error, Result};

thread_local! {
    static ACTIVE_SCOPE: RefCell<Vec<EffectScope>> = const { RefCell::new(Vec::new()) };
}

type Cleanup = Box<dyn FnOnce() + Send>;

struct ScopeInner {
    id: u64,
    active: AtomicBool,
    effects: Mutex<Vec<Arc<dyn Subscriber>>>,
    cleanups: Mutex<Vec<Cleanup>>,
    children: Mutex<Vec<EffectScope>>,
    parent: Mutex<Option<Weak<ScopeInner>>>,
}

/// A group of effects that can be stopped together.
#[derive(Clone)]
pub struct EffectScope {
    inner: Arc<ScopeInner>,
}

/// Pops the active scope when dropped.
struct ScopeGuard;

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        ACTIVE_SCOPE.with(|stack| stack.borrow_mut().pop());
    }
}

impl EffectScope {
    /// Create a scope. Unless `detached`, it becomes a child of the active
    /// scope.
    pub fn new(detached: bool) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let scope = Self {
            inner: Arc::new(ScopeInner {
                id: COUNTER.fetch_add(1, Ordering::Relaxed),
                active: AtomicBool::new(true),
                effects: Mutex::new(Vec::new()),
                cleanups: Mutex::new(Vec::new()),
                children: Mutex::new(Vec::new()),
                parent: Mutex::new(None),
            }),
        };

        if !detached {
            if let Some(parent) = get_current_scope() {
                *scope.inner.parent.lock() = Some(Arc::downgrade(&parent.inner));
                parent.inner.children.lock().push(scope.clone());
            }
        }
        scope
    }

    /// Run `f` with this scope active. Returns `None` (with a diagnostic)
    /// if the scope was already stopped.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        match self.try_run(f) {
            Ok(value) => Some(value),
            Err(err) => {
                diagnostic!(scope = self.inner.id, "{err}");
                None
            }
        }
    }

    /// Run `f` with this scope active, failing if the scope was stopped.
    pub fn try_run<R>(&self, f: impl FnOnce() -> R) -> Result<R> {
        if !self.is_active() {
            return Err(Error::InactiveScope);
        }
        ACTIVE_SCOPE.with(|stack| stack.borrow_mut().push(self.clone()));
        let _guard = ScopeGuard;
        Ok(f())
    }

    /// Stop every effect, run cleanups, stop child scopes and detach from
    /// the parent. Idempotent.
    pub fn stop(&self) {
        if !self.inner.active.swap(false, Ordering::SeqCst) {
            return;
        }

        let effects = std::mem::take(&mut *self.inner.effects.lock());
        let cleanups = std::mem::take(&mut *self.inner.cleanups.lock());
        let children = std::mem::take(&mut *self.inner.children.lock());
        debug!(
            scope = self.inner.id,
            effects = effects.len(),
            children = children.len(),
            "effect scope stopped"
        );

        for effect in &effects {
            effect.stop();
        }
        for cleanup in cleanups {
            cleanup();
        }
        for child in &children {
            child.stop();
        }

        let parent = self.inner.parent.lock().take();
        if let Some(parent) = parent.and_then(|p| p.upgrade()) {
            parent
                .children
                .lock()
                .retain(|child| !Arc::ptr_eq(&child.inner, &self.inner));
        }
    }

    /// Whether the scope has not been stopped.
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Number of effects owned by this scope (not counting children).
    pub fn effect_count(&self) -> usize {
        self.inner.effects.lock().len()
    }

    /// Number of live child scopes.
    pub fn child_count(&self) -> usize {
        self.inner.children.lock().len()
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &EffectScope) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for EffectScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectScope")
            .field("id", &self.inner.id)
            .field("active", &self.is_active())
            .field("effects", &self.effect_count())
            .finish()
    }
}

/// Create an effect scope.
pub fn effect_scope(detached: bool) -> EffectScope {
    EffectScope::new(detached)
}

/// The scope currently collecting effects, if any.
pub fn get_current_scope() -> Option<EffectScope> {
    ACTIVE_SCOPE.with(|stack| stack.borrow().last().cloned())
}

/// Register a callback to run when the active scope stops.
pub fn on_scope_dispose(f: impl FnOnce() + Send + 'static) {
    match get_current_scope() {
        Some(scope) => scope.inner.cleanups.lock().push(Box::new(f)),
        None => diagnostic!("on_scope_dispose() called with no active effect scope"),
    }
}

pub(crate) fn record_effect(effect: Arc<dyn Subscriber>) {
    if let Some(scope) = get_current_scope() {
        if scope.is_active() {
            scope.inner.effects.lock().push(effect);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect::effect;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn scope_collects_effects_created_inside_run() {
        let scope = effect_scope(false);
        scope.run(|| {
            let _a = effect(|| {});
            let _b = effect(|| {});
        });
        assert_eq!(scope.effect_count(), 2);

        let _outside = effect(|| {});
        assert_eq!(scope.effect_count(), 2);
    }

    #[test]
    fn stop_cascades_to_children() {
        let parent = effect_scope(false);
        let (child, detached) = parent
            .run(|| (effect_scope(false), effect_scope(true)))
            .unwrap();
        assert_eq!(parent.child_count(), 1);

        let inner = child.run(|| effect(|| {})).unwrap();
        parent.stop();

        assert!(!child.is_active());
        assert!(!inner.is_active());
        assert!(detached.is_active());
    }

    #[test]
    fn stopping_a_child_detaches_it() {
        let parent = effect_scope(false);
        let child = parent.run(|| effect_scope(false)).unwrap();
        child.stop();
        assert_eq!(parent.child_count(), 0);
        assert!(parent.is_active());
    }

    #[test]
    fn dispose_callbacks_run_on_stop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scope = effect_scope(false);
        let calls_clone = calls.clone();
        scope.run(|| {
            on_scope_dispose(move || {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            })
        });

        scope.stop();
        scope.stop();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn inactive_scope_refuses_to_run() {
        let scope = effect_scope(true);
        scope.stop();
        assert!(matches!(scope.try_run(|| ()), Err(Error::InactiveScope)));
        assert!(scope.run(|| ()).is_none());
    }

    #[test]
    fn current_scope_is_restored() {
        let outer = effect_scope(true);
        outer.run(|| {
            let inner = effect_scope(true);
            inner.run(|| {
                assert!(get_current_scope().unwrap().ptr_eq(&inner));
            });
            assert!(get_current_scope().unwrap().ptr_eq(&outer));
        });
        assert!(get_current_scope().is_none());
    }
}
