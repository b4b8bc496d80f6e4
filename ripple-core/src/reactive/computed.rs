//! Computed Values
//!
//! A [`Computed`] caches the result of a getter and recomputes it lazily.
//!
//! # How Computed Values Work
//!
//! 1. The getter runs inside an internal effect, so it subscribes to
//!    whatever it reads.
//!
//! 2. When a dependency changes, the internal effect's scheduler marks the
//!    value dirty and notifies the computed's own subscribers. Nothing is
//!    recomputed yet.
//!
//! 3. The next `get()` sees the dirty flag and re-runs the getter once.
//!
//! Subscribers are only notified on the clean to dirty transition, so a
//! burst of writes between two reads costs one notification and one
//! recomputation.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::dep::{track_effects, trigger_effects, Dep};
use super::effect::ReactiveEffect;
use crate::config::diagnostic;
use crate::error::{Error, Result};

type Setter<T> = Box<dyn Fn(T) + Send + Sync>;

struct ComputedInner<T> {
    effect: ReactiveEffect<T>,
    value: Mutex<Option<T>>,
    dirty: AtomicBool,
    dep: Dep,
    setter: Option<Setter<T>>,
}

/// A lazily recomputed, cached derived value.
///
/// Cloning shares the same cache.
pub struct Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<ComputedInner<T>>,
}

impl<T> Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn build<F>(getter: F, setter: Option<Setter<T>>) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let inner = Arc::new_cyclic(|weak: &std::sync::Weak<ComputedInner<T>>| {
            let weak = weak.clone();
            let effect = ReactiveEffect::with_scheduler(getter, move || {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if !inner.dirty.swap(true, Ordering::SeqCst) {
                    trigger_effects(&inner.dep);
                }
            });
            ComputedInner {
                effect,
                value: Mutex::new(None),
                dirty: AtomicBool::new(true),
                dep: Dep::new(),
                setter,
            }
        });
        Self { inner }
    }

    /// Read the value, recomputing it first if a dependency changed.
    pub fn get(&self) -> T {
        track_effects(&self.inner.dep);

        let cached = if self.inner.dirty.load(Ordering::SeqCst) {
            None
        } else {
            self.inner.value.lock().clone()
        };
        match cached {
            Some(value) => value,
            None => self.refresh(),
        }
    }

    fn refresh(&self) -> T {
        self.inner.dirty.store(false, Ordering::SeqCst);
        let value = self.inner.effect.run();
        *self.inner.value.lock() = Some(value.clone());
        value
    }

    /// Pass a value to the setter.
    ///
    /// Fails with [`Error::ReadonlyComputed`] if none was supplied.
    pub fn set(&self, value: T) -> Result<()> {
        match &self.inner.setter {
            Some(setter) => {
                setter(value);
                Ok(())
            }
            None => {
                diagnostic!("write operation failed: computed value is readonly");
                Err(Error::ReadonlyComputed)
            }
        }
    }

    /// Whether the next read will recompute.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::SeqCst)
    }

    /// Whether a setter was supplied.
    pub fn is_readonly(&self) -> bool {
        self.inner.setter.is_none()
    }

    /// The internal effect running the getter.
    pub fn effect(&self) -> &ReactiveEffect<T> {
        &self.inner.effect
    }
}

impl<T> Clone for Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Computed<T>
where
    T: Clone + Send + Sync + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("value", &*self.inner.value.lock())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

/// Create a read-only computed value.
pub fn computed<T, F>(getter: F) -> Computed<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    Computed::build(getter, None)
}

/// Create a writable computed value.
pub fn computed_with_setter<T, F, S>(getter: F, setter: S) -> Computed<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
    S: Fn(T) + Send + Sync + 'static,
{
    Computed::build(getter, Some(Box::new(setter)))
}
