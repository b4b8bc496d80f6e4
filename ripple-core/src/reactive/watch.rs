//! Watchers
//!
//! [`watch`] runs a callback with `(new, old)` whenever a source changes;
//! [`watch_effect`] re-runs a function whenever anything it read changes.
//!
//! A source resolves to a getter that runs inside an effect. Reactive object
//! sources are traversed deeply, so a change anywhere in the subtree
//! (including added or removed keys) fires the callback. Callbacks run
//! synchronously from the effect's scheduler.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use super::computed::Computed;
use super::effect::{ReactiveEffect, WeakEffect};
use super::proxy::Reactive;
use super::refs::Ref;
use super::value::{ObjectId, Value};

type Getter = Arc<dyn Fn() -> Value + Send + Sync>;
type Callback = Arc<dyn Fn(&Value, &Value) + Send + Sync>;

/// Something a watcher can observe.
#[derive(Clone)]
pub enum WatchSource {
    /// A reactive object, watched deeply.
    Reactive(Reactive),
    /// A ref's value.
    Ref(Ref),
    /// The result of a function.
    Getter(Getter),
}

impl WatchSource {
    /// Watch the result of `f`.
    pub fn getter(f: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        WatchSource::Getter(Arc::new(f))
    }
}

impl From<Reactive> for WatchSource {
    fn from(r: Reactive) -> Self {
        WatchSource::Reactive(r)
    }
}

impl From<Ref> for WatchSource {
    fn from(r: Ref) -> Self {
        WatchSource::Ref(r)
    }
}

impl From<Computed<Value>> for WatchSource {
    fn from(c: Computed<Value>) -> Self {
        WatchSource::getter(move || c.get())
    }
}

impl fmt::Debug for WatchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchSource::Reactive(r) => f.debug_tuple("Reactive").field(r).finish(),
            WatchSource::Ref(r) => f.debug_tuple("Ref").field(r).finish(),
            WatchSource::Getter(_) => f.write_str("Getter"),
        }
    }
}

/// Options for [`watch_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchOptions {
    /// Call the callback once at creation, with `Null` as the old value.
    pub immediate: bool,
    /// Traverse the source's value so nested changes fire too.
    pub deep: bool,
}

struct WatchState {
    effect: OnceLock<WeakEffect<Value>>,
    old: Mutex<Value>,
    callback: Option<Callback>,
    deep: bool,
}

impl WatchState {
    fn job(&self, force: bool) {
        let Some(effect) = self.effect.get().and_then(WeakEffect::upgrade) else {
            return;
        };
        if !effect.is_active() {
            return;
        }

        let Some(callback) = &self.callback else {
            effect.run();
            return;
        };
        let new = effect.run();
        let changed = force || self.deep || !Value::same(&new, &self.old.lock());
        if changed {
            let old = std::mem::replace(&mut *self.old.lock(), new.clone());
            callback(&new, &old);
        }
    }
}

/// A running watcher. Dropping it stops the watcher unless an effect scope
/// owns it.
#[must_use = "the watcher stops when its handle is dropped"]
#[derive(Clone)]
pub struct WatchHandle {
    effect: ReactiveEffect<Value>,
}

impl WatchHandle {
    /// Stop watching. Idempotent.
    pub fn stop(&self) {
        self.effect.stop();
    }

    /// Whether the watcher has not been stopped.
    pub fn is_active(&self) -> bool {
        self.effect.is_active()
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Watch `source` and call `callback(new, old)` when it changes.
pub fn watch<S, C>(source: S, callback: C) -> WatchHandle
where
    S: Into<WatchSource>,
    C: Fn(&Value, &Value) + Send + Sync + 'static,
{
    watch_with(source, callback, WatchOptions::default())
}

/// [`watch`] with options.
pub fn watch_with<S, C>(source: S, callback: C, options: WatchOptions) -> WatchHandle
where
    S: Into<WatchSource>,
    C: Fn(&Value, &Value) + Send + Sync + 'static,
{
    let (getter, deep) = resolve(source.into(), options.deep);
    let (handle, state) = spawn(getter, Some(Arc::new(callback)), deep);

    if options.immediate {
        state.job(true);
    } else {
        let initial = handle.effect.run();
        *state.old.lock() = initial;
    }
    handle
}

/// Run `f` now and again whenever anything it read changes.
pub fn watch_effect<F>(f: F) -> WatchHandle
where
    F: Fn() + Send + Sync + 'static,
{
    let getter: Getter = Arc::new(move || {
        f();
        Value::Null
    });
    let (handle, _) = spawn(getter, None, false);
    handle.effect.run();
    handle
}

fn resolve(source: WatchSource, deep: bool) -> (Getter, bool) {
    match source {
        WatchSource::Reactive(r) => {
            let getter: Getter = Arc::new(move || {
                let value = Value::Reactive(r.clone());
                traverse(&value);
                value
            });
            (getter, true)
        }
        WatchSource::Ref(r) => (wrap_deep(Arc::new(move || r.get()), deep), deep),
        WatchSource::Getter(getter) => (wrap_deep(getter, deep), deep),
    }
}

fn wrap_deep(getter: Getter, deep: bool) -> Getter {
    if !deep {
        return getter;
    }
    Arc::new(move || {
        let value = getter();
        traverse(&value);
        value
    })
}

fn spawn(getter: Getter, callback: Option<Callback>, deep: bool) -> (WatchHandle, Arc<WatchState>) {
    let state = Arc::new(WatchState {
        effect: OnceLock::new(),
        old: Mutex::new(Value::Null),
        callback,
        deep,
    });
    let job_state = state.clone();
    let effect = ReactiveEffect::with_scheduler(move || getter(), move || job_state.job(false));
    let _ = state.effect.set(effect.downgrade());
    (WatchHandle { effect }, state)
}

/// Read every property reachable from `value`, so the running effect
/// subscribes to all of them.
pub fn traverse(value: &Value) {
    let mut seen = HashSet::new();
    visit(value, &mut seen);
}

fn visit(value: &Value, seen: &mut HashSet<ObjectId>) {
    match value {
        Value::Reactive(r) => {
            if !seen.insert(r.raw().id()) {
                return;
            }
            for key in r.keys() {
                visit(&r.get(&key), seen);
            }
        }
        Value::Object(o) => {
            if !seen.insert(o.id()) {
                return;
            }
            for (_, nested) in o.entries() {
                visit(&nested, seen);
            }
        }
        Value::Ref(r) => visit(&r.get(), seen),
        Value::List(items) => {
            for item in items.iter() {
                visit(item, seen);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::proxy::reactive;
    use crate::reactive::refs::ref_value;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Calls = Arc<Mutex<Vec<(Value, Value)>>>;

    fn record() -> (Calls, impl Fn(&Value, &Value) + Send + Sync + 'static) {
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        (calls, move |new: &Value, old: &Value| {
            sink.lock().push((new.clone(), old.clone()))
        })
    }

    #[test]
    fn ref_watch_reports_new_and_old() {
        let count = ref_value(1);
        let (calls, callback) = record();
        let _handle = watch(count.clone(), callback);

        assert!(calls.lock().is_empty());
        count.set(2);
        count.set(2);
        count.set(3);
        assert_eq!(
            *calls.lock(),
            vec![
                (Value::from(2), Value::from(1)),
                (Value::from(3), Value::from(2)),
            ]
        );
    }

    #[test]
    fn immediate_calls_back_with_null_old_value() {
        let count = ref_value(7);
        let (calls, callback) = record();
        let _handle = watch_with(
            count,
            callback,
            WatchOptions {
                immediate: true,
                ..Default::default()
            },
        );
        assert_eq!(*calls.lock(), vec![(Value::from(7), Value::Null)]);
    }

    #[test]
    fn reactive_sources_are_watched_deeply() {
        let state = reactive(json!({"user": {"name": "ada"}}));
        let proxy = state.as_reactive().cloned().unwrap();
        let (calls, callback) = record();
        let _handle = watch(proxy.clone(), callback);

        let user = proxy.get("user");
        user.as_reactive().unwrap().set("name", "grace");
        assert_eq!(calls.lock().len(), 1);

        user.as_reactive().unwrap().set("age", 36);
        assert_eq!(calls.lock().len(), 2);
    }

    #[test]
    fn getter_sources_fire_only_on_result_change() {
        let count = ref_value(1);
        let source = count.clone();
        let (calls, callback) = record();
        let _handle = watch(
            WatchSource::getter(move || Value::from(source.get().as_i64().unwrap_or(0) % 2 == 0)),
            callback,
        );

        count.set(3);
        assert!(calls.lock().is_empty());
        count.set(4);
        assert_eq!(*calls.lock(), vec![(Value::Bool(true), Value::Bool(false))]);
    }

    #[test]
    fn watch_effect_reruns_and_stops() {
        let count = ref_value(0);
        let runs = Arc::new(AtomicUsize::new(0));
        let reader = count.clone();
        let runs_clone = runs.clone();
        let handle = watch_effect(move || {
            reader.get();
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        count.set(1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        handle.stop();
        count.set(2);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert!(!handle.is_active());
    }

    #[test]
    fn dropping_the_handle_stops_the_watcher() {
        let count = ref_value(0);
        let (calls, callback) = record();
        drop(watch(count.clone(), callback));
        count.set(1);
        assert!(calls.lock().is_empty());
    }

    #[test]
    fn traverse_tolerates_cycles() {
        let state = reactive(json!({}));
        let proxy = state.as_reactive().cloned().unwrap();
        proxy.set("itself", state.clone());
        traverse(&state);
        proxy.delete("itself");
    }
}
