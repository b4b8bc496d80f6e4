//! Refs
//!
//! A [`Ref`] is a single tracked slot. Cell refs own their value and a
//! private [`Dep`]; property refs (from [`to_ref`]) forward to one property
//! of a reactive object so they stay linked to it.
//!
//! Deep cell refs store objects as reactive proxies, so mutations of a
//! ref's nested object are tracked too. `shallow_ref` stores the value as
//! given and only notifies when the slot itself is replaced (or on
//! [`trigger_ref`]).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::context::untracked;
use super::dep::{track_effects, trigger_effects, Dep};
use super::proxy::{to_raw, to_reactive};
use super::value::Value;
use crate::config::diagnostic;

static REF_ID: AtomicU64 = AtomicU64::new(0);

struct CellState {
    raw: Value,
    value: Value,
}

enum RefKind {
    Cell {
        state: RwLock<CellState>,
        shallow: bool,
        dep: Dep,
    },
    Property {
        target: Value,
        key: String,
    },
}

struct RefInner {
    id: u64,
    kind: RefKind,
}

/// A tracked single-value container.
#[derive(Clone)]
pub struct Ref {
    inner: Arc<RefInner>,
}

impl Ref {
    fn cell(value: Value, shallow: bool) -> Self {
        let (raw, value) = if shallow {
            (value.clone(), value)
        } else {
            let raw = to_raw(&value);
            (raw.clone(), to_reactive(raw))
        };
        Self::from_kind(RefKind::Cell {
            state: RwLock::new(CellState { raw, value }),
            shallow,
            dep: Dep::new(),
        })
    }

    fn from_kind(kind: RefKind) -> Self {
        Self {
            inner: Arc::new(RefInner {
                id: REF_ID.fetch_add(1, Ordering::Relaxed),
                kind,
            }),
        }
    }

    /// Read the value, tracking it.
    pub fn get(&self) -> Value {
        match &self.inner.kind {
            RefKind::Cell { state, dep, .. } => {
                track_effects(dep);
                state.read().value.clone()
            }
            RefKind::Property { target, key } => match target {
                Value::Reactive(r) => r.get(key),
                Value::Object(o) => unref(&o.get(key).unwrap_or_default()),
                _ => Value::Null,
            },
        }
    }

    /// Read the value without subscribing the running effect.
    pub fn get_untracked(&self) -> Value {
        untracked(|| self.get())
    }

    /// Replace the value. Subscribers are notified only if it changed.
    pub fn set(&self, value: impl Into<Value>) {
        let value = value.into();
        match &self.inner.kind {
            RefKind::Cell {
                state,
                shallow,
                dep,
            } => {
                let raw = if *shallow { value.clone() } else { to_raw(&value) };
                {
                    let mut state = state.write();
                    if Value::same(&state.raw, &raw) {
                        return;
                    }
                    state.value = if *shallow { value } else { to_reactive(raw.clone()) };
                    state.raw = raw;
                }
                trigger_effects(dep);
            }
            RefKind::Property { target, key } => match target {
                Value::Reactive(r) => {
                    r.set(key, value);
                }
                Value::Object(o) => {
                    o.insert(key.clone(), value);
                }
                _ => diagnostic!(key = %key, "cannot set a property ref on a non-object"),
            },
        }
    }

    /// Whether this is a `shallow_ref`.
    pub fn is_shallow(&self) -> bool {
        matches!(self.inner.kind, RefKind::Cell { shallow: true, .. })
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Ref) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.kind {
            RefKind::Cell { state, shallow, .. } => f
                .debug_struct("Ref")
                .field("id", &self.inner.id)
                .field("value", &state.read().raw)
                .field("shallow", shallow)
                .finish(),
            RefKind::Property { key, .. } => f
                .debug_struct("Ref")
                .field("id", &self.inner.id)
                .field("property", key)
                .finish(),
        }
    }
}

/// Create a deep ref. Object values are exposed as reactive proxies.
///
/// Passing a ref returns that ref.
pub fn ref_value(value: impl Into<Value>) -> Ref {
    match value.into() {
        Value::Ref(r) => r,
        value => Ref::cell(value, false),
    }
}

/// Create a ref that tracks replacement of its value only.
pub fn shallow_ref(value: impl Into<Value>) -> Ref {
    match value.into() {
        Value::Ref(r) => r,
        value => Ref::cell(value, true),
    }
}

/// A ref linked to `source[key]`.
///
/// If the property already holds a ref, that ref is returned.
pub fn to_ref(source: &Value, key: &str) -> Ref {
    if let Some(Value::Ref(existing)) = source.as_object().and_then(|o| o.get(key)) {
        return existing;
    }
    Ref::from_kind(RefKind::Property {
        target: source.clone(),
        key: key.to_string(),
    })
}

/// One linked ref per property of a reactive object.
pub fn to_refs(source: &Value) -> IndexMap<String, Ref> {
    if !matches!(source, Value::Reactive(_)) {
        diagnostic!("to_refs() expects a reactive object but received a plain one");
    }
    let keys = source.as_object().map(|o| o.keys()).unwrap_or_default();
    keys.into_iter()
        .map(|key| {
            let r = to_ref(source, &key);
            (key, r)
        })
        .collect()
}

/// Whether the value is a ref.
pub fn is_ref(value: &Value) -> bool {
    matches!(value, Value::Ref(_))
}

/// The value behind a ref, or the value itself.
pub fn unref(value: &Value) -> Value {
    match value {
        Value::Ref(r) => r.get(),
        other => other.clone(),
    }
}

/// Notify a ref's subscribers without changing its value.
pub fn trigger_ref(r: &Ref) {
    if let RefKind::Cell { dep, .. } = &r.inner.kind {
        trigger_effects(dep);
    }
}

/// A view over an object whose ref properties read and write as plain
/// values.
#[derive(Clone, Debug)]
pub struct ProxyRefs {
    target: Value,
}

impl ProxyRefs {
    /// Read a property, unwrapping a ref.
    pub fn get(&self, key: &str) -> Value {
        match &self.target {
            Value::Reactive(r) => r.get(key),
            Value::Object(o) => unref(&o.get(key).unwrap_or_default()),
            _ => Value::Null,
        }
    }

    /// Write a property. Writing a non-ref into a ref property sets the ref.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        match &self.target {
            Value::Reactive(r) => {
                r.set(key, value);
            }
            Value::Object(o) => match o.get(key) {
                Some(Value::Ref(existing)) if !is_ref(&value) => existing.set(value),
                _ => {
                    o.insert(key, value);
                }
            },
            _ => {}
        }
    }

    /// Whether the property exists.
    pub fn has(&self, key: &str) -> bool {
        match &self.target {
            Value::Reactive(r) => r.has(key),
            Value::Object(o) => o.contains_key(key),
            _ => false,
        }
    }

    /// The wrapped value.
    pub fn target(&self) -> &Value {
        &self.target
    }
}

/// Unwrap refs on access.
///
/// A reactive value already unwraps refs, so it is used as is.
pub fn proxy_refs(value: impl Into<Value>) -> ProxyRefs {
    ProxyRefs {
        target: value.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect::effect;
    use crate::reactive::proxy::{is_reactive, reactive, Reactive};
    use crate::reactive::value::Object;
    use parking_lot::Mutex;
    use serde_json::json;

    fn recorder(r: &Ref) -> (Arc<Mutex<Vec<Value>>>, crate::reactive::effect::ReactiveEffect) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let r = r.clone();
        let handle = effect(move || seen_clone.lock().push(r.get()));
        (seen, handle)
    }

    #[test]
    fn ref_notifies_on_change_only() {
        let count = ref_value(1);
        let (seen, _effect) = recorder(&count);

        count.set(1);
        count.set(2);
        assert_eq!(*seen.lock(), vec![Value::from(1), Value::from(2)]);
    }

    #[test]
    fn deep_ref_wraps_objects() {
        let user = ref_value(json!({"name": "ada"}));
        assert!(is_reactive(&user.get()));
    }

    #[test]
    fn shallow_ref_needs_manual_trigger_for_inner_changes() {
        let user = shallow_ref(json!({"name": "ada"}));
        assert!(!is_reactive(&user.get()));

        let runs = Arc::new(Mutex::new(0));
        let runs_clone = runs.clone();
        let reader = user.clone();
        let _effect = effect(move || {
            reader.get();
            *runs_clone.lock() += 1;
        });

        if let Some(object) = user.get_untracked().as_object() {
            object.insert("name", "grace");
        }
        assert_eq!(*runs.lock(), 1);

        trigger_ref(&user);
        assert_eq!(*runs.lock(), 2);
    }

    #[test]
    fn to_ref_stays_linked_to_its_source() {
        let state = reactive(json!({"count": 1}));
        let count = to_ref(&state, "count");

        count.set(5);
        assert_eq!(state.as_reactive().unwrap().get("count"), Value::from(5));

        state.as_reactive().unwrap().set("count", 6);
        assert_eq!(count.get(), Value::from(6));
    }

    #[test]
    fn to_refs_covers_every_key() {
        let state = reactive(json!({"a": 1, "b": 2}));
        let refs = to_refs(&state);
        assert_eq!(refs.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(refs["b"].get(), Value::from(2));
    }

    #[test]
    fn reactive_properties_unwrap_and_write_through_refs() {
        let count = ref_value(1);
        let state = Reactive::new(Object::new());
        state.set("count", count.clone());

        assert_eq!(state.get("count"), Value::from(1));
        state.set("count", 3);
        assert_eq!(count.get(), Value::from(3));
    }

    #[test]
    fn proxy_refs_unwraps_plain_objects() {
        let count = ref_value(1);
        let object: Object = [("count", Value::from(count.clone()))].into_iter().collect();
        let view = proxy_refs(object);

        assert_eq!(view.get("count"), Value::from(1));
        view.set("count", 2);
        assert_eq!(count.get(), Value::from(2));
        assert!(view.has("count"));
    }

    #[test]
    fn unref_passes_plain_values_through() {
        assert_eq!(unref(&Value::from("x")), Value::from("x"));
        assert_eq!(unref(&Value::from(ref_value(4))), Value::from(4));
        assert!(is_ref(&Value::from(ref_value(0))));
    }
}
