//! Reactive Proxies
//!
//! A [`Reactive`] wraps an [`Object`] behind an explicit `get`/`set`
//! interface that tracks reads and triggers writes.
//!
//! # Rules
//!
//! - `reactive(o)` returns the same proxy for the same object for as long as
//!   any handle to that proxy is alive (identity cache keyed by `ObjectId`).
//! - Wrapping is shallow-eager, deep-lazy: nested objects are wrapped when
//!   they are read, not when the outer object is wrapped. Objects held in a
//!   list come back wrapped when the list is read.
//! - Raw values are stored. Writing a proxy into a property stores the
//!   object behind it.
//! - Refs stored as properties are unwrapped on read and written through on
//!   assignment (deep proxies only).
//!
//! Shallow proxies (`shallow_reactive`) track and trigger the top level only
//! and have their own identity cache.

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use dashmap::DashMap;

use super::runtime::{self, ITERATE_KEY};
use super::value::{Object, ObjectId, Value};

/// Marker property: reading it from any proxy yields `true`, untracked.
pub const IS_REACTIVE: &str = "__v_isReactive";

type ProxyCache = DashMap<ObjectId, Weak<ProxyInner>>;

static REACTIVE_MAP: OnceLock<ProxyCache> = OnceLock::new();
static SHALLOW_REACTIVE_MAP: OnceLock<ProxyCache> = OnceLock::new();

fn cache(shallow: bool) -> &'static ProxyCache {
    if shallow {
        SHALLOW_REACTIVE_MAP.get_or_init(DashMap::new)
    } else {
        REACTIVE_MAP.get_or_init(DashMap::new)
    }
}

pub(crate) fn forget(id: ObjectId) {
    for map in [&REACTIVE_MAP, &SHALLOW_REACTIVE_MAP] {
        if let Some(map) = map.get() {
            map.remove(&id);
        }
    }
}

struct ProxyInner {
    target: Object,
    shallow: bool,
}

/// A tracked view of an object.
#[derive(Clone)]
pub struct Reactive {
    inner: Arc<ProxyInner>,
}

impl Reactive {
    /// The deep proxy for `target`, created on first use.
    pub fn new(target: Object) -> Self {
        Self::cached(target, false)
    }

    /// The shallow proxy for `target`, created on first use.
    pub fn shallow(target: Object) -> Self {
        Self::cached(target, true)
    }

    fn cached(target: Object, shallow: bool) -> Self {
        let map = cache(shallow);
        let existing = map.get(&target.id()).and_then(|weak| weak.upgrade());
        if let Some(inner) = existing {
            return Self { inner };
        }

        let inner = Arc::new(ProxyInner {
            target: target.clone(),
            shallow,
        });
        map.insert(target.id(), Arc::downgrade(&inner));
        Self { inner }
    }

    /// The object behind the proxy.
    pub fn raw(&self) -> &Object {
        &self.inner.target
    }

    /// Whether nested values are left unwrapped.
    pub fn is_shallow(&self) -> bool {
        self.inner.shallow
    }

    /// Read a property, tracking it.
    ///
    /// Missing properties read as `Null` and are still tracked, so adding
    /// them later notifies the reader.
    pub fn get(&self, key: &str) -> Value {
        if key == IS_REACTIVE {
            return Value::Bool(true);
        }

        let target = &self.inner.target;
        let value = target.get(key).unwrap_or_default();
        runtime::track(target, key);

        if self.inner.shallow {
            return value;
        }
        match value {
            Value::Ref(r) => r.get(),
            Value::Object(object) => Value::Reactive(Reactive::new(object)),
            Value::List(items) => wrap_list(items),
            other => other,
        }
    }

    /// Write a property, triggering readers if the value changed.
    ///
    /// Returns whether the write went through.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> bool {
        let target = &self.inner.target;
        let mut value = value.into();
        let old = target.get(key);

        if !self.inner.shallow {
            value = to_raw(&value);
            if let Some(Value::Ref(old_ref)) = &old {
                if !matches!(value, Value::Ref(_)) {
                    old_ref.set(value);
                    return true;
                }
            }
        }

        target.insert(key, value.clone());
        match old {
            None => {
                runtime::trigger(target, key);
                runtime::trigger(target, ITERATE_KEY);
            }
            Some(old) if !Value::same(&old, &value) => runtime::trigger(target, key),
            Some(_) => {}
        }
        true
    }

    /// Remove a property. Triggers the key and key iteration if it existed.
    pub fn delete(&self, key: &str) -> bool {
        let target = &self.inner.target;
        if target.remove(key).is_none() {
            return false;
        }
        runtime::trigger(target, key);
        runtime::trigger(target, ITERATE_KEY);
        true
    }

    /// Whether a property exists. Tracked like a read.
    pub fn has(&self, key: &str) -> bool {
        runtime::track(&self.inner.target, key);
        self.inner.target.contains_key(key)
    }

    /// Property names. Tracks the object's key set.
    pub fn keys(&self) -> Vec<String> {
        runtime::track(&self.inner.target, ITERATE_KEY);
        self.inner.target.keys()
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Reactive) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactive")
            .field("target", &self.inner.target)
            .field("shallow", &self.inner.shallow)
            .finish()
    }
}

/// Make a value reactive.
///
/// Non-objects are returned unchanged, as are values that are already
/// proxies. Objects get their cached deep proxy.
pub fn reactive(value: impl Into<Value>) -> Value {
    match value.into() {
        Value::Object(object) => Value::Reactive(Reactive::new(object)),
        other => other,
    }
}

/// Make a value shallowly reactive.
pub fn shallow_reactive(value: impl Into<Value>) -> Value {
    match value.into() {
        Value::Object(object) => Value::Reactive(Reactive::shallow(object)),
        other => other,
    }
}

/// Whether the value is a reactive proxy.
pub fn is_reactive(value: &Value) -> bool {
    match value {
        Value::Reactive(r) => matches!(r.get(IS_REACTIVE), Value::Bool(true)),
        _ => false,
    }
}

/// The raw object behind a proxy; other values are returned unchanged.
pub fn to_raw(value: &Value) -> Value {
    match value {
        Value::Reactive(r) => Value::Object(r.raw().clone()),
        Value::List(items) if holds_proxies(items) => {
            Value::List(Arc::new(items.iter().map(to_raw).collect()))
        }
        other => other.clone(),
    }
}

fn holds_proxies(items: &[Value]) -> bool {
    items.iter().any(|item| match item {
        Value::Reactive(_) => true,
        Value::List(inner) => holds_proxies(inner),
        _ => false,
    })
}

fn holds_objects(items: &[Value]) -> bool {
    items.iter().any(|item| match item {
        Value::Object(_) => true,
        Value::List(inner) => holds_objects(inner),
        _ => false,
    })
}

// A list without objects keeps its identity.
fn wrap_list(items: Arc<Vec<Value>>) -> Value {
    if !holds_objects(&items) {
        return Value::List(items);
    }
    let wrapped = items
        .iter()
        .map(|item| match item {
            Value::Object(object) => Value::Reactive(Reactive::new(object.clone())),
            Value::List(inner) => wrap_list(inner.clone()),
            other => other.clone(),
        })
        .collect();
    Value::List(Arc::new(wrapped))
}

/// Wrap objects, pass everything else through.
pub(crate) fn to_reactive(value: Value) -> Value {
    reactive(value)
}
