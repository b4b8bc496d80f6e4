//! Observable Data Model
//!
//! Reactive state in Ripple is dynamic: an [`Object`] is an ordered map of
//! property names to [`Value`]s, and a [`Reactive`] proxy wraps an object so
//! that property reads and writes are tracked.
//!
//! # Identity
//!
//! Every object carries a stable [`ObjectId`]. The dependency store and the
//! proxy caches are keyed by it. When the last handle to an object is
//! dropped, its dependency-store entries and cached proxies are removed
//! (see `Drop for ObjectInner`), which stands in for a weak map.
//!
//! # Change Detection
//!
//! [`Value::same`] decides whether a write is a change: primitives compare
//! by value (with `NaN` equal to itself), objects compare by identity of the
//! raw object, and lists, functions and refs compare by pointer.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::proxy::{self, Reactive};
use super::refs::Ref;
use super::runtime;

/// Unique identifier for an observed object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

struct ObjectInner {
    id: ObjectId,
    entries: RwLock<IndexMap<String, Value>>,
}

impl Drop for ObjectInner {
    fn drop(&mut self) {
        runtime::forget(self.id);
        proxy::forget(self.id);
    }
}

/// A plain, identity-carrying property map.
///
/// Reading or writing an `Object` directly is untracked. Wrap it with
/// [`reactive`](super::reactive) to observe it.
#[derive(Clone)]
pub struct Object {
    inner: Arc<ObjectInner>,
}

impl Object {
    /// Create an empty object.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ObjectInner {
                id: ObjectId::next(),
                entries: RwLock::new(IndexMap::new()),
            }),
        }
    }

    /// Get the object's identity.
    pub fn id(&self) -> ObjectId {
        self.inner.id
    }

    /// Read a property without tracking.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.entries.read().get(key).cloned()
    }

    /// Write a property without triggering. Returns the previous value.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.inner.entries.write().insert(key.into(), value.into())
    }

    /// Remove a property without triggering, preserving the order of the rest.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.entries.write().shift_remove(key)
    }

    /// Check whether a property exists.
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.entries.read().contains_key(key)
    }

    /// Property names in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.entries.read().keys().cloned().collect()
    }

    /// A snapshot of every property.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.inner
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    /// Whether the object has no properties.
    pub fn is_empty(&self) -> bool {
        self.inner.entries.read().is_empty()
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> FromIterator<(K, V)> for Object
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let object = Object::new();
        {
            let mut entries = object.inner.entries.write();
            for (key, value) in iter {
                entries.insert(key.into(), value.into());
            }
        }
        object
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.inner.entries.read();
        f.debug_map()
            .entries(entries.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

/// A callable value, typically an event handler passed as a prop.
#[derive(Clone)]
pub struct Function(Arc<dyn Fn(&[Value]) -> Value + Send + Sync>);

impl Function {
    /// Wrap a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Invoke the function.
    pub fn call(&self, args: &[Value]) -> Value {
        (self.0)(args)
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Function) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Function")
    }
}

/// A dynamically typed value stored in objects, refs and props.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// An immutable list. Replace the list to change it.
    List(Arc<Vec<Value>>),
    /// A raw object. Reads through it are untracked.
    Object(Object),
    /// A reactive proxy over an object.
    Reactive(Reactive),
    Ref(Ref),
    Function(Function),
}

impl Value {
    /// Whether this value is an object (raw or proxied).
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Reactive(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) if n.fract() == 0.0 => Some(*n as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_reactive(&self) -> Option<&Reactive> {
        match self {
            Value::Reactive(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_ref_cell(&self) -> Option<&Ref> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// The raw object behind an `Object` or `Reactive` value.
    pub fn as_object(&self) -> Option<Object> {
        match self {
            Value::Object(o) => Some(o.clone()),
            Value::Reactive(r) => Some(r.raw().clone()),
            _ => None,
        }
    }

    /// Whether `a` and `b` should be considered the same for change detection.
    pub fn same(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Number(x), Value::Number(y)) => x == y || (x.is_nan() && y.is_nan()),
            (Value::String(x), Value::String(y)) => x == y,
            (Value::List(x), Value::List(y)) => Arc::ptr_eq(x, y),
            (Value::Ref(x), Value::Ref(y)) => x.ptr_eq(y),
            (Value::Function(x), Value::Function(y)) => x.ptr_eq(y),
            (Value::Reactive(x), Value::Reactive(y)) => x.ptr_eq(y),
            (x, y) if x.is_object() && y.is_object() => match (x.as_object(), y.as_object()) {
                (Some(x), Some(y)) => x.ptr_eq(&y),
                _ => false,
            },
            _ => false,
        }
    }

    /// Render the value as text content.
    ///
    /// Strings are used as-is, `Null` renders empty, objects and lists render
    /// as JSON, refs render their current value.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Ref(r) => r.get().to_display_string(),
            Value::Function(_) => "function".to_string(),
            Value::List(_) | Value::Object(_) | Value::Reactive(_) => self.to_json().to_string(),
        }
    }

    /// Export an untracked JSON snapshot of the value.
    pub fn to_json(&self) -> serde_json::Value {
        let mut seen = Vec::new();
        self.to_json_inner(&mut seen)
    }

    fn to_json_inner(&self, seen: &mut Vec<ObjectId>) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Value::Null | Value::Function(_) => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => Json::String(s.clone()),
            Value::List(items) => Json::Array(items.iter().map(|v| v.to_json_inner(seen)).collect()),
            Value::Ref(r) => r.get_untracked().to_json_inner(seen),
            Value::Object(_) | Value::Reactive(_) => {
                let Some(object) = self.as_object() else {
                    return Json::Null;
                };
                // Self-referencing structures serialize the cycle as null.
                if seen.contains(&object.id()) {
                    return Json::Null;
                }
                seen.push(object.id());
                let map = object
                    .entries()
                    .into_iter()
                    .map(|(k, v)| (k, v.to_json_inner(seen)))
                    .collect();
                seen.pop();
                Json::Object(map)
            }
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

// Whole numbers print without a fraction, like `1` rather than `1.0`.
fn number_to_json(n: f64) -> serde_json::Value {
    if n.is_finite() && n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::List(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Object(o) => write!(f, "Object#{}", o.id().raw()),
            Value::Reactive(r) => write!(f, "Reactive#{}", r.raw().id().raw()),
            Value::Ref(_) => f.write_str("Ref"),
            Value::Function(_) => f.write_str("Function"),
        }
    }
}

/// Structural equality over snapshots, used by tests and `Computed` values.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Ref(x), Value::Ref(y)) => x.ptr_eq(y),
            (Value::Function(x), Value::Function(y)) => x.ptr_eq(y),
            (Value::Ref(_) | Value::Function(_), _) | (_, Value::Ref(_) | Value::Function(_)) => {
                false
            }
            (Value::Number(x), Value::Number(y)) => x == y,
            _ => Value::same(self, other) || self.to_json() == other.to_json(),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! impl_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

impl_from_number!(i32, i64, u32, u64, usize, f32, f64);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl From<Reactive> for Value {
    fn from(r: Reactive) -> Self {
        Value::Reactive(r)
    }
}

impl From<Ref> for Value {
    fn from(r: Ref) -> Self {
        Value::Ref(r)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::List(Arc::new(items.into_iter().map(Value::from).collect())),
            Json::Object(map) => Value::Object(map.into_iter().collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_ids_are_unique() {
        let a = Object::new();
        let b = Object::new();
        assert_ne!(a.id(), b.id());
        assert!(a.ptr_eq(&a.clone()));
    }

    #[test]
    fn objects_preserve_insertion_order() {
        let object: Object = [("b", 1), ("a", 2), ("c", 3)].into_iter().collect();
        assert_eq!(object.keys(), vec!["b", "a", "c"]);
        object.remove("a");
        assert_eq!(object.keys(), vec!["b", "c"]);
    }

    #[test]
    fn same_compares_primitives_by_value_and_objects_by_identity() {
        assert!(Value::same(&Value::from(1), &Value::from(1.0)));
        assert!(Value::same(&Value::Number(f64::NAN), &Value::Number(f64::NAN)));
        assert!(!Value::same(&Value::from("a"), &Value::from("b")));

        let a = Value::from(json!({"x": 1}));
        let b = Value::from(json!({"x": 1}));
        assert!(Value::same(&a, &a.clone()));
        assert!(!Value::same(&a, &b));
        // Structural equality still holds.
        assert_eq!(a, b);
    }

    #[test]
    fn json_conversion_builds_nested_objects() {
        let value = Value::from(json!({"user": {"name": "ada"}, "tags": ["a", "b"]}));
        let object = value.as_object().unwrap();
        let user = object.get("user").unwrap();
        assert!(matches!(user, Value::Object(_)));
        assert_eq!(value.to_json(), json!({"user": {"name": "ada"}, "tags": ["a", "b"]}));
    }

    #[test]
    fn display_strings() {
        assert_eq!(Value::Null.to_display_string(), "");
        assert_eq!(Value::from(3).to_display_string(), "3");
        assert_eq!(Value::from(2.5).to_display_string(), "2.5");
        assert_eq!(Value::from("hi").to_display_string(), "hi");
        assert_eq!(Value::from(json!({"a": 1})).to_display_string(), r#"{"a":1}"#);
        assert_eq!(Value::from(json!([1, 2.5, -3])).to_display_string(), "[1,2.5,-3]");
    }

    #[test]
    fn whole_numbers_export_as_integers() {
        assert_eq!(Value::from(1).to_json(), json!(1));
        assert_eq!(Value::from(1.0e300).to_json(), json!(1.0e300));
        assert_eq!(Value::from(f64::NAN).to_json(), json!(null));
    }

    #[test]
    fn cyclic_objects_serialize_without_recursing_forever() {
        let object = Object::new();
        object.insert("me", object.clone());
        assert_eq!(Value::from(object.clone()).to_json(), json!({"me": null}));
        // Break the cycle so the object can be dropped.
        object.remove("me");
    }
}
