//! Dependency Store
//!
//! The store is the central bookkeeping structure connecting reactive
//! objects to the effects that read them:
//!
//! ```text
//! ObjectId -> property key -> Dep (set of subscribers)
//! ```
//!
//! # How It Works
//!
//! 1. When an effect reads a property through a reactive proxy, the proxy
//!    calls [`track`], which lazily creates the `(object, key)` entry and
//!    adds the active effect to it.
//!
//! 2. The effect records the dep it joined, so that its next run (or
//!    `stop()`) can remove it again. Each run therefore re-establishes an
//!    exact dependency set.
//!
//! 3. When a property is written, the proxy calls [`trigger`], which
//!    notifies a snapshot of the subscribers for that key.
//!
//! # Lifetime
//!
//! Entries are removed by [`forget`] when the observed object is dropped.
//! The store never holds objects, only their IDs.

use std::collections::HashMap;
use std::sync::OnceLock;

use dashmap::DashMap;
use tracing::trace;

use super::context::ReactiveContext;
use super::dep::{track_effects, trigger_effects, Dep};
use super::value::{Object, ObjectId};

/// Reserved key tracked by operations that enumerate an object's keys.
pub(crate) const ITERATE_KEY: &str = "__v_iterate";

type KeyToDepMap = HashMap<String, Dep>;

static TARGETS: OnceLock<DashMap<ObjectId, KeyToDepMap>> = OnceLock::new();

fn get_targets() -> &'static DashMap<ObjectId, KeyToDepMap> {
    TARGETS.get_or_init(DashMap::new)
}

/// Record that the active effect read `key` on `target`.
///
/// Does nothing when no effect is running.
pub fn track(target: &Object, key: &str) {
    if !ReactiveContext::is_tracking() {
        return;
    }

    let dep = get_targets()
        .entry(target.id())
        .or_default()
        .entry(key.to_string())
        .or_default()
        .clone();

    trace!(object = target.id().raw(), key, "track");
    track_effects(&dep);
}

/// Notify the effects that read `key` on `target`.
///
/// Does nothing when no effect ever read that key.
pub fn trigger(target: &Object, key: &str) {
    let dep = get_targets()
        .get(&target.id())
        .and_then(|deps| deps.get(key).cloned());

    if let Some(dep) = dep {
        trace!(object = target.id().raw(), key, "trigger");
        trigger_effects(&dep);
    }
}

/// Look up the dependency set for `(target, key)` without creating it.
pub fn dep_for(target: &Object, key: &str) -> Option<Dep> {
    get_targets()
        .get(&target.id())
        .and_then(|deps| deps.get(key).cloned())
}

/// Drop every entry for an object that is going away.
pub(crate) fn forget(id: ObjectId) {
    if let Some(targets) = TARGETS.get() {
        targets.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect::ReactiveEffect;

    #[test]
    fn track_without_active_effect_creates_nothing() {
        let object = Object::new();
        track(&object, "name");
        assert!(dep_for(&object, "name").is_none());
    }

    #[test]
    fn track_registers_the_running_effect() {
        let object = Object::new();
        let target = object.clone();
        let effect = ReactiveEffect::new(move || track(&target, "name"));
        effect.run();

        let dep = dep_for(&object, "name").unwrap();
        assert!(dep.contains(effect.id()));
        assert_eq!(effect.dependency_count(), 1);
    }

    #[test]
    fn trigger_on_unknown_key_is_a_no_op() {
        let object = Object::new();
        trigger(&object, "missing");
    }

    #[test]
    fn dropping_the_object_forgets_its_entries() {
        let object = Object::new();
        let id = object.id();
        let target = object.clone();
        let effect = ReactiveEffect::new(move || track(&target, "name"));
        effect.run();
        assert!(get_targets().contains_key(&id));

        drop(effect);
        drop(object);
        assert!(!get_targets().contains_key(&id));
    }
}
