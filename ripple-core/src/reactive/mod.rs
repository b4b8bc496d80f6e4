//! Reactive Primitives
//!
//! This module implements the reactivity engine: reactive objects, refs,
//! computed values, effects, watchers and effect scopes. Everything here is
//! built on two operations of the dependency store, `track` and `trigger`.
//!
//! # Concepts
//!
//! ## Effects
//!
//! A [`ReactiveEffect`] runs a function and records every reactive value the
//! function reads. When one of those values changes, the effect re-runs (or
//! hands itself to its scheduler). Each run re-establishes an exact set of
//! dependencies.
//!
//! ## Reactive objects
//!
//! [`reactive`] wraps an [`Object`] in a [`Reactive`] proxy. Reads through
//! the proxy are tracked per property, writes trigger the effects that read
//! that property. The same object always yields the same proxy.
//!
//! ## Refs and computed values
//!
//! A [`Ref`] is a single tracked slot. A [`Computed`] is a cached getter that
//! recomputes lazily, only after a dependency changed and only when read.
//!
//! ## Watchers and scopes
//!
//! [`watch`] calls back with `(new, old)` when a source changes. An
//! [`EffectScope`] collects effects created inside it so they can all be
//! stopped at once.
//!
//! # Implementation Notes
//!
//! The active effect is a thread-local stack, so nested effects restore the
//! outer one when they finish (even if they panic). Dependency sets hold
//! effects weakly: an effect lives as long as its handle or its scope.

mod computed;
mod context;
mod dep;
mod effect;
mod proxy;
mod refs;
mod runtime;
mod scope;
mod subscriber;
mod value;
mod watch;

pub use computed::{computed, computed_with_setter, Computed};
pub use context::{is_tracking, untracked};
pub use dep::{track_effects, trigger_effects, Dep};
pub use effect::{effect, effect_with, stop, EffectOptions, ReactiveEffect, SchedulerFn};
pub use proxy::{is_reactive, reactive, shallow_reactive, to_raw, Reactive, IS_REACTIVE};
pub use refs::{
    is_ref, proxy_refs, ref_value, shallow_ref, to_ref, to_refs, trigger_ref, unref, ProxyRefs,
    Ref,
};
pub use runtime::{dep_for, track, trigger};
pub use scope::{effect_scope, get_current_scope, on_scope_dispose, EffectScope};
pub use subscriber::SubscriberId;
pub use value::{Function, Object, ObjectId, Value};
pub use watch::{traverse, watch, watch_effect, watch_with, WatchHandle, WatchOptions, WatchSource};
