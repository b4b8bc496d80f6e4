//! Ripple Core
//!
//! This crate provides the core runtime for the Ripple reactive UI framework.
//! It implements:
//!
//! - Reactive primitives (reactive objects, refs, computed values, effects,
//!   watchers and effect scopes)
//! - A job scheduler that batches component updates
//! - Virtual nodes and a reconciler that patches a host UI tree
//! - Components with lifecycle hooks
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Dependency tracking and the reactive primitives
//! - `scheduler`: The deduplicating job queue and its flush loop
//! - `render`: Virtual nodes, the keyed diff and component instances
//! - `config`: Runtime settings
//! - `error`: The crate's error type
//!
//! The renderer never talks to a real UI toolkit. It drives a host through
//! the [`HostOps`](render::HostOps) trait; [`MemoryHost`](render::MemoryHost)
//! is an in-memory implementation.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ripple_core::reactive::{reactive, Value};
//! use ripple_core::render::{create_renderer, h, ComponentOptions, MemoryHost, SetupResult};
//! use ripple_core::scheduler::flush_jobs;
//!
//! let state = reactive(Value::from(serde_json::json!({ "count": 0 })));
//! let counter = ComponentOptions::new()
//!     .name("Counter")
//!     .setup({
//!         let state = state.clone();
//!         move |_, _| SetupResult::State(state.clone())
//!     })
//!     .render(|ctx| h("p", None, ctx.get("count").to_display_string()))
//!     .build();
//!
//! let host = Arc::new(MemoryHost::new());
//! let renderer = create_renderer(host.clone());
//! let root = host.create_root("app");
//! renderer.render(Some(h(&counter, None, ())), root);
//!
//! state.as_reactive().unwrap().set("count", 1);
//! flush_jobs()?;
//! assert_eq!(host.serialize(root), "<p>1</p>");
//! ```

pub mod config;
pub mod error;
pub mod reactive;
pub mod render;
pub mod scheduler;

pub use error::{Error, Result};
