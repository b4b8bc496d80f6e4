//! Rendering
//!
//! This module turns trees of virtual nodes into operations on a host UI
//! tree.
//!
//! # Concepts
//!
//! ## Virtual nodes
//!
//! A [`VNode`] describes an element, a text or comment node, a fragment of
//! siblings or a component, together with its props and children. Build
//! them with [`h`] (or [`create_vnode`] and friends).
//!
//! ## Renderer
//!
//! A [`Renderer`] owns no UI of its own. It is created for a [`HostOps`]
//! implementation and reconciles each newly rendered tree against the
//! previous one, issuing only the host operations needed to get from one
//! to the other.
//!
//! ## Components
//!
//! A [`Component`] bundles state and a render function. Each mounted
//! component runs its render function inside a reactive effect: when state
//! it read changes, an update job is queued on the
//! [scheduler](crate::scheduler) and the component re-renders on the next
//! flush.

mod component;
mod flags;
mod host;
mod lifecycle;
mod memory;
mod renderer;
mod sequence;
mod vnode;

pub use component::{
    define_component, should_update_component, Component, ComponentContext, ComponentInstance,
    ComponentOptions, DataFn, RenderFn, SetupContext, SetupFn, SetupResult,
};
pub use flags::{PatchFlags, ShapeFlags};
pub use host::{HostNode, HostOps};
pub use lifecycle::{
    get_current_instance, on_before_mount, on_before_unmount, on_before_update, on_mounted,
    on_unmounted, on_updated, Hook, LifecycleHook,
};
pub use memory::{HostOp, MemoryHost};
pub use renderer::{create_renderer, Renderer};
pub use sequence::get_sequence;
pub use vnode::{
    close_block, create_comment_vnode, create_dynamic_text_vnode, create_element_block,
    create_text_vnode, create_vnode, create_vnode_with, h, is_same_vnode_type, open_block,
    render_list, Children, Key, Props, Slot, Slots, VNode, VNodeType,
};
