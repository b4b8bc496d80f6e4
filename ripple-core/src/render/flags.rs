//! VNode flags.
//!
//! [`ShapeFlags`] describe what a vnode is and what its children are, so the
//! reconciler can dispatch on a bitmask instead of inspecting the node.
//! [`PatchFlags`] are optimization hints from a template compiler: they tell
//! the reconciler which parts of an element can change.

use bitflags::bitflags;

bitflags! {
    /// Node kind and children kind of a vnode.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShapeFlags: u32 {
        const ELEMENT = 1;
        const FUNCTIONAL_COMPONENT = 1 << 1;
        const STATEFUL_COMPONENT = 1 << 2;
        const TEXT_CHILDREN = 1 << 3;
        const ARRAY_CHILDREN = 1 << 4;
        const SLOTS_CHILDREN = 1 << 5;
        const COMPONENT = Self::STATEFUL_COMPONENT.bits() | Self::FUNCTIONAL_COMPONENT.bits();
    }
}

bitflags! {
    /// Which parts of a vnode are dynamic.
    ///
    /// An empty set means "unknown": the node is diffed in full.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PatchFlags: u32 {
        /// Text children may change.
        const TEXT = 1;
        /// The `class` prop may change.
        const CLASS = 1 << 1;
        /// The `style` prop may change.
        const STYLE = 1 << 2;
        /// The props listed in `dynamic_props` may change.
        const PROPS = 1 << 3;
        /// Props have dynamic keys; compare all of them.
        const FULL_PROPS = 1 << 4;
        /// Children order never changes.
        const STABLE_FRAGMENT = 1 << 6;
        /// Fragment children are keyed.
        const KEYED_FRAGMENT = 1 << 7;
        /// Fragment children are not keyed; diff by position.
        const UNKEYED_FRAGMENT = 1 << 8;
        /// Needs patching for something other than props.
        const NEED_PATCH = 1 << 9;
    }
}
