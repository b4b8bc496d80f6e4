//! Host Interface
//!
//! The reconciler never touches a real UI tree. It drives one through
//! [`HostOps`], a small set of primitive operations on opaque
//! [`HostNode`] handles. A DOM adapter, a terminal UI or the in-memory
//! [`MemoryHost`](super::MemoryHost) all fit behind it.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::reactive::Value;

/// Opaque handle to a node in the host tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostNode(u64);

impl HostNode {
    /// Mint a new unique handle.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw handle value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for HostNode {
    fn default() -> Self {
        Self::new()
    }
}

impl From<u64> for HostNode {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Primitive operations on the host tree.
///
/// Implementations must accept `insert` of a node that is already attached
/// somewhere: that is a move.
pub trait HostOps: Send + Sync {
    /// Insert `node` into `parent` before `anchor`, or append it.
    fn insert(&self, node: HostNode, parent: HostNode, anchor: Option<HostNode>);

    /// Detach `node` from its parent.
    fn remove(&self, node: HostNode);

    fn create_element(&self, tag: &str) -> HostNode;

    fn create_text(&self, text: &str) -> HostNode;

    fn create_comment(&self, text: &str) -> HostNode;

    /// Replace the content of a text or comment node.
    fn set_text(&self, node: HostNode, text: &str);

    /// Replace all children of an element with a single text.
    fn set_element_text(&self, node: HostNode, text: &str);

    fn parent_node(&self, node: HostNode) -> Option<HostNode>;

    fn next_sibling(&self, node: HostNode) -> Option<HostNode>;

    fn query_selector(&self, selector: &str) -> Option<HostNode>;

    /// Apply a property change. `next == None` removes the property.
    fn patch_prop(&self, node: HostNode, key: &str, prev: Option<&Value>, next: Option<&Value>);
}
