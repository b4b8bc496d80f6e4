//! In-memory host
//!
//! [`MemoryHost`] implements [`HostOps`] over a plain node arena and
//! records every operation the renderer issues. It is the host used by the
//! crate's own tests and benchmarks, and a reference for writing adapters.

use std::fmt;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::host::{HostNode, HostOps};
use crate::reactive::Value;

/// One recorded host operation.
#[derive(Debug, Clone, PartialEq)]
pub enum HostOp {
    CreateElement { node: HostNode, tag: String },
    CreateText { node: HostNode, text: String },
    CreateComment { node: HostNode, text: String },
    /// `moved` is set when the node was already attached somewhere.
    Insert {
        node: HostNode,
        parent: HostNode,
        anchor: Option<HostNode>,
        moved: bool,
    },
    Remove { node: HostNode },
    SetText { node: HostNode, text: String },
    SetElementText { node: HostNode, text: String },
    PatchProp {
        node: HostNode,
        key: String,
        value: Option<Value>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MemKind {
    Element(String),
    Text,
    Comment,
}

#[derive(Debug)]
struct MemNode {
    kind: MemKind,
    props: IndexMap<String, Value>,
    text: String,
    children: Vec<HostNode>,
    parent: Option<HostNode>,
}

impl MemNode {
    fn new(kind: MemKind, text: &str) -> Self {
        Self {
            kind,
            props: IndexMap::new(),
            text: text.to_string(),
            children: Vec::new(),
            parent: None,
        }
    }
}

#[derive(Default)]
struct MemState {
    nodes: IndexMap<HostNode, MemNode>,
    ops: Vec<HostOp>,
}

impl MemState {
    fn detach(&mut self, node: HostNode) -> bool {
        let Some(parent) = self.nodes.get_mut(&node).and_then(|n| n.parent.take()) else {
            return false;
        };
        if let Some(parent) = self.nodes.get_mut(&parent) {
            parent.children.retain(|child| *child != node);
        }
        true
    }

    fn drop_subtree(&mut self, node: HostNode) {
        if let Some(removed) = self.nodes.shift_remove(&node) {
            for child in removed.children {
                self.drop_subtree(child);
            }
        }
    }
}

/// A [`HostOps`] implementation backed by an in-memory tree.
#[derive(Default)]
pub struct MemoryHost {
    state: Mutex<MemState>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached `div` with the given `id`, for use as a container.
    /// Not recorded.
    pub fn create_root(&self, id: &str) -> HostNode {
        let node = HostNode::new();
        let mut root = MemNode::new(MemKind::Element("div".to_string()), "");
        root.props.insert("id".to_string(), Value::from(id));
        self.state.lock().nodes.insert(node, root);
        node
    }

    /// Drain the recorded operations.
    pub fn take_ops(&self) -> Vec<HostOp> {
        std::mem::take(&mut self.state.lock().ops)
    }

    /// The recorded operations so far.
    pub fn ops(&self) -> Vec<HostOp> {
        self.state.lock().ops.clone()
    }

    pub fn children(&self, node: HostNode) -> Vec<HostNode> {
        self.state
            .lock()
            .nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Content of a text or comment node.
    pub fn text_of(&self, node: HostNode) -> Option<String> {
        let state = self.state.lock();
        let node = state.nodes.get(&node)?;
        match node.kind {
            MemKind::Element(_) => None,
            MemKind::Text | MemKind::Comment => Some(node.text.clone()),
        }
    }

    pub fn prop(&self, node: HostNode, key: &str) -> Option<Value> {
        self.state.lock().nodes.get(&node)?.props.get(key).cloned()
    }

    /// Number of live nodes, containers included.
    pub fn node_count(&self) -> usize {
        self.state.lock().nodes.len()
    }

    /// The content of `node` as markup. Function-valued props are omitted.
    pub fn serialize(&self, node: HostNode) -> String {
        let state = self.state.lock();
        let mut out = String::new();
        if let Some(node) = state.nodes.get(&node) {
            for child in &node.children {
                write_node(&state, *child, &mut out);
            }
        }
        out
    }

    fn create(&self, kind: MemKind, text: &str) -> HostNode {
        let node = HostNode::new();
        let op = match &kind {
            MemKind::Element(tag) => HostOp::CreateElement {
                node,
                tag: tag.clone(),
            },
            MemKind::Text => HostOp::CreateText {
                node,
                text: text.to_string(),
            },
            MemKind::Comment => HostOp::CreateComment {
                node,
                text: text.to_string(),
            },
        };
        let mut state = self.state.lock();
        state.nodes.insert(node, MemNode::new(kind, text));
        state.ops.push(op);
        node
    }
}

fn write_node(state: &MemState, node: HostNode, out: &mut String) {
    let Some(node) = state.nodes.get(&node) else {
        return;
    };
    match &node.kind {
        MemKind::Text => out.push_str(&node.text),
        MemKind::Comment => {
            out.push_str("<!--");
            out.push_str(&node.text);
            out.push_str("-->");
        }
        MemKind::Element(tag) => {
            out.push('<');
            out.push_str(tag);
            for (key, value) in &node.props {
                if matches!(value, Value::Function(_)) {
                    continue;
                }
                out.push_str(&format!(" {key}=\"{}\"", value.to_display_string()));
            }
            out.push('>');
            for child in &node.children {
                write_node(state, *child, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

impl HostOps for MemoryHost {
    fn insert(&self, node: HostNode, parent: HostNode, anchor: Option<HostNode>) {
        let mut state = self.state.lock();
        let moved = state.detach(node);
        if let Some(target) = state.nodes.get_mut(&parent) {
            let position = anchor
                .and_then(|anchor| target.children.iter().position(|child| *child == anchor))
                .unwrap_or(target.children.len());
            target.children.insert(position, node);
        }
        if let Some(inserted) = state.nodes.get_mut(&node) {
            inserted.parent = Some(parent);
        }
        state.ops.push(HostOp::Insert {
            node,
            parent,
            anchor,
            moved,
        });
    }

    fn remove(&self, node: HostNode) {
        let mut state = self.state.lock();
        state.detach(node);
        state.drop_subtree(node);
        state.ops.push(HostOp::Remove { node });
    }

    fn create_element(&self, tag: &str) -> HostNode {
        self.create(MemKind::Element(tag.to_string()), "")
    }

    fn create_text(&self, text: &str) -> HostNode {
        self.create(MemKind::Text, text)
    }

    fn create_comment(&self, text: &str) -> HostNode {
        self.create(MemKind::Comment, text)
    }

    fn set_text(&self, node: HostNode, text: &str) {
        let mut state = self.state.lock();
        if let Some(target) = state.nodes.get_mut(&node) {
            target.text = text.to_string();
        }
        state.ops.push(HostOp::SetText {
            node,
            text: text.to_string(),
        });
    }

    fn set_element_text(&self, node: HostNode, text: &str) {
        let mut state = self.state.lock();
        let children = state
            .nodes
            .get_mut(&node)
            .map(|target| std::mem::take(&mut target.children))
            .unwrap_or_default();
        for child in children {
            state.drop_subtree(child);
        }
        if !text.is_empty() {
            let child = HostNode::new();
            let mut text_node = MemNode::new(MemKind::Text, text);
            text_node.parent = Some(node);
            state.nodes.insert(child, text_node);
            if let Some(target) = state.nodes.get_mut(&node) {
                target.children.push(child);
            }
        }
        state.ops.push(HostOp::SetElementText {
            node,
            text: text.to_string(),
        });
    }

    fn parent_node(&self, node: HostNode) -> Option<HostNode> {
        self.state.lock().nodes.get(&node)?.parent
    }

    fn next_sibling(&self, node: HostNode) -> Option<HostNode> {
        let state = self.state.lock();
        let parent = state.nodes.get(&node)?.parent?;
        let siblings = &state.nodes.get(&parent)?.children;
        let position = siblings.iter().position(|child| *child == node)?;
        siblings.get(position + 1).copied()
    }

    fn query_selector(&self, selector: &str) -> Option<HostNode> {
        let state = self.state.lock();
        let is_match = |node: &MemNode| match (&node.kind, selector.strip_prefix('#')) {
            (MemKind::Element(_), Some(id)) => node.props.get("id").and_then(Value::as_str) == Some(id),
            (MemKind::Element(tag), None) => tag == selector,
            _ => false,
        };
        state
            .nodes
            .iter()
            .find(|(_, node)| is_match(node))
            .map(|(id, _)| *id)
    }

    fn patch_prop(&self, node: HostNode, key: &str, _prev: Option<&Value>, next: Option<&Value>) {
        let mut state = self.state.lock();
        if let Some(target) = state.nodes.get_mut(&node) {
            match next {
                Some(value) => {
                    target.props.insert(key.to_string(), value.clone());
                }
                None => {
                    target.props.shift_remove(key);
                }
            }
        }
        state.ops.push(HostOp::PatchProp {
            node,
            key: key.to_string(),
            value: next.cloned(),
        });
    }
}

impl fmt::Debug for MemoryHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryHost")
            .field("nodes", &state.nodes.len())
            .field("ops", &state.ops.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_before_anchor_and_move() {
        let host = MemoryHost::new();
        let root = host.create_root("app");
        let a = host.create_text("a");
        let b = host.create_text("b");
        host.insert(a, root, None);
        host.insert(b, root, Some(a));
        assert_eq!(host.serialize(root), "ba");

        host.take_ops();
        host.insert(b, root, None);
        assert_eq!(host.serialize(root), "ab");
        assert!(matches!(host.take_ops()[..], [HostOp::Insert { moved: true, .. }]));
        assert_eq!(host.next_sibling(a), Some(b));
        assert_eq!(host.next_sibling(b), None);
    }

    #[test]
    fn element_text_replaces_children() {
        let host = MemoryHost::new();
        let root = host.create_root("app");
        let p = host.create_element("p");
        host.insert(p, root, None);
        host.insert(host.create_text("old"), p, None);
        host.set_element_text(p, "new");
        host.patch_prop(p, "class", None, Some(&Value::from("x")));
        assert_eq!(host.serialize(root), "<p class=\"x\">new</p>");
    }

    #[test]
    fn query_selector_by_id_and_tag() {
        let host = MemoryHost::new();
        let root = host.create_root("app");
        let span = host.create_element("span");
        host.insert(span, root, None);
        assert_eq!(host.query_selector("#app"), Some(root));
        assert_eq!(host.query_selector("span"), Some(span));
        assert_eq!(host.query_selector("#missing"), None);
    }
}
