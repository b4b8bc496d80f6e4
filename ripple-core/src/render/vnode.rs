//! Virtual Nodes
//!
//! A [`VNode`] is an immutable description of one node of the UI tree plus
//! a few slots the reconciler fills in while mounting: the host node it
//! created, the end anchor of a fragment, and the instance of a component.
//!
//! # Blocks
//!
//! Compiled templates open a block before creating an element's children
//! and close it with [`create_element_block`]. Every vnode created in
//! between with a patch flag (and every component vnode) is collected into
//! the block's `dynamic_children`, so an update only needs to visit those.

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::component::{Component, ComponentInstance};
use super::flags::{PatchFlags, ShapeFlags};
use super::host::HostNode;
use crate::reactive::Value;

/// Props of a vnode, in insertion order.
pub type Props = IndexMap<String, Value>;

/// A slot: renders children from arguments supplied by the component.
pub type Slot = Arc<dyn Fn(&[Value]) -> Vec<VNode> + Send + Sync>;

/// Named slots passed to a component.
pub type Slots = IndexMap<String, Slot>;

/// Build [`Props`] from `key => value` pairs.
///
/// ```rust,ignore
/// let props = props! { "id" => "app", "count" => 3 };
/// ```
#[macro_export]
macro_rules! props {
    () => {
        $crate::render::Props::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut props = $crate::render::Props::new();
        $(
            props.insert(
                ::std::string::String::from($key),
                $crate::reactive::Value::from($value),
            );
        )+
        props
    }};
}

/// Identity of a child among its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Int(i64),
    Str(String),
}

impl Key {
    /// Read a key from a prop value. Integral numbers become `Int`.
    pub fn from_value(value: &Value) -> Option<Key> {
        match value {
            Value::Number(n) if n.fract() == 0.0 => Some(Key::Int(*n as i64)),
            Value::Number(n) => Some(Key::Str(n.to_string())),
            Value::String(s) => Some(Key::Str(s.clone())),
            _ => None,
        }
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Key::Int(n)
    }
}

impl From<i32> for Key {
    fn from(n: i32) -> Self {
        Key::Int(n.into())
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Str(s)
    }
}

impl From<Key> for Value {
    fn from(key: Key) -> Self {
        match key {
            Key::Int(n) => Value::from(n),
            Key::Str(s) => Value::from(s),
        }
    }
}

/// What a vnode renders to.
#[derive(Clone)]
pub enum VNodeType {
    /// A host element with the given tag.
    Element(String),
    Text,
    Comment,
    /// A group of siblings without a wrapper element.
    Fragment,
    Component(Component),
}

impl VNodeType {
    /// Whether two types describe the same kind of node.
    pub fn same(&self, other: &VNodeType) -> bool {
        match (self, other) {
            (VNodeType::Element(a), VNodeType::Element(b)) => a == b,
            (VNodeType::Text, VNodeType::Text)
            | (VNodeType::Comment, VNodeType::Comment)
            | (VNodeType::Fragment, VNodeType::Fragment) => true,
            (VNodeType::Component(a), VNodeType::Component(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

/// Hashable form of a [`VNodeType`]. Two keys are equal exactly when
/// [`VNodeType::same`] holds for their types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TypeKey<'a> {
    Element(&'a str),
    Text,
    Comment,
    Fragment,
    Component(usize),
}

impl VNodeType {
    pub(crate) fn type_key(&self) -> TypeKey<'_> {
        match self {
            VNodeType::Element(tag) => TypeKey::Element(tag),
            VNodeType::Text => TypeKey::Text,
            VNodeType::Comment => TypeKey::Comment,
            VNodeType::Fragment => TypeKey::Fragment,
            VNodeType::Component(c) => TypeKey::Component(c.addr()),
        }
    }
}

impl fmt::Debug for VNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VNodeType::Element(tag) => write!(f, "<{tag}>"),
            VNodeType::Text => f.write_str("Text"),
            VNodeType::Comment => f.write_str("Comment"),
            VNodeType::Fragment => f.write_str("Fragment"),
            VNodeType::Component(c) => write!(f, "Component({})", c.name().unwrap_or("anonymous")),
        }
    }
}

impl From<&str> for VNodeType {
    fn from(tag: &str) -> Self {
        VNodeType::Element(tag.to_string())
    }
}

impl From<String> for VNodeType {
    fn from(tag: String) -> Self {
        VNodeType::Element(tag)
    }
}

impl From<Component> for VNodeType {
    fn from(component: Component) -> Self {
        VNodeType::Component(component)
    }
}

impl From<&Component> for VNodeType {
    fn from(component: &Component) -> Self {
        VNodeType::Component(component.clone())
    }
}

/// Children of a vnode.
#[derive(Clone, Default)]
pub enum Children {
    #[default]
    None,
    Text(String),
    Array(Vec<VNode>),
    /// Slots passed to a component.
    Slots(Slots),
}

impl Children {
    pub fn as_array(&self) -> &[VNode] {
        match self {
            Children::Array(children) => children,
            _ => &[],
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Children::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Children::None)
    }
}

impl fmt::Debug for Children {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Children::None => f.write_str("None"),
            Children::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Children::Array(children) => f.debug_list().entries(children).finish(),
            Children::Slots(slots) => f.debug_set().entries(slots.keys()).finish(),
        }
    }
}

impl From<()> for Children {
    fn from(_: ()) -> Self {
        Children::None
    }
}

impl From<&str> for Children {
    fn from(text: &str) -> Self {
        Children::Text(text.to_string())
    }
}

impl From<String> for Children {
    fn from(text: String) -> Self {
        Children::Text(text)
    }
}

impl From<Vec<VNode>> for Children {
    fn from(children: Vec<VNode>) -> Self {
        Children::Array(children)
    }
}

impl From<VNode> for Children {
    fn from(child: VNode) -> Self {
        Children::Array(vec![child])
    }
}

impl From<Slots> for Children {
    fn from(slots: Slots) -> Self {
        Children::Slots(slots)
    }
}

struct VNodeInner {
    node_type: VNodeType,
    props: Option<Props>,
    key: Option<Key>,
    children: Children,
    shape_flag: ShapeFlags,
    patch_flag: PatchFlags,
    dynamic_props: Vec<String>,
    dynamic_children: Option<Vec<VNode>>,
    el: Mutex<Option<HostNode>>,
    anchor: Mutex<Option<HostNode>>,
    component: Mutex<Option<Arc<ComponentInstance>>>,
}

/// A node of the virtual tree. Cloning shares the node.
#[derive(Clone)]
pub struct VNode {
    inner: Arc<VNodeInner>,
}

impl VNode {
    fn build(
        node_type: VNodeType,
        props: Option<Props>,
        children: Children,
        patch_flag: PatchFlags,
        dynamic_props: Vec<String>,
        dynamic_children: Option<Vec<VNode>>,
    ) -> Self {
        let mut shape_flag = match node_type {
            VNodeType::Element(_) => ShapeFlags::ELEMENT,
            VNodeType::Component(_) => ShapeFlags::STATEFUL_COMPONENT,
            _ => ShapeFlags::empty(),
        };
        shape_flag |= match children {
            Children::None => ShapeFlags::empty(),
            Children::Text(_) => ShapeFlags::TEXT_CHILDREN,
            Children::Array(_) => ShapeFlags::ARRAY_CHILDREN,
            Children::Slots(_) => ShapeFlags::SLOTS_CHILDREN,
        };
        let key = props
            .as_ref()
            .and_then(|props| props.get("key"))
            .and_then(Key::from_value);

        Self {
            inner: Arc::new(VNodeInner {
                node_type,
                props,
                key,
                children,
                shape_flag,
                patch_flag,
                dynamic_props,
                dynamic_children,
                el: Mutex::new(None),
                anchor: Mutex::new(None),
                component: Mutex::new(None),
            }),
        }
    }

    pub fn node_type(&self) -> &VNodeType {
        &self.inner.node_type
    }

    pub fn props(&self) -> Option<&Props> {
        self.inner.props.as_ref()
    }

    /// A single prop, if present.
    pub fn prop(&self, key: &str) -> Option<&Value> {
        self.inner.props.as_ref().and_then(|props| props.get(key))
    }

    pub fn key(&self) -> Option<&Key> {
        self.inner.key.as_ref()
    }

    pub fn children(&self) -> &Children {
        &self.inner.children
    }

    pub fn shape_flag(&self) -> ShapeFlags {
        self.inner.shape_flag
    }

    pub fn patch_flag(&self) -> PatchFlags {
        self.inner.patch_flag
    }

    /// Names of the props that may change, for `PatchFlags::PROPS`.
    pub fn dynamic_props(&self) -> &[String] {
        &self.inner.dynamic_props
    }

    /// Dynamic descendants collected by a block, if this vnode is one.
    pub fn dynamic_children(&self) -> Option<&[VNode]> {
        self.inner.dynamic_children.as_deref()
    }

    /// The host node this vnode mounted. For fragments, the start anchor;
    /// for components, the root of the rendered subtree.
    pub fn el(&self) -> Option<HostNode> {
        *self.inner.el.lock()
    }

    pub(crate) fn set_el(&self, el: Option<HostNode>) {
        *self.inner.el.lock() = el;
    }

    /// The end anchor of a mounted fragment.
    pub fn anchor(&self) -> Option<HostNode> {
        *self.inner.anchor.lock()
    }

    pub(crate) fn set_anchor(&self, anchor: Option<HostNode>) {
        *self.inner.anchor.lock() = anchor;
    }

    /// The instance of a mounted component vnode.
    pub fn component(&self) -> Option<Arc<ComponentInstance>> {
        self.inner.component.lock().clone()
    }

    pub(crate) fn set_component(&self, instance: Option<Arc<ComponentInstance>>) {
        *self.inner.component.lock() = instance;
    }

    pub(crate) fn take_component(&self) -> Option<Arc<ComponentInstance>> {
        self.inner.component.lock().take()
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &VNode) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("VNode");
        debug.field("type", &self.inner.node_type);
        if let Some(key) = &self.inner.key {
            debug.field("key", key);
        }
        if !self.inner.children.is_none() {
            debug.field("children", &self.inner.children);
        }
        debug.finish()
    }
}

/// Whether the reconciler may patch `a` into `b` instead of replacing it.
pub fn is_same_vnode_type(a: &VNode, b: &VNode) -> bool {
    a.node_type().same(b.node_type()) && a.key() == b.key()
}

thread_local! {
    static BLOCK_STACK: RefCell<Vec<Vec<VNode>>> = const { RefCell::new(Vec::new()) };
}

fn track_in_block(vnode: &VNode) {
    let tracked = !vnode.patch_flag().is_empty()
        || vnode.shape_flag().intersects(ShapeFlags::COMPONENT);
    if tracked {
        BLOCK_STACK.with(|stack| {
            if let Some(block) = stack.borrow_mut().last_mut() {
                block.push(vnode.clone());
            }
        });
    }
}

/// Start collecting dynamic vnodes for a block.
pub fn open_block() {
    BLOCK_STACK.with(|stack| stack.borrow_mut().push(Vec::new()));
}

/// Stop collecting and return what the innermost block collected.
pub fn close_block() -> Option<Vec<VNode>> {
    BLOCK_STACK.with(|stack| stack.borrow_mut().pop())
}

/// Create a vnode.
pub fn create_vnode(
    node_type: impl Into<VNodeType>,
    props: Option<Props>,
    children: impl Into<Children>,
) -> VNode {
    create_vnode_with(node_type, props, children, PatchFlags::empty(), Vec::new())
}

/// Create a vnode with compiler hints.
pub fn create_vnode_with(
    node_type: impl Into<VNodeType>,
    props: Option<Props>,
    children: impl Into<Children>,
    patch_flag: PatchFlags,
    dynamic_props: Vec<String>,
) -> VNode {
    let vnode = VNode::build(
        node_type.into(),
        props,
        children.into(),
        patch_flag,
        dynamic_props,
        None,
    );
    track_in_block(&vnode);
    vnode
}

/// Close the innermost block and make it the root of a new vnode.
///
/// Call [`open_block`] before creating the children. The new block is
/// itself collected by the enclosing block, if any.
pub fn create_element_block(
    node_type: impl Into<VNodeType>,
    props: Option<Props>,
    children: impl Into<Children>,
    patch_flag: PatchFlags,
    dynamic_props: Vec<String>,
) -> VNode {
    let dynamic_children = close_block().unwrap_or_default();
    let vnode = VNode::build(
        node_type.into(),
        props,
        children.into(),
        patch_flag,
        dynamic_props,
        Some(dynamic_children),
    );
    BLOCK_STACK.with(|stack| {
        if let Some(parent) = stack.borrow_mut().last_mut() {
            parent.push(vnode.clone());
        }
    });
    vnode
}

/// Create a text vnode.
pub fn create_text_vnode(text: impl Into<String>) -> VNode {
    create_vnode(VNodeType::Text, None, Children::Text(text.into()))
}

/// Create a text vnode whose content may change.
pub fn create_dynamic_text_vnode(text: impl Into<String>) -> VNode {
    create_vnode_with(
        VNodeType::Text,
        None,
        Children::Text(text.into()),
        PatchFlags::TEXT,
        Vec::new(),
    )
}

/// Create a comment vnode.
pub fn create_comment_vnode(text: impl Into<String>) -> VNode {
    create_vnode(VNodeType::Comment, None, Children::Text(text.into()))
}

/// Create a vnode. A single vnode child is wrapped in an array.
pub fn h(
    node_type: impl Into<VNodeType>,
    props: Option<Props>,
    children: impl Into<Children>,
) -> VNode {
    create_vnode(node_type, props, children)
}

/// Map items to vnodes, passing each item's index.
pub fn render_list<T, F>(items: impl IntoIterator<Item = T>, mut render_item: F) -> Vec<VNode>
where
    F: FnMut(T, usize) -> VNode,
{
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| render_item(item, index))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_flags_follow_type_and_children() {
        let text = h("p", None, "hi");
        assert_eq!(
            text.shape_flag(),
            ShapeFlags::ELEMENT | ShapeFlags::TEXT_CHILDREN
        );

        let list = h("ul", None, vec![h("li", None, ())]);
        assert!(list.shape_flag().contains(ShapeFlags::ARRAY_CHILDREN));

        let fragment = h(VNodeType::Fragment, None, ());
        assert!(fragment.shape_flag().is_empty());
    }

    #[test]
    fn single_vnode_child_is_wrapped() {
        let parent = h("div", None, h("span", None, ()));
        assert_eq!(parent.children().as_array().len(), 1);
    }

    #[test]
    fn key_is_read_from_props() {
        let a = h("li", Some(props! { "key" => 1 }), ());
        let b = h("li", Some(props! { "key" => "1" }), ());
        assert_eq!(a.key(), Some(&Key::Int(1)));
        assert_eq!(b.key(), Some(&Key::Str("1".into())));
        assert!(!is_same_vnode_type(&a, &b));
        assert!(is_same_vnode_type(&a, &h("li", Some(props! { "key" => 1 }), "x")));
    }

    #[test]
    fn blocks_collect_only_dynamic_nodes() {
        open_block();
        let children = vec![
            h("span", None, "static"),
            create_vnode_with("span", None, "dynamic", PatchFlags::TEXT, Vec::new()),
        ];
        let root = create_element_block("div", None, children, PatchFlags::empty(), Vec::new());

        let dynamic = root.dynamic_children().unwrap();
        assert_eq!(dynamic.len(), 1);
        assert_eq!(dynamic[0].children().as_text(), Some("dynamic"));
        assert!(close_block().is_none());
    }

    #[test]
    fn nested_blocks_register_with_their_parent() {
        open_block();
        open_block();
        let inner = create_element_block("p", None, (), PatchFlags::empty(), Vec::new());
        let outer = create_element_block("div", None, inner.clone(), PatchFlags::empty(), Vec::new());

        let dynamic = outer.dynamic_children().unwrap();
        assert_eq!(dynamic.len(), 1);
        assert!(dynamic[0].ptr_eq(&inner));
        assert!(inner.dynamic_children().unwrap().is_empty());
    }

    #[test]
    fn render_list_passes_indices() {
        let items = render_list(["a", "b"], |item, index| {
            h("li", Some(props! { "key" => index }), item)
        });
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].key(), Some(&Key::Int(1)));
    }
}
