//! Reconciler
//!
//! The [`Renderer`] turns a new vnode tree into the minimal set of host
//! operations that transform the previously rendered tree into it.
//!
//! # Algorithm
//!
//! `patch(old, new)` dispatches on the node type:
//!
//! - Same vnode object: nothing to do.
//! - Different type or key: unmount the old subtree and mount the new one
//!   where the old one was.
//! - Same type: reuse the host node, apply prop changes and reconcile the
//!   children.
//!
//! Children lists are reconciled by the keyed diff:
//!
//! 1. Sync the common prefix, then the common suffix.
//! 2. If only new nodes remain, mount them. If only old nodes remain,
//!    unmount them.
//! 3. Otherwise match the unknown middle segment by key, unmount the old
//!    nodes with no counterpart and record, for every new position, the old
//!    position it came from.
//! 4. Survivors on the longest increasing subsequence of old positions are
//!    already in order. Walking the segment backwards, everything else is
//!    mounted or moved in front of its right neighbour.
//!
//! # Compiler hints
//!
//! Patch flags restrict which props are compared, and blocks restrict which
//! descendants are visited at all. A vnode built with `h` carries neither,
//! so it always gets the full diff.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use super::component::{setup_component, should_update_component, ComponentInstance};
use super::flags::{PatchFlags, ShapeFlags};
use super::host::{HostNode, HostOps};
use super::lifecycle::{invoke_hooks, CurrentInstanceGuard, LifecycleHook};
use super::sequence::get_sequence;
use super::vnode::{
    create_comment_vnode, is_same_vnode_type, Children, Key, Props, TypeKey, VNode, VNodeType,
};
use crate::config::diagnostic;
use crate::error::{Error, Result};
use crate::reactive::{ReactiveEffect, Value};
use crate::scheduler::{invalidate_job, queue_job, Job};

/// Drives a host through [`HostOps`].
pub struct Renderer {
    host: Arc<dyn HostOps>,
    roots: Mutex<HashMap<HostNode, VNode>>,
    this: Weak<Renderer>,
}

/// Create a renderer for a host.
pub fn create_renderer(host: Arc<dyn HostOps>) -> Arc<Renderer> {
    Arc::new_cyclic(|this| Renderer {
        host,
        roots: Mutex::new(HashMap::new()),
        this: this.clone(),
    })
}

impl Renderer {
    pub fn host(&self) -> &Arc<dyn HostOps> {
        &self.host
    }

    /// Render `vnode` into `container`, patching against whatever was
    /// rendered there before. `None` unmounts the previous tree.
    pub fn render(&self, vnode: Option<VNode>, container: HostNode) {
        let prev = self.roots.lock().get(&container).cloned();
        match vnode {
            Some(vnode) => {
                self.patch(prev.as_ref(), &vnode, container, None, false);
                self.roots.lock().insert(container, vnode);
            }
            None => {
                if let Some(prev) = prev {
                    self.unmount(&prev, true);
                    self.roots.lock().remove(&container);
                    debug!(container = container.raw(), "root unmounted");
                }
            }
        }
    }

    /// Render into the container found by `selector`.
    pub fn render_to(&self, vnode: VNode, selector: &str) -> Result<HostNode> {
        let container = self
            .host
            .query_selector(selector)
            .ok_or_else(|| Error::ContainerNotFound {
                selector: selector.to_string(),
            })?;
        self.render(Some(vnode), container);
        Ok(container)
    }

    /// The tree last rendered into `container`.
    pub fn root(&self, container: HostNode) -> Option<VNode> {
        self.roots.lock().get(&container).cloned()
    }

    fn patch(
        &self,
        n1: Option<&VNode>,
        n2: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
        optimized: bool,
    ) {
        let mut n1 = n1;
        let mut anchor = anchor;
        if let Some(old) = n1 {
            if old.ptr_eq(n2) {
                return;
            }
            if !is_same_vnode_type(old, n2) {
                anchor = self.next_host_node(old);
                self.unmount(old, true);
                n1 = None;
            }
        }

        match n2.node_type() {
            VNodeType::Text => self.process_text(n1, n2, container, anchor),
            VNodeType::Comment => self.process_comment(n1, n2, container, anchor),
            VNodeType::Fragment => self.process_fragment(n1, n2, container, anchor, optimized),
            VNodeType::Element(_) => match n1 {
                None => self.mount_element(n2, container, anchor, optimized),
                Some(n1) => self.patch_element(n1, n2, optimized),
            },
            VNodeType::Component(_) => match n1 {
                None => self.mount_component(n2, container, anchor),
                Some(n1) => self.update_component(n1, n2, container, anchor),
            },
        }
    }

    fn process_text(
        &self,
        n1: Option<&VNode>,
        n2: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) {
        let text = n2.children().as_text().unwrap_or_default();
        match n1 {
            None => {
                let el = self.host.create_text(text);
                n2.set_el(Some(el));
                self.host.insert(el, container, anchor);
            }
            Some(n1) => {
                let el = n1.el();
                n2.set_el(el);
                if let Some(el) = el {
                    if n1.children().as_text() != Some(text) {
                        self.host.set_text(el, text);
                    }
                }
            }
        }
    }

    fn process_comment(
        &self,
        n1: Option<&VNode>,
        n2: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) {
        match n1 {
            None => {
                let el = self
                    .host
                    .create_comment(n2.children().as_text().unwrap_or_default());
                n2.set_el(Some(el));
                self.host.insert(el, container, anchor);
            }
            Some(n1) => n2.set_el(n1.el()),
        }
    }

    fn process_fragment(
        &self,
        n1: Option<&VNode>,
        n2: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
        optimized: bool,
    ) {
        let Some(n1) = n1 else {
            let start = self.host.create_text("");
            let end = self.host.create_text("");
            n2.set_el(Some(start));
            n2.set_anchor(Some(end));
            self.host.insert(start, container, anchor);
            self.host.insert(end, container, anchor);
            self.mount_children(n2.children().as_array(), container, Some(end), optimized);
            return;
        };

        n2.set_el(n1.el());
        n2.set_anchor(n1.anchor());
        let stable = n2.patch_flag().contains(PatchFlags::STABLE_FRAGMENT);
        match (n1.dynamic_children(), n2.dynamic_children()) {
            (Some(old), Some(new)) if stable && old.len() == new.len() => {
                adopt_host_nodes(n1, n2);
                self.patch_block_children(old, new, container);
            }
            _ => self.patch_children(n1, n2, container, n1.anchor(), optimized),
        }
    }

    fn mount_element(
        &self,
        vnode: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
        optimized: bool,
    ) {
        let VNodeType::Element(tag) = vnode.node_type() else {
            return;
        };
        let el = self.host.create_element(tag);
        vnode.set_el(Some(el));

        match vnode.children() {
            Children::Text(text) => self.host.set_element_text(el, text),
            Children::Array(children) => self.mount_children(children, el, None, optimized),
            Children::None | Children::Slots(_) => {}
        }
        if let Some(props) = vnode.props() {
            for (key, value) in props {
                if key != "key" {
                    self.host.patch_prop(el, key, None, Some(value));
                }
            }
        }
        self.host.insert(el, container, anchor);
    }

    fn patch_element(&self, n1: &VNode, n2: &VNode, optimized: bool) {
        let Some(el) = n1.el() else {
            return;
        };
        n2.set_el(Some(el));
        let patch_flag = n2.patch_flag();

        let children_patched = match (n1.dynamic_children(), n2.dynamic_children()) {
            (Some(old), Some(new)) if old.len() == new.len() => {
                adopt_host_nodes(n1, n2);
                self.patch_block_children(old, new, el);
                false
            }
            (Some(_), Some(_)) => {
                self.patch_children(n1, n2, el, None, false);
                true
            }
            _ if !optimized => {
                self.patch_children(n1, n2, el, None, false);
                true
            }
            _ => false,
        };

        if patch_flag.contains(PatchFlags::FULL_PROPS) {
            self.patch_props(el, n1.props(), n2.props());
        } else if !patch_flag.is_empty() {
            if patch_flag.contains(PatchFlags::CLASS) {
                self.patch_prop_if_changed(el, "class", n1.prop("class"), n2.prop("class"));
            }
            if patch_flag.contains(PatchFlags::STYLE) {
                self.patch_prop_if_changed(el, "style", n1.prop("style"), n2.prop("style"));
            }
            if patch_flag.contains(PatchFlags::PROPS) {
                for key in n2.dynamic_props() {
                    self.patch_prop_if_changed(el, key, n1.prop(key), n2.prop(key));
                }
            }
            if patch_flag.contains(PatchFlags::TEXT) && !children_patched {
                let text = n2.children().as_text().unwrap_or_default();
                if n1.children().as_text() != Some(text) {
                    self.host.set_element_text(el, text);
                }
            }
        } else if !optimized && n2.dynamic_children().is_none() {
            self.patch_props(el, n1.props(), n2.props());
        }
    }

    fn patch_prop_if_changed(
        &self,
        el: HostNode,
        key: &str,
        prev: Option<&Value>,
        next: Option<&Value>,
    ) {
        let changed = match (prev, next) {
            (Some(prev), Some(next)) => !Value::same(prev, next),
            (None, None) => false,
            _ => true,
        };
        if changed && key != "key" {
            self.host.patch_prop(el, key, prev, next);
        }
    }

    fn patch_props(&self, el: HostNode, old: Option<&Props>, new: Option<&Props>) {
        let empty = Props::new();
        let old = old.unwrap_or(&empty);
        let new = new.unwrap_or(&empty);

        for (key, next) in new {
            self.patch_prop_if_changed(el, key, old.get(key), Some(next));
        }
        for (key, prev) in old {
            if !new.contains_key(key) {
                self.patch_prop_if_changed(el, key, Some(prev), None);
            }
        }
    }

    fn patch_block_children(&self, old: &[VNode], new: &[VNode], fallback: HostNode) {
        for (n1, n2) in old.iter().zip(new) {
            let needs_parent = matches!(n1.node_type(), VNodeType::Fragment)
                || !is_same_vnode_type(n1, n2)
                || n1.shape_flag().intersects(ShapeFlags::COMPONENT);
            let container = match n1.el() {
                Some(el) if needs_parent => self.host.parent_node(el).unwrap_or(fallback),
                _ => fallback,
            };
            self.patch(Some(n1), n2, container, None, true);
        }
    }

    fn patch_children(
        &self,
        n1: &VNode,
        n2: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
        optimized: bool,
    ) {
        let patch_flag = n2.patch_flag();
        if patch_flag.contains(PatchFlags::KEYED_FRAGMENT) {
            let (old, new) = (n1.children().as_array(), n2.children().as_array());
            self.patch_keyed_children(old, new, container, anchor, optimized);
            return;
        }
        if patch_flag.contains(PatchFlags::UNKEYED_FRAGMENT) {
            let (old, new) = (n1.children().as_array(), n2.children().as_array());
            self.patch_unkeyed_children(old, new, container, anchor, optimized);
            return;
        }

        match (n1.children(), n2.children()) {
            (old, Children::Text(text)) => {
                if let Children::Array(old) = old {
                    self.unmount_children(old, true);
                }
                if old.as_text() != Some(text.as_str()) {
                    self.host.set_element_text(container, text);
                }
            }
            (Children::Array(old), Children::Array(new)) => {
                self.patch_keyed_children(old, new, container, anchor, optimized);
            }
            (Children::Array(old), _) => self.unmount_children(old, true),
            (old, new) => {
                if old.as_text().is_some() {
                    self.host.set_element_text(container, "");
                }
                if let Children::Array(new) = new {
                    self.mount_children(new, container, anchor, optimized);
                }
            }
        }
    }

    fn patch_unkeyed_children(
        &self,
        old: &[VNode],
        new: &[VNode],
        container: HostNode,
        anchor: Option<HostNode>,
        optimized: bool,
    ) {
        let common = old.len().min(new.len());
        for (n1, n2) in old.iter().zip(new) {
            self.patch(Some(n1), n2, container, None, optimized);
        }
        if old.len() > new.len() {
            self.unmount_children(&old[common..], true);
        } else {
            self.mount_children(&new[common..], container, anchor, optimized);
        }
    }

    /// Reconcile two children lists, matching nodes by key.
    fn patch_keyed_children(
        &self,
        c1: &[VNode],
        c2: &[VNode],
        container: HostNode,
        parent_anchor: Option<HostNode>,
        optimized: bool,
    ) {
        let mut i = 0;
        let mut e1 = c1.len();
        let mut e2 = c2.len();

        // 1. common prefix
        while i < e1 && i < e2 && is_same_vnode_type(&c1[i], &c2[i]) {
            self.patch(Some(&c1[i]), &c2[i], container, None, optimized);
            i += 1;
        }

        // 2. common suffix
        while i < e1 && i < e2 && is_same_vnode_type(&c1[e1 - 1], &c2[e2 - 1]) {
            self.patch(Some(&c1[e1 - 1]), &c2[e2 - 1], container, None, optimized);
            e1 -= 1;
            e2 -= 1;
        }

        // 3. only new nodes left
        if i == e1 {
            if i < e2 {
                let anchor = c2.get(e2).and_then(VNode::el).or(parent_anchor);
                self.mount_children(&c2[i..e2], container, anchor, optimized);
            }
            return;
        }

        // 4. only old nodes left
        if i == e2 {
            self.unmount_children(&c1[i..e1], true);
            return;
        }

        // 5. unknown middle segment
        let (s1, s2) = (i, i);
        let mut key_to_new_index: HashMap<&Key, usize> = HashMap::new();
        // key-less new nodes, per type, in order
        let mut key_less: HashMap<TypeKey<'_>, VecDeque<usize>> = HashMap::new();
        for (index, node) in c2.iter().enumerate().take(e2).skip(s2) {
            match node.key() {
                Some(key) => {
                    if key_to_new_index.insert(key, index).is_some() {
                        diagnostic!(key = ?key, "duplicate key among siblings; updates may be incorrect");
                    }
                }
                None => key_less
                    .entry(node.node_type().type_key())
                    .or_default()
                    .push_back(index),
            }
        }

        let to_be_patched = e2 - s2;
        let mut patched = 0;
        let mut moved = false;
        let mut max_new_index_so_far = 0;
        // old index + 1 for each new position, 0 for "mount fresh"
        let mut new_index_to_old_index = vec![0usize; to_be_patched];

        for (old_index, prev) in c1.iter().enumerate().take(e1).skip(s1) {
            if patched >= to_be_patched {
                self.unmount(prev, true);
                continue;
            }

            let new_index = match prev.key() {
                Some(key) => key_to_new_index
                    .get(key)
                    .copied()
                    .filter(|&index| new_index_to_old_index[index - s2] == 0),
                None => key_less
                    .get_mut(&prev.node_type().type_key())
                    .and_then(VecDeque::pop_front),
            };

            match new_index {
                None => self.unmount(prev, true),
                Some(new_index) => {
                    new_index_to_old_index[new_index - s2] = old_index + 1;
                    if new_index >= max_new_index_so_far {
                        max_new_index_so_far = new_index;
                    } else {
                        moved = true;
                    }
                    self.patch(Some(prev), &c2[new_index], container, None, optimized);
                    patched += 1;
                }
            }
        }

        let increasing = if moved {
            get_sequence(&new_index_to_old_index)
        } else {
            Vec::new()
        };
        let mut j = increasing.len();
        for offset in (0..to_be_patched).rev() {
            let index = s2 + offset;
            let node = &c2[index];
            let anchor = c2.get(index + 1).and_then(VNode::el).or(parent_anchor);
            if new_index_to_old_index[offset] == 0 {
                self.patch(None, node, container, anchor, optimized);
            } else if moved {
                if j > 0 && increasing[j - 1] == offset {
                    j -= 1;
                } else {
                    self.move_vnode(node, container, anchor);
                }
            }
        }
    }

    fn mount_children(
        &self,
        children: &[VNode],
        container: HostNode,
        anchor: Option<HostNode>,
        optimized: bool,
    ) {
        for child in children {
            self.patch(None, child, container, anchor, optimized);
        }
    }

    fn unmount_children(&self, children: &[VNode], do_remove: bool) {
        for child in children {
            self.unmount(child, do_remove);
        }
    }

    fn move_vnode(&self, vnode: &VNode, container: HostNode, anchor: Option<HostNode>) {
        if let Some(instance) = vnode.component() {
            if let Some(tree) = instance.sub_tree() {
                self.move_vnode(&tree, container, anchor);
            }
            return;
        }

        if matches!(vnode.node_type(), VNodeType::Fragment) {
            if let Some(start) = vnode.el() {
                self.host.insert(start, container, anchor);
            }
            for child in vnode.children().as_array() {
                self.move_vnode(child, container, anchor);
            }
            if let Some(end) = vnode.anchor() {
                self.host.insert(end, container, anchor);
            }
            return;
        }

        if let Some(el) = vnode.el() {
            self.host.insert(el, container, anchor);
        }
    }

    /// The host node right after everything `vnode` mounted.
    fn next_host_node(&self, vnode: &VNode) -> Option<HostNode> {
        if let Some(instance) = vnode.component() {
            return instance
                .sub_tree()
                .and_then(|tree| self.next_host_node(&tree));
        }
        let last = match vnode.node_type() {
            VNodeType::Fragment => vnode.anchor(),
            _ => vnode.el(),
        };
        last.and_then(|node| self.host.next_sibling(node))
    }

    fn unmount(&self, vnode: &VNode, do_remove: bool) {
        match vnode.node_type() {
            VNodeType::Component(_) => {
                if let Some(instance) = vnode.take_component() {
                    self.unmount_component(&instance, do_remove);
                }
            }
            VNodeType::Fragment => {
                self.unmount_children(vnode.children().as_array(), do_remove);
                if do_remove {
                    for node in [vnode.el(), vnode.anchor()].into_iter().flatten() {
                        self.host.remove(node);
                    }
                }
            }
            VNodeType::Element(_) => {
                // removing the element detaches its subtree
                self.unmount_children(vnode.children().as_array(), false);
                if do_remove {
                    if let Some(el) = vnode.el() {
                        self.host.remove(el);
                    }
                }
            }
            VNodeType::Text | VNodeType::Comment => {
                if do_remove {
                    if let Some(el) = vnode.el() {
                        self.host.remove(el);
                    }
                }
            }
        }
    }

    fn mount_component(&self, vnode: &VNode, container: HostNode, anchor: Option<HostNode>) {
        let VNodeType::Component(component) = vnode.node_type() else {
            return;
        };
        let instance = ComponentInstance::new(component.clone(), vnode.clone());
        vnode.set_component(Some(instance.clone()));
        setup_component(&instance);
        self.setup_render_effect(&instance, container, anchor);
    }

    fn update_component(
        &self,
        n1: &VNode,
        n2: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) {
        let Some(instance) = n1.take_component() else {
            self.mount_component(n2, container, anchor);
            return;
        };
        n2.set_component(Some(instance.clone()));

        if should_update_component(n1, n2) {
            instance.set_next(n2.clone());
            if let Some(job) = instance.update_job() {
                invalidate_job(job);
            }
            instance.update();
        } else {
            n2.set_el(n1.el());
            instance.set_vnode(n2.clone());
        }
    }

    fn setup_render_effect(
        &self,
        instance: &Arc<ComponentInstance>,
        container: HostNode,
        anchor: Option<HostNode>,
    ) {
        let job_instance = Arc::downgrade(instance);
        let job = Job::new(move || {
            if let Some(instance) = job_instance.upgrade() {
                instance.update();
            }
        });

        let renderer = self.this.clone();
        let effect_instance = Arc::downgrade(instance);
        let scheduled = job.clone();
        let effect = instance.scope().run(|| {
            ReactiveEffect::with_scheduler(
                move || {
                    if let (Some(renderer), Some(instance)) =
                        (renderer.upgrade(), effect_instance.upgrade())
                    {
                        renderer.update_component_tree(&instance, container, anchor);
                    }
                },
                move || queue_job(scheduled.clone()),
            )
        });

        let Some(effect) = effect else {
            return;
        };
        instance.install_effect(effect.clone(), job);
        effect.run();
    }

    /// Body of a component's render effect.
    fn update_component_tree(
        &self,
        instance: &Arc<ComponentInstance>,
        container: HostNode,
        anchor: Option<HostNode>,
    ) {
        if !instance.is_mounted() {
            invoke_hooks(instance, LifecycleHook::BeforeMount);
            let tree = self.render_component_root(instance);
            self.patch(None, &tree, container, anchor, false);
            instance.vnode().set_el(tree.el());
            instance.set_sub_tree(Some(tree));
            instance.mark_mounted();
            debug!(uid = instance.uid(), component = ?instance.component().name(), "component mounted");
            invoke_hooks(instance, LifecycleHook::Mounted);
            return;
        }

        if let Some(next) = instance.take_next() {
            next.set_el(instance.vnode().el());
            instance.update_from(&next);
        }

        invoke_hooks(instance, LifecycleHook::BeforeUpdate);
        let next_tree = self.render_component_root(instance);
        let prev_tree = instance.sub_tree();
        let (container, anchor) = match &prev_tree {
            Some(prev) => (
                prev.el()
                    .and_then(|el| self.host.parent_node(el))
                    .unwrap_or(container),
                self.next_host_node(prev),
            ),
            None => (container, anchor),
        };
        self.patch(prev_tree.as_ref(), &next_tree, container, anchor, false);
        instance.vnode().set_el(next_tree.el());
        instance.set_sub_tree(Some(next_tree));
        debug!(uid = instance.uid(), "component updated");
        invoke_hooks(instance, LifecycleHook::Updated);
    }

    fn render_component_root(&self, instance: &Arc<ComponentInstance>) -> VNode {
        let _current = CurrentInstanceGuard::enter(instance.clone());
        match instance.render_fn() {
            Some(render) => render(&instance.context()),
            None => {
                diagnostic!(
                    component = ?instance.component().name(),
                    "component is missing a render function"
                );
                create_comment_vnode("")
            }
        }
    }

    fn unmount_component(&self, instance: &Arc<ComponentInstance>, do_remove: bool) {
        invoke_hooks(instance, LifecycleHook::BeforeUnmount);
        instance.scope().stop();
        if let Some(job) = instance.update_job() {
            invalidate_job(job);
        }
        if let Some(tree) = instance.take_sub_tree() {
            self.unmount(&tree, do_remove);
        }
        instance.mark_unmounted();
        invoke_hooks(instance, LifecycleHook::Unmounted);
        instance.release();
        debug!(uid = instance.uid(), component = ?instance.component().name(), "component unmounted");
    }
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("roots", &self.roots.lock().len())
            .finish()
    }
}

/// Hand the host nodes of `old`'s children to the matching children of
/// `new`. Block patching only visits dynamic nodes, so the static parts of
/// the new tree would otherwise never learn their host nodes.
fn adopt_host_nodes(old: &VNode, new: &VNode) {
    let (Children::Array(old), Children::Array(new)) = (old.children(), new.children()) else {
        return;
    };
    if old.len() != new.len() {
        return;
    }
    for (n1, n2) in old.iter().zip(new) {
        if n1.ptr_eq(n2)
            || !is_same_vnode_type(n1, n2)
            || n2.shape_flag().intersects(ShapeFlags::COMPONENT)
        {
            continue;
        }
        n2.set_el(n1.el());
        n2.set_anchor(n1.anchor());
        adopt_host_nodes(n1, n2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props;
    use crate::render::memory::{HostOp, MemoryHost};
    use crate::render::vnode::h;

    fn keyed(keys: &[&str]) -> VNode {
        h(
            "ul",
            None,
            keys.iter()
                .map(|key| h("li", Some(props! { "key" => *key }), *key))
                .collect::<Vec<_>>(),
        )
    }

    fn setup(keys: &[&str]) -> (Arc<MemoryHost>, Arc<Renderer>, HostNode) {
        let host = Arc::new(MemoryHost::new());
        let renderer = create_renderer(host.clone());
        let root = host.create_root("app");
        renderer.render(Some(keyed(keys)), root);
        host.take_ops();
        (host, renderer, root)
    }

    #[test]
    fn moved_survivor_off_the_increasing_run_is_the_only_move() {
        let (host, renderer, root) = setup(&["a", "b", "c", "d", "e"]);
        renderer.render(Some(keyed(&["a", "c", "d", "b", "e"])), root);

        let ops = host.take_ops();
        assert_eq!(ops.len(), 1, "{ops:?}");
        assert!(matches!(ops[0], HostOp::Insert { moved: true, .. }));
        assert_eq!(host.serialize(root), "<ul><li>a</li><li>c</li><li>d</li><li>b</li><li>e</li></ul>");
    }

    #[test]
    fn key_less_nodes_match_in_the_middle_segment() {
        let host = Arc::new(MemoryHost::new());
        let renderer = create_renderer(host.clone());
        let root = host.create_root("app");
        let list = |first: &str| {
            h(
                "div",
                None,
                vec![
                    h("b", Some(props! { "key" => first }), ()),
                    h("p", None, "x"),
                    h("b", Some(props! { "key" => if first == "1" { "2" } else { "1" } }), ()),
                ],
            )
        };
        renderer.render(Some(list("1")), root);
        host.take_ops();

        renderer.render(Some(list("2")), root);
        let ops = host.take_ops();
        assert!(ops.iter().all(|op| !matches!(op, HostOp::CreateElement { .. } | HostOp::Remove { .. })), "{ops:?}");
    }

    #[test]
    fn key_less_nodes_pair_with_their_own_type_in_order() {
        let host = Arc::new(MemoryHost::new());
        let renderer = create_renderer(host.clone());
        let root = host.create_root("app");
        let edge = |key: &str| h("b", Some(props! { "key" => key }), ());

        renderer.render(
            Some(h(
                "div",
                None,
                vec![edge("1"), h("p", None, "1"), h("span", None, "s"), h("p", None, "2"), edge("2")],
            )),
            root,
        );
        host.take_ops();

        renderer.render(
            Some(h(
                "div",
                None,
                vec![edge("2"), h("span", None, "s"), h("p", None, "1"), h("p", None, "2"), edge("1")],
            )),
            root,
        );
        let ops = host.take_ops();
        assert!(
            ops.iter().all(|op| !matches!(op, HostOp::CreateElement { .. } | HostOp::Remove { .. })),
            "{ops:?}"
        );
        assert_eq!(
            host.serialize(root),
            "<div><b></b><span>s</span><p>1</p><p>2</p><b></b></div>"
        );
    }

    #[test]
    fn adopted_host_nodes_survive_block_updates() {
        use crate::render::flags::PatchFlags;
        use crate::render::vnode::{create_dynamic_text_vnode, create_element_block, open_block};

        let host = Arc::new(MemoryHost::new());
        let renderer = create_renderer(host.clone());
        let root = host.create_root("app");
        let view = |text: &str| {
            open_block();
            let children = vec![h("span", None, vec![create_dynamic_text_vnode(text)])];
            create_element_block("div", None, children, PatchFlags::empty(), Vec::new())
        };

        renderer.render(Some(view("one")), root);
        renderer.render(Some(view("two")), root);
        let second = renderer.root(root).map(|tree| tree.children().as_array()[0].el());
        assert!(matches!(second, Some(Some(_))));
        assert_eq!(host.serialize(root), "<div><span>two</span></div>");
    }
}
