//! Components
//!
//! A [`Component`] is a reusable definition: which props it declares, how
//! it builds its state and how it renders. Mounting a component vnode
//! creates a [`ComponentInstance`] that owns the state, the rendered
//! subtree and the render effect that keeps the subtree up to date.
//!
//! # Props and attrs
//!
//! Raw props passed by the parent are split: names the component declares
//! become props (a shallow reactive object, so the render effect tracks
//! them), everything else becomes attrs. The reserved `key` prop is never
//! passed down.
//!
//! # Instance state
//!
//! The render function sees the instance through a [`ComponentContext`],
//! which resolves a name against setup state, then data, then props.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::debug;

use super::lifecycle::{CurrentInstanceGuard, Hook, LifecycleHook};
use super::vnode::{create_text_vnode, Children, Props, Slot, Slots, VNode};
use crate::config::diagnostic;
use crate::error::{Error, Result};
use crate::reactive::{
    effect_scope, proxy_refs, untracked, EffectScope, Object, ProxyRefs, Reactive,
    ReactiveEffect, Value,
};
use crate::scheduler::Job;

/// Renders a component's subtree.
pub type RenderFn = Arc<dyn Fn(&ComponentContext) -> VNode + Send + Sync>;

/// Builds the initial component state from its props.
pub type DataFn = Arc<dyn Fn(&Reactive) -> Value + Send + Sync>;

/// Runs once per instance, before the first render.
pub type SetupFn = Arc<dyn Fn(&Reactive, &SetupContext) -> SetupResult + Send + Sync>;

/// What `setup` hands back to the instance.
#[derive(Clone, Default)]
pub enum SetupResult {
    /// State exposed to the render function. Refs in it are unwrapped.
    State(Value),
    /// The render function, replacing the `render` option.
    Render(RenderFn),
    #[default]
    None,
}

impl fmt::Debug for SetupResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupResult::State(state) => f.debug_tuple("State").field(state).finish(),
            SetupResult::Render(_) => f.write_str("Render"),
            SetupResult::None => f.write_str("None"),
        }
    }
}

#[derive(Clone)]
enum DataOption {
    Factory(DataFn),
    Value(Value),
}

struct ComponentDef {
    name: Option<String>,
    props: Vec<String>,
    data: Option<DataOption>,
    setup: Option<SetupFn>,
    render: Option<RenderFn>,
}

/// Builder for a [`Component`].
#[derive(Default)]
pub struct ComponentOptions {
    name: Option<String>,
    props: Vec<String>,
    data: Option<DataOption>,
    setup: Option<SetupFn>,
    render: Option<RenderFn>,
}

impl ComponentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name used in diagnostics.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Declare prop names. Undeclared props become attrs.
    pub fn props<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.props = names.into_iter().map(Into::into).collect();
        self
    }

    /// State factory, called once per instance. The result is made reactive.
    pub fn data(mut self, f: impl Fn(&Reactive) -> Value + Send + Sync + 'static) -> Self {
        self.data = Some(DataOption::Factory(Arc::new(f)));
        self
    }

    /// A plain state value. Rejected at mount: it would be shared by every
    /// instance.
    pub fn data_value(mut self, value: impl Into<Value>) -> Self {
        self.data = Some(DataOption::Value(value.into()));
        self
    }

    pub fn setup(
        mut self,
        f: impl Fn(&Reactive, &SetupContext) -> SetupResult + Send + Sync + 'static,
    ) -> Self {
        self.setup = Some(Arc::new(f));
        self
    }

    pub fn render(mut self, f: impl Fn(&ComponentContext) -> VNode + Send + Sync + 'static) -> Self {
        self.render = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> Component {
        Component {
            def: Arc::new(ComponentDef {
                name: self.name,
                props: self.props,
                data: self.data,
                setup: self.setup,
                render: self.render,
            }),
        }
    }
}

/// A component definition. Cloning shares the definition, and vnodes of
/// clones are the same type.
#[derive(Clone)]
pub struct Component {
    def: Arc<ComponentDef>,
}

impl Component {
    pub fn name(&self) -> Option<&str> {
        self.def.name.as_deref()
    }

    /// Declared prop names.
    pub fn declared_props(&self) -> &[String] {
        &self.def.props
    }

    /// Check the options for usage errors.
    pub fn validate(&self) -> Result<()> {
        if let Some(DataOption::Value(_)) = &self.def.data {
            return Err(Error::DataNotFunction {
                component: self.def.name.clone(),
            });
        }
        Ok(())
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Component) -> bool {
        Arc::ptr_eq(&self.def, &other.def)
    }

    /// Address of the shared definition; equal exactly when `ptr_eq` holds.
    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.def) as usize
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.def.name)
            .field("props", &self.def.props)
            .finish()
    }
}

/// Shorthand for `options.build()`.
pub fn define_component(options: ComponentOptions) -> Component {
    options.build()
}

/// What `setup` can see besides props.
pub struct SetupContext {
    attrs: Object,
    slots: Slots,
}

impl SetupContext {
    pub fn attrs(&self) -> &Object {
        &self.attrs
    }

    pub fn slots(&self) -> &Slots {
        &self.slots
    }
}

/// A mounted (or mounting) component.
pub struct ComponentInstance {
    uid: u64,
    component: Component,
    vnode: Mutex<VNode>,
    next: Mutex<Option<VNode>>,
    props: Reactive,
    attrs: Object,
    slots: Mutex<Slots>,
    data: Mutex<Option<Reactive>>,
    setup_state: Mutex<Option<ProxyRefs>>,
    render: Mutex<Option<RenderFn>>,
    sub_tree: Mutex<Option<VNode>>,
    is_mounted: AtomicBool,
    is_unmounted: AtomicBool,
    effect: OnceLock<ReactiveEffect>,
    update_job: OnceLock<Job>,
    scope: EffectScope,
    hooks: Mutex<HashMap<LifecycleHook, Vec<Hook>>>,
}

impl ComponentInstance {
    pub(crate) fn new(component: Component, vnode: VNode) -> Arc<Self> {
        static UID: AtomicU64 = AtomicU64::new(0);

        let (props, attrs) = resolve_props(component.declared_props(), vnode.props());
        let slots = normalize_slots(vnode.children());
        Arc::new(Self {
            uid: UID.fetch_add(1, Ordering::Relaxed),
            component,
            vnode: Mutex::new(vnode),
            next: Mutex::new(None),
            props: Reactive::shallow(props),
            attrs,
            slots: Mutex::new(slots),
            data: Mutex::new(None),
            setup_state: Mutex::new(None),
            render: Mutex::new(None),
            sub_tree: Mutex::new(None),
            is_mounted: AtomicBool::new(false),
            is_unmounted: AtomicBool::new(false),
            effect: OnceLock::new(),
            update_job: OnceLock::new(),
            scope: effect_scope(true),
            hooks: Mutex::new(HashMap::new()),
        })
    }

    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn component(&self) -> &Component {
        &self.component
    }

    /// The vnode the instance currently belongs to.
    pub fn vnode(&self) -> VNode {
        self.vnode.lock().clone()
    }

    pub(crate) fn set_vnode(&self, vnode: VNode) {
        *self.vnode.lock() = vnode;
    }

    pub(crate) fn set_next(&self, vnode: VNode) {
        *self.next.lock() = Some(vnode);
    }

    pub(crate) fn take_next(&self) -> Option<VNode> {
        self.next.lock().take()
    }

    /// Declared props, as a shallow reactive object.
    pub fn props(&self) -> &Reactive {
        &self.props
    }

    /// Undeclared props.
    pub fn attrs(&self) -> &Object {
        &self.attrs
    }

    /// Reactive state built by the `data` option.
    pub fn data(&self) -> Option<Reactive> {
        self.data.lock().clone()
    }

    /// The rendered subtree, once mounted.
    pub fn sub_tree(&self) -> Option<VNode> {
        self.sub_tree.lock().clone()
    }

    pub(crate) fn set_sub_tree(&self, tree: Option<VNode>) {
        *self.sub_tree.lock() = tree;
    }

    pub(crate) fn take_sub_tree(&self) -> Option<VNode> {
        self.sub_tree.lock().take()
    }

    pub fn is_mounted(&self) -> bool {
        self.is_mounted.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_mounted(&self) {
        self.is_mounted.store(true, Ordering::SeqCst);
    }

    pub fn is_unmounted(&self) -> bool {
        self.is_unmounted.load(Ordering::SeqCst)
    }

    /// The scope owning the instance's render effect and everything its
    /// setup created.
    pub fn scope(&self) -> &EffectScope {
        &self.scope
    }

    /// The render context for this instance.
    pub fn context(self: &Arc<Self>) -> ComponentContext {
        ComponentContext {
            instance: self.clone(),
        }
    }

    pub(crate) fn install_effect(&self, effect: ReactiveEffect, job: Job) {
        let _ = self.effect.set(effect);
        let _ = self.update_job.set(job);
    }

    pub(crate) fn update_job(&self) -> Option<&Job> {
        self.update_job.get()
    }

    /// Re-render now, if still mounted.
    pub fn update(&self) {
        if self.is_unmounted() {
            return;
        }
        if let Some(effect) = self.effect.get() {
            if effect.is_active() {
                effect.run();
            }
        }
    }

    pub(crate) fn render_fn(&self) -> Option<RenderFn> {
        self.render.lock().clone()
    }

    pub(crate) fn add_hook(&self, kind: LifecycleHook, hook: Hook) {
        self.hooks.lock().entry(kind).or_default().push(hook);
    }

    pub(crate) fn hooks(&self, kind: LifecycleHook) -> Vec<Hook> {
        self.hooks.lock().get(&kind).cloned().unwrap_or_default()
    }

    /// Apply the props and slots of the vnode that replaces this one.
    pub(crate) fn update_from(&self, next: &VNode) {
        let (props, attrs) = resolve_props(self.component.declared_props(), next.props());
        for (key, value) in props.entries() {
            self.props.set(&key, value);
        }
        for key in self.props.raw().keys() {
            if !props.contains_key(&key) {
                self.props.delete(&key);
            }
        }

        for key in self.attrs.keys() {
            if !attrs.contains_key(&key) {
                self.attrs.remove(&key);
            }
        }
        for (key, value) in attrs.entries() {
            self.attrs.insert(key, value);
        }

        *self.slots.lock() = normalize_slots(next.children());
        self.set_vnode(next.clone());
    }

    pub(crate) fn mark_unmounted(&self) {
        self.is_unmounted.store(true, Ordering::SeqCst);
        self.is_mounted.store(false, Ordering::SeqCst);
    }

    /// Drop state that may hold references back to the instance.
    pub(crate) fn release(&self) {
        self.render.lock().take();
        self.setup_state.lock().take();
        self.hooks.lock().clear();
        self.slots.lock().clear();
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("uid", &self.uid)
            .field("name", &self.component.name())
            .field("mounted", &self.is_mounted())
            .finish()
    }
}

/// The view of an instance used by its render function.
#[derive(Clone)]
pub struct ComponentContext {
    instance: Arc<ComponentInstance>,
}

impl ComponentContext {
    /// Resolve a name: setup state, then data, then props, then the public
    /// properties `$attrs` and `$props`. Unknown names read as `Null`.
    pub fn get(&self, key: &str) -> Value {
        let setup_state = self.instance.setup_state.lock().clone();
        if let Some(state) = setup_state.filter(|state| state.has(key)) {
            return state.get(key);
        }
        if let Some(data) = self.instance.data().filter(|data| data.has(key)) {
            return data.get(key);
        }
        if self.instance.props.has(key) {
            return self.instance.props.get(key);
        }
        match key {
            "$attrs" => Value::Object(self.instance.attrs.clone()),
            "$props" => Value::Reactive(self.instance.props.clone()),
            _ => Value::Null,
        }
    }

    /// Write setup state or data. Props are read-only.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let setup_state = self.instance.setup_state.lock().clone();
        if let Some(state) = setup_state.filter(|state| state.has(key)) {
            state.set(key, value);
            return Ok(());
        }
        if let Some(data) = self.instance.data().filter(|data| data.has(key)) {
            data.set(key, value);
            return Ok(());
        }
        if self.instance.props.raw().contains_key(key) {
            let err = Error::ReadonlyProp {
                key: key.to_string(),
            };
            diagnostic!(component = ?self.instance.component.name(), "{err}");
            return Err(err);
        }
        Ok(())
    }

    /// Declared props.
    pub fn props(&self) -> &Reactive {
        &self.instance.props
    }

    /// Undeclared props.
    pub fn attrs(&self) -> &Object {
        &self.instance.attrs
    }

    /// Render the named slot, or nothing if the parent did not supply it.
    pub fn slot(&self, name: &str, args: &[Value]) -> Vec<VNode> {
        let slot = self.instance.slots.lock().get(name).cloned();
        slot.map(|slot| slot(args)).unwrap_or_default()
    }

    pub fn has_slot(&self, name: &str) -> bool {
        self.instance.slots.lock().contains_key(name)
    }

    pub fn instance(&self) -> &Arc<ComponentInstance> {
        &self.instance
    }
}

impl fmt::Debug for ComponentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComponentContext").field(&self.instance).finish()
    }
}

fn resolve_props(declared: &[String], raw: Option<&Props>) -> (Object, Object) {
    let props = Object::new();
    let attrs = Object::new();
    for name in declared {
        props.insert(name.clone(), Value::Null);
    }
    if let Some(raw) = raw {
        for (key, value) in raw {
            if key == "key" {
                continue;
            }
            if declared.iter().any(|name| name == key) {
                props.insert(key.clone(), value.clone());
            } else {
                attrs.insert(key.clone(), value.clone());
            }
        }
    }
    (props, attrs)
}

fn normalize_slots(children: &Children) -> Slots {
    let mut slots = Slots::new();
    match children {
        Children::None => {}
        Children::Slots(given) => slots = given.clone(),
        Children::Array(nodes) => {
            let nodes = nodes.clone();
            let slot: Slot = Arc::new(move |_| nodes.clone());
            slots.insert("default".to_string(), slot);
        }
        Children::Text(text) => {
            let text = text.clone();
            let slot: Slot = Arc::new(move |_| vec![create_text_vnode(text.clone())]);
            slots.insert("default".to_string(), slot);
        }
    }
    slots
}

/// Whether a parent re-render must re-render this child.
pub fn should_update_component(prev: &VNode, next: &VNode) -> bool {
    if !prev.children().is_none() || !next.children().is_none() {
        return true;
    }
    match (prev.props(), next.props()) {
        (None, None) => false,
        (Some(prev), Some(next)) => has_props_changed(prev, next),
        (Some(props), None) | (None, Some(props)) => !props.is_empty(),
    }
}

fn has_props_changed(prev: &Props, next: &Props) -> bool {
    if prev.len() != next.len() {
        return true;
    }
    next.iter().any(|(key, value)| {
        prev.get(key)
            .map_or(true, |previous| !Value::same(previous, value))
    })
}

/// Build the instance's state: props, setup, data, render function.
pub(crate) fn setup_component(instance: &Arc<ComponentInstance>) {
    let component = instance.component.clone();
    let def = &component.def;

    // setup may run inside a parent's render effect; its reads belong to
    // nobody
    instance.scope.run(|| untracked(|| {
        let _current = CurrentInstanceGuard::enter(instance.clone());

        if let Some(setup) = &def.setup {
            let context = SetupContext {
                attrs: instance.attrs.clone(),
                slots: instance.slots.lock().clone(),
            };
            match setup(&instance.props, &context) {
                SetupResult::State(state) => *instance.setup_state.lock() = Some(proxy_refs(state)),
                SetupResult::Render(render) => *instance.render.lock() = Some(render),
                SetupResult::None => {}
            }
        }

        match &def.data {
            Some(DataOption::Factory(factory)) => {
                let state = factory(&instance.props);
                match state {
                    Value::Object(object) => *instance.data.lock() = Some(Reactive::new(object)),
                    Value::Reactive(reactive) => *instance.data.lock() = Some(reactive),
                    _ => diagnostic!(
                        component = ?def.name,
                        "data() should return an object"
                    ),
                }
            }
            Some(DataOption::Value(_)) => {
                if let Err(err) = component.validate() {
                    diagnostic!(component = ?def.name, "{err}");
                }
            }
            None => {}
        }
    }));

    let mut render = instance.render.lock();
    if render.is_none() {
        *render = def.render.clone();
    }
    debug!(uid = instance.uid, component = ?def.name, "component set up");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props;
    use crate::render::vnode::h;

    #[test]
    fn declared_props_and_attrs_are_split() {
        let (props, attrs) = resolve_props(
            &["title".to_string(), "missing".to_string()],
            Some(&props! { "key" => 1, "title" => "hi", "class" => "big" }),
        );
        assert_eq!(props.get("title"), Some(Value::from("hi")));
        assert_eq!(props.get("missing"), Some(Value::Null));
        assert_eq!(attrs.keys(), vec!["class".to_string()]);
        assert!(!props.contains_key("key") && !attrs.contains_key("key"));
    }

    #[test]
    fn props_change_detection() {
        let comp = ComponentOptions::new().build();
        let a = h(&comp, Some(props! { "n" => 1 }), ());
        let b = h(&comp, Some(props! { "n" => 1 }), ());
        let c = h(&comp, Some(props! { "n" => 2 }), ());
        let d = h(&comp, Some(props! { "n" => 1, "m" => 1 }), ());
        assert!(!should_update_component(&a, &b));
        assert!(should_update_component(&a, &c));
        assert!(should_update_component(&a, &d));

        let with_slot = h(&comp, None, vec![h("p", None, ())]);
        assert!(should_update_component(&with_slot, &with_slot));
    }

    #[test]
    fn plain_data_value_fails_validation() {
        let comp = ComponentOptions::new()
            .name("Counter")
            .data_value(crate::reactive::Object::new())
            .build();
        assert!(matches!(
            comp.validate(),
            Err(Error::DataNotFunction { component: Some(name) }) if name == "Counter"
        ));
    }

    #[test]
    fn array_children_become_the_default_slot() {
        let slots = normalize_slots(&Children::Array(vec![h("p", None, "x")]));
        assert_eq!(slots["default"](&[]).len(), 1);
        assert!(normalize_slots(&Children::None).is_empty());
    }

    #[test]
    fn context_resolves_setup_then_data_then_props() {
        let comp = ComponentOptions::new()
            .props(["label", "shared"])
            .data(|_| Value::from(serde_json::json!({"count": 1, "shared": "data"})))
            .setup(|_, _| SetupResult::State(Value::from(serde_json::json!({"shared": "setup"}))))
            .build();
        let vnode = h(&comp, Some(props! { "label" => "hi", "shared" => "prop" }), ());
        let instance = ComponentInstance::new(comp, vnode);
        setup_component(&instance);

        let ctx = instance.context();
        assert_eq!(ctx.get("shared"), Value::from("setup"));
        assert_eq!(ctx.get("count"), Value::from(1));
        assert_eq!(ctx.get("label"), Value::from("hi"));
        assert_eq!(ctx.get("nothing"), Value::Null);

        assert!(ctx.set("count", 2).is_ok());
        assert_eq!(ctx.get("count"), Value::from(2));
        assert!(matches!(ctx.set("label", "x"), Err(Error::ReadonlyProp { key }) if key == "label"));
        assert_eq!(ctx.get("label"), Value::from("hi"));
    }
}
