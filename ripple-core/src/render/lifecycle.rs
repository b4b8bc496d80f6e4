//! Lifecycle Hooks
//!
//! Hooks are registered from a component's `setup` function, which runs
//! with its instance set as the current instance. The renderer invokes the
//! hooks at the matching points of the instance's life, again with the
//! instance set as current. Reads inside a hook are not tracked by the
//! render effect that happens to be running it.

use std::cell::RefCell;
use std::sync::Arc;

use super::component::ComponentInstance;
use crate::config::diagnostic;
use crate::reactive::untracked;

/// Points in a component's life at which hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleHook {
    BeforeMount,
    Mounted,
    BeforeUpdate,
    Updated,
    BeforeUnmount,
    Unmounted,
}

/// A registered hook.
pub type Hook = Arc<dyn Fn() + Send + Sync>;

thread_local! {
    static CURRENT_INSTANCE: RefCell<Vec<Arc<ComponentInstance>>> = const { RefCell::new(Vec::new()) };
}

/// Makes an instance current until dropped.
pub(crate) struct CurrentInstanceGuard;

impl CurrentInstanceGuard {
    pub(crate) fn enter(instance: Arc<ComponentInstance>) -> Self {
        CURRENT_INSTANCE.with(|stack| stack.borrow_mut().push(instance));
        Self
    }
}

impl Drop for CurrentInstanceGuard {
    fn drop(&mut self) {
        CURRENT_INSTANCE.with(|stack| stack.borrow_mut().pop());
    }
}

/// The instance whose setup (or hook, or render) is running.
pub fn get_current_instance() -> Option<Arc<ComponentInstance>> {
    CURRENT_INSTANCE.with(|stack| stack.borrow().last().cloned())
}

fn inject_hook(kind: LifecycleHook, hook: Hook) {
    match get_current_instance() {
        Some(instance) => instance.add_hook(kind, hook),
        None => diagnostic!(
            hook = ?kind,
            "lifecycle hook registered with no active component instance; hooks can only be registered during setup()"
        ),
    }
}

pub(crate) fn invoke_hooks(instance: &Arc<ComponentInstance>, kind: LifecycleHook) {
    let hooks = instance.hooks(kind);
    if hooks.is_empty() {
        return;
    }
    let _current = CurrentInstanceGuard::enter(instance.clone());
    untracked(|| {
        for hook in hooks {
            hook();
        }
    });
}

/// Run `f` before the component's first render.
pub fn on_before_mount(f: impl Fn() + Send + Sync + 'static) {
    inject_hook(LifecycleHook::BeforeMount, Arc::new(f));
}

/// Run `f` after the component's subtree was first inserted.
pub fn on_mounted(f: impl Fn() + Send + Sync + 'static) {
    inject_hook(LifecycleHook::Mounted, Arc::new(f));
}

/// Run `f` before each re-render.
pub fn on_before_update(f: impl Fn() + Send + Sync + 'static) {
    inject_hook(LifecycleHook::BeforeUpdate, Arc::new(f));
}

/// Run `f` after each re-render was patched into the host tree.
pub fn on_updated(f: impl Fn() + Send + Sync + 'static) {
    inject_hook(LifecycleHook::Updated, Arc::new(f));
}

/// Run `f` before the component is torn down.
pub fn on_before_unmount(f: impl Fn() + Send + Sync + 'static) {
    inject_hook(LifecycleHook::BeforeUnmount, Arc::new(f));
}

/// Run `f` once the component has been torn down.
pub fn on_unmounted(f: impl Fn() + Send + Sync + 'static) {
    inject_hook(LifecycleHook::Unmounted, Arc::new(f));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::component::ComponentOptions;
    use crate::render::vnode::h;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn hooks_outside_setup_are_dropped() {
        assert!(get_current_instance().is_none());
        on_mounted(|| panic!("never registered"));
    }

    #[test]
    fn current_instance_nests_and_restores() {
        let comp = ComponentOptions::new().build();
        let outer = ComponentInstance::new(comp.clone(), h(&comp, None, ()));
        let inner = ComponentInstance::new(comp.clone(), h(&comp, None, ()));

        let _outer = CurrentInstanceGuard::enter(outer.clone());
        {
            let _inner = CurrentInstanceGuard::enter(inner.clone());
            let current = get_current_instance().map(|i| i.uid());
            assert_eq!(current, Some(inner.uid()));
        }
        assert_eq!(get_current_instance().map(|i| i.uid()), Some(outer.uid()));
    }

    #[test]
    fn invoked_hooks_see_their_instance() {
        let comp = ComponentOptions::new().build();
        let instance = ComponentInstance::new(comp.clone(), h(&comp, None, ()));
        let hits = Arc::new(AtomicUsize::new(0));

        {
            let _current = CurrentInstanceGuard::enter(instance.clone());
            let hits = hits.clone();
            let uid = instance.uid();
            on_updated(move || {
                assert_eq!(get_current_instance().map(|i| i.uid()), Some(uid));
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }

        invoke_hooks(&instance, LifecycleHook::Updated);
        invoke_hooks(&instance, LifecycleHook::Mounted);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        instance.release();
    }
}
