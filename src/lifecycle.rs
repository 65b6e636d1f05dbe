//! Tree wiring and hook invocation.

use std::rc::Rc;

use crate::debug::invoke_with_error_handling;
use crate::instance::{InstanceRef, WeakInstance};
use crate::options::LifecycleHook;

/// Links the instance under its first non-abstract ancestor and resets the
/// mount-state flags.
pub fn init_lifecycle(vm: &InstanceRef) {
    let parent = vm.borrow().options.parent.as_ref().and_then(|p| p.upgrade());
    let is_abstract = vm.borrow().options.is_abstract();

    let mut parent = parent;
    if !is_abstract {
        while let Some(candidate) = parent.clone() {
            let next = {
                let candidate = candidate.borrow();
                if !candidate.options.is_abstract() {
                    break;
                }
                candidate.parent()
            };
            match next {
                Some(next) => parent = Some(next),
                None => break,
            }
        }
        if let Some(parent) = &parent {
            parent.borrow_mut().children.push(vm.clone());
        }
    }

    let root: Option<WeakInstance> = parent.as_ref().map(|parent| {
        parent
            .borrow()
            .root
            .clone()
            .unwrap_or_else(|| Rc::downgrade(parent))
    });

    let mut vm = vm.borrow_mut();
    vm.parent = parent.as_ref().map(Rc::downgrade);
    vm.root = root;
    vm.children.clear();
    vm.is_mounted = false;
    vm.is_destroyed = false;
    vm.is_being_destroyed = false;
    vm.inactive = None;
}

/// Invokes every handler for `hook`, ancestors' handlers first. A failing
/// handler is reported and the rest still run.
pub fn call_hook(vm: &InstanceRef, hook: LifecycleHook) {
    let handlers = vm.borrow().options.hook_handlers(hook);
    let info = format!("{} hook", hook);
    for handler in handlers {
        invoke_with_error_handling(vm, &info, |vm| handler(vm));
    }

    let event = format!("hook:{}", hook);
    let has_hook_event = vm.borrow().has_listeners(&event);
    if has_hook_event {
        vm.borrow_mut().emit(&event, &[]);
    }
}
