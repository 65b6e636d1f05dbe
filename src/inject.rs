//! Dependency injection between ancestors and descendants.

use crate::debug::invoke_with_error_handling;
use crate::instance::InstanceRef;
use crate::options::Record;

/// Resolves `inject` against the values provided by ancestors, nearest first.
pub fn init_injections(vm: &InstanceRef) {
    let (declared, mut current) = {
        let vm = vm.borrow();
        (vm.options.inject(), vm.parent())
    };
    if declared.is_empty() {
        return;
    }

    let mut resolved = Record::new();
    let mut pending = declared;
    while let Some(ancestor) = current {
        if pending.is_empty() {
            break;
        }
        let Ok(ancestor) = ancestor.try_borrow() else {
            log::debug!("skipping busy ancestor while resolving injections");
            break;
        };
        pending.retain(|key, opts| match ancestor.provided.get(&opts.from) {
            Some(value) => {
                resolved.insert(key.clone(), value.clone());
                false
            }
            None => true,
        });
        current = ancestor.parent();
    }

    let mut vm = vm.borrow_mut();
    for (key, opts) in pending {
        match opts.default {
            Some(default) => {
                resolved.insert(key, default);
            }
            None => vm.warn(&format!("Injection \"{}\" not found", key)),
        }
    }
    vm.injected = resolved;
}

/// Evaluates `provide` once state is ready, so it may read instance data.
pub fn init_provide(vm: &InstanceRef) {
    let provide = vm.borrow().options.provide().cloned();
    let Some(provide) = provide else {
        return;
    };
    let provided = invoke_with_error_handling(vm, "provide()", |vm| provide.evaluate(vm));
    if let Some(provided) = provided {
        vm.borrow_mut().provided = provided;
    }
}
