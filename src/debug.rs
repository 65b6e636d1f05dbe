//! Advisory warnings and user-error reporting.

use lazy_static::lazy_static;
use regex::Regex;

use crate::config::Config;
use crate::error::HookError;
use crate::instance::{ComponentInstance, InstanceRef};

lazy_static! {
    static ref CLASSIFY_RE: Regex = Regex::new(r"(?:^|[-_])(\w)").unwrap();
}

/// `todo-item` → `TodoItem`
fn classify(name: &str) -> String {
    CLASSIFY_RE
        .replace_all(name, |caps: &regex::Captures| caps[1].to_uppercase())
        .to_string()
}

pub fn format_component_name(vm: &ComponentInstance) -> String {
    if vm.is_root() {
        return "<Root>".to_string();
    }
    let options = vm.options();
    match options.name().or(options.component_tag.as_deref()) {
        Some(name) => format!("<{}>", classify(name)),
        None => "<Anonymous>".to_string(),
    }
}

/// `found in` block listing the instance and its ancestors, innermost first.
pub fn generate_component_trace(vm: &ComponentInstance) -> String {
    let mut names = vec![format_component_name(vm)];
    let mut current = vm.parent();
    while let Some(parent) = current {
        match parent.try_borrow() {
            Ok(parent_vm) => {
                names.push(format_component_name(&parent_vm));
                current = parent_vm.parent();
            }
            Err(_) => {
                names.push("<busy>".to_string());
                break;
            }
        };
    }

    let mut trace = String::from("\n\nfound in\n\n");
    for (depth, name) in names.iter().enumerate() {
        if depth == 0 {
            trace.push_str("---> ");
        } else {
            trace.push_str(&" ".repeat(5 + depth * 2));
        }
        trace.push_str(name);
        trace.push('\n');
    }
    trace
}

pub fn warn(config: &Config, msg: &str, vm: Option<&ComponentInstance>) {
    if config.silent || config.production {
        return;
    }
    let trace = vm.map(generate_component_trace).unwrap_or_default();
    match &config.warn_handler {
        Some(handler) => handler(msg, vm, &trace),
        None => log::warn!("[component warn]: {}{}", msg, trace),
    }
}

/// Reports a user-code error.
///
/// Ancestors' `errorCaptured` hooks see it first, innermost first; a hook
/// returning `false` stops propagation. Otherwise the configured error handler
/// (or the error log) receives it.
pub fn handle_error(err: &HookError, vm: &ComponentInstance, info: &str) {
    let mut current = vm.parent();
    while let Some(parent) = current {
        let Ok(mut parent_vm) = parent.try_borrow_mut() else {
            log::debug!("skipping busy ancestor while reporting `{}`", info);
            break;
        };
        let hooks = parent_vm.options().error_captured();
        for hook in hooks {
            if !hook(&mut *parent_vm, err, info) {
                return;
            }
        }
        current = parent_vm.parent();
    }
    global_handle_error(err, Some(vm), info);
}

fn global_handle_error(err: &HookError, vm: Option<&ComponentInstance>, info: &str) {
    let config = match vm {
        Some(vm) => vm.config().clone(),
        None => Default::default(),
    };
    match &config.error_handler {
        Some(handler) => handler(err, vm, info),
        None => {
            let name = vm.map(format_component_name).unwrap_or_default();
            log::error!("Error in {} {}: \"{}\"", info, name, err);
        }
    }
}

/// Runs one user callback against the instance, reporting any error it returns.
pub fn invoke_with_error_handling<T, F>(vm: &InstanceRef, info: &str, f: F) -> Option<T>
where
    F: FnOnce(&mut ComponentInstance) -> Result<T, HookError>,
{
    let mut guard = match vm.try_borrow_mut() {
        Ok(guard) => guard,
        Err(_) => {
            log::error!("cannot run `{}`: component instance is busy", info);
            return None;
        }
    };
    match f(&mut *guard) {
        Ok(value) => Some(value),
        Err(err) => {
            handle_error(&err, &guard, info);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify("todo-item"), "TodoItem");
        assert_eq!(classify("my_widget"), "MyWidget");
        assert_eq!(classify("Card"), "Card");
    }
}
