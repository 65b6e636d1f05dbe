//! Instance event emitter and parent-listener wiring.

use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::Value;

use crate::debug::handle_error;
use crate::error::HookError;
use crate::instance::{ComponentInstance, InstanceRef};

pub type Listener = Rc<dyn Fn(&[Value]) -> Result<(), HookError>>;
pub type Listeners = BTreeMap<String, Vec<Listener>>;

/// Attaches the listeners the parent declared on this component's tag.
pub fn init_events(vm: &InstanceRef) {
    let mut vm = vm.borrow_mut();
    vm.events.clear();
    if let Some(listeners) = vm.options.parent_listeners.clone() {
        for (event, handlers) in listeners {
            for handler in handlers {
                vm.on(&event, handler);
            }
        }
    }
}

impl ComponentInstance {
    pub fn on(&mut self, event: &str, listener: Listener) {
        self.events.entry(event.to_string()).or_default().push(listener);
    }

    /// Removes one listener (by identity) or, with `None`, every listener for `event`.
    pub fn off(&mut self, event: &str, listener: Option<&Listener>) {
        match listener {
            None => {
                self.events.remove(event);
            }
            Some(listener) => {
                if let Some(handlers) = self.events.get_mut(event) {
                    handlers.retain(|handler| !Rc::ptr_eq(handler, listener));
                }
            }
        }
    }

    /// Invokes every listener for `event` in registration order.
    /// Listener errors are reported and do not stop later listeners.
    pub fn emit(&mut self, event: &str, args: &[Value]) {
        let Some(handlers) = self.events.get(event).cloned() else {
            return;
        };
        let info = format!("event handler for \"{}\"", event);
        for handler in handlers {
            if let Err(err) = handler(args) {
                handle_error(&err, self, &info);
            }
        }
    }

    pub fn has_listeners(&self, event: &str) -> bool {
        self.events.get(event).is_some_and(|handlers| !handlers.is_empty())
    }
}
