//! Render context: what a render function can see of its instance.

use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::Value;

use crate::class::{class_for_entry, ComponentClass};
use crate::debug::handle_error;
use crate::error::HookError;
use crate::events::Listener;
use crate::instance::{ComponentInstance, InstanceRef};
use crate::vnode::VNode;

pub type RenderFn = Rc<dyn Fn(&dyn RenderContext) -> Result<VNode, HookError>>;

/// The surface render functions are written against.
pub trait RenderContext {
    /// Reads an instance property; dotted paths walk into objects and arrays.
    fn lookup(&self, path: &str) -> Option<Value>;

    fn apply_filter(&self, name: &str, value: Value) -> Value;

    /// Renders (once) and returns the hoisted static tree at `index`.
    fn render_static(&self, index: usize) -> VNode;

    /// Resolves a tag against the instance's `components` registry.
    fn resolve_component(&self, tag: &str) -> Option<Rc<ComponentClass>>;

    /// Listener that calls `method` on the rendering instance.
    fn bind_listener(&self, method: &str) -> Listener;

    fn slot(&self, name: &str) -> Vec<VNode>;

    fn warn(&self, msg: &str);
}

/// Which context wraps the instance while it renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderProxy {
    Identity,
    /// Reads of undeclared properties produce a warning.
    Dev,
}

/// Direct access to an instance.
pub struct InstanceScope<'a> {
    vm: &'a ComponentInstance,
}

impl<'a> InstanceScope<'a> {
    pub fn new(vm: &'a ComponentInstance) -> Self {
        Self { vm }
    }
}

impl RenderContext for InstanceScope<'_> {
    fn lookup(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.');
        let mut value = self.vm.get(segments.next()?.trim())?;
        for segment in segments {
            value = match value {
                Value::Object(mut map) => map.remove(segment.trim())?,
                Value::Array(mut items) => {
                    let index: usize = segment.trim().parse().ok()?;
                    if index >= items.len() {
                        return None;
                    }
                    items.swap_remove(index)
                }
                _ => return None,
            };
        }
        Some(value)
    }

    fn apply_filter(&self, name: &str, value: Value) -> Value {
        match self.vm.resolve_filter(name) {
            Some(filter) => filter(value),
            None => {
                self.vm.warn(&format!("Failed to resolve filter: {}", name));
                value
            }
        }
    }

    fn render_static(&self, index: usize) -> VNode {
        if let Some(tree) = self.vm.static_trees.borrow().get(&index) {
            return tree.clone();
        }
        let Some(render) = self
            .vm
            .options
            .static_render_fns()
            .and_then(|fns| fns.get(index))
            .cloned()
        else {
            self.vm
                .warn(&format!("Static render function {} is missing.", index));
            return VNode::empty();
        };
        let tree = match render(self) {
            Ok(VNode::Element(mut el)) => {
                el.is_static = true;
                VNode::Element(el)
            }
            Ok(other) => other,
            Err(err) => {
                handle_error(&err, self.vm, "render");
                VNode::empty()
            }
        };
        self.vm.static_trees.borrow_mut().insert(index, tree.clone());
        tree
    }

    fn resolve_component(&self, tag: &str) -> Option<Rc<ComponentClass>> {
        let Some(entry) = self
            .vm
            .options
            .components()
            .and_then(|components| components.resolve(tag))
        else {
            if !self.vm.config.is_ignored_element(tag) {
                self.vm.warn(&format!(
                    "Unknown custom element: <{}> - did you register the component correctly? For recursive components, make sure to provide the \"name\" option.",
                    tag
                ));
            }
            return None;
        };
        let base = self.vm.ctor.base_class();
        match class_for_entry(entry, &base, &self.vm.config) {
            Ok(class) => class,
            Err(err) => {
                self.vm
                    .warn(&format!("Failed to resolve component <{}>: {}", tag, err));
                None
            }
        }
    }

    fn bind_listener(&self, method: &str) -> Listener {
        if !self.vm.methods.contains_key(method) {
            self.vm.warn(&format!(
                "Handler \"{}\" is not defined on the instance.",
                method
            ));
        }
        let target = self.vm.self_ref.clone();
        let method = method.to_string();
        Rc::new(move |args: &[Value]| {
            let vm = target
                .upgrade()
                .ok_or_else(|| HookError::new("listener target was dropped"))?;
            let mut vm = vm
                .try_borrow_mut()
                .map_err(|_| HookError::new("listener target is busy"))?;
            vm.call_method(&method, args).map(|_| ())
        })
    }

    fn slot(&self, name: &str) -> Vec<VNode> {
        self.vm.slots.get(name).cloned().unwrap_or_default()
    }

    fn warn(&self, msg: &str) {
        self.vm.warn(msg);
    }
}

/// Development wrapper that flags template reads of undeclared properties.
pub struct DevProxy<'a> {
    inner: InstanceScope<'a>,
}

impl<'a> DevProxy<'a> {
    pub fn new(inner: InstanceScope<'a>) -> Self {
        Self { inner }
    }
}

impl RenderContext for DevProxy<'_> {
    fn lookup(&self, path: &str) -> Option<Value> {
        let key = path.split('.').next().unwrap_or(path).trim();
        if !self.inner.vm.has(key) {
            self.inner.vm.warn(&format!(
                "Property or method \"{}\" is not defined on the instance but referenced during render.",
                key
            ));
        }
        self.inner.lookup(path)
    }

    fn apply_filter(&self, name: &str, value: Value) -> Value {
        self.inner.apply_filter(name, value)
    }

    fn render_static(&self, index: usize) -> VNode {
        self.inner.render_static(index)
    }

    fn resolve_component(&self, tag: &str) -> Option<Rc<ComponentClass>> {
        self.inner.resolve_component(tag)
    }

    fn bind_listener(&self, method: &str) -> Listener {
        self.inner.bind_listener(method)
    }

    fn slot(&self, name: &str) -> Vec<VNode> {
        self.inner.slot(name)
    }

    fn warn(&self, msg: &str) {
        self.inner.warn(msg)
    }
}

/// Runs `render` against `vm` through the instance's configured proxy.
pub fn render_with_proxy(vm: &ComponentInstance, render: &RenderFn) -> Result<VNode, HookError> {
    let scope = InstanceScope::new(vm);
    match vm.render_proxy {
        RenderProxy::Dev => render(&DevProxy::new(scope)),
        RenderProxy::Identity => render(&scope),
    }
}

/// Prepares the slot context before any hook runs.
pub fn init_render(vm: &InstanceRef) {
    let mut vm = vm.borrow_mut();
    vm.vnode = None;
    vm.static_trees.borrow_mut().clear();
    vm.parent_vnode = vm.options.parent_vnode.clone();
    let slots = vm
        .options
        .render_children
        .as_deref()
        .map(resolve_slots)
        .unwrap_or_default();
    vm.slots = slots;
}

/// Groups rendered children by their `slot` attribute; the rest go to `default`.
/// Slots holding only whitespace are dropped.
pub fn resolve_slots(children: &[VNode]) -> BTreeMap<String, Vec<VNode>> {
    let mut slots: BTreeMap<String, Vec<VNode>> = BTreeMap::new();
    for child in children {
        match child {
            VNode::Element(el) if child.attr("slot").is_some() => {
                let name = child.attr("slot").unwrap_or("default").to_string();
                let slot = slots.entry(name).or_default();
                if el.tag == "template" {
                    slot.extend(el.children.iter().cloned());
                } else {
                    slot.push(child.clone());
                }
            }
            _ => slots
                .entry("default".to_string())
                .or_default()
                .push(child.clone()),
        }
    }
    slots.retain(|_, nodes| !nodes.iter().all(VNode::is_whitespace));
    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_slots_groups_by_name() {
        let children = vec![
            VNode::element(
                "h1",
                vec![("slot".into(), "header".into())],
                vec![VNode::text("Title")],
            ),
            VNode::text("  "),
            VNode::element("p", vec![], vec![VNode::text("body")]),
            VNode::element(
                "template",
                vec![("slot".into(), "footer".into())],
                vec![VNode::text("a"), VNode::text("b")],
            ),
        ];
        let slots = resolve_slots(&children);
        assert_eq!(slots["header"].len(), 1);
        assert_eq!(slots["default"].len(), 2);
        assert_eq!(slots["footer"].len(), 2);
    }

    #[test]
    fn test_whitespace_only_slot_is_dropped() {
        let slots = resolve_slots(&[VNode::text(" "), VNode::text("\n")]);
        assert!(slots.is_empty());
    }
}
