//! Mounting: render, expand child components, write the result into the host tree.

use std::rc::Rc;

use crate::debug::handle_error;
use crate::dom::{self, Handle};
use crate::error::Result;
use crate::init::{InstantiationKind, InternalComponentOptions};
use crate::instance::{ComponentInstance, InstanceRef};
use crate::lifecycle::call_hook;
use crate::options::{LifecycleHook, TemplateOption};
use crate::render::render_with_proxy;
use crate::runtime::Runtime;
use crate::vnode::{ComponentVNode, ElementVNode, VNode};

/// Turns an instance with a render function into host nodes.
pub trait Mounter {
    /// `target` is the host element to replace, if any. Returns the mounted instance.
    fn mount(
        &self,
        rt: &Runtime,
        vm: &InstanceRef,
        target: Option<Handle>,
        hydrating: bool,
    ) -> Result<InstanceRef>;
}

/// Default mounter: renders the whole tree and replaces the target element.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatchMounter;

impl Mounter for PatchMounter {
    fn mount(
        &self,
        rt: &Runtime,
        vm: &InstanceRef,
        target: Option<Handle>,
        hydrating: bool,
    ) -> Result<InstanceRef> {
        {
            let mut guard = vm.borrow_mut();
            guard.el = target.clone();
            if guard.options.render().is_none() {
                let has_markup = match guard.options.template() {
                    Some(TemplateOption::Markup(markup)) => !markup.starts_with('#'),
                    Some(_) => true,
                    None => false,
                };
                let msg = if has_markup || guard.options.el().is_some() || target.is_some() {
                    "You are using the runtime-only build where the template compiler is not available. Either pre-compile the templates into render functions, or use a runtime with a template compiler."
                } else {
                    "Failed to mount component: template or render function not defined."
                };
                guard.warn(msg);
            }
        }
        call_hook(vm, LifecycleHook::BeforeMount);

        let rendered = render_instance(vm);
        let mut queue = Vec::new();
        let tree = expand(rt, vm, rendered, &mut queue)?;
        vm.borrow_mut().vnode = Some(tree.clone());

        if vm.borrow().parent_vnode.is_some() {
            // Children get `mounted` once the root's patch lands.
            vm.borrow_mut().pending_mounted = queue;
            return Ok(vm.clone());
        }

        let el = patch(vm, target.as_ref(), &tree, hydrating);
        vm.borrow_mut().el = el;

        for child in queue {
            child.borrow_mut().is_mounted = true;
            call_hook(&child, LifecycleHook::Mounted);
        }
        vm.borrow_mut().is_mounted = true;
        call_hook(vm, LifecycleHook::Mounted);
        Ok(vm.clone())
    }
}

fn render_instance(vm: &InstanceRef) -> VNode {
    let guard = vm.borrow();
    let Some(render) = guard.options.render().cloned() else {
        return VNode::empty();
    };
    match render_with_proxy(&guard, &render) {
        Ok(vnode) => vnode,
        Err(err) => {
            handle_error(&err, &guard, "render");
            VNode::empty()
        }
    }
}

/// Instantiates every component placeholder in `node` and splices in its
/// rendered subtree. Instances land in `queue` in post-order.
fn expand(
    rt: &Runtime,
    parent: &InstanceRef,
    node: VNode,
    queue: &mut Vec<InstanceRef>,
) -> Result<VNode> {
    match node {
        VNode::Component(placeholder) => {
            let child = create_component_instance(rt, parent, placeholder)?;
            rt.mount(&child, None, false)?;
            let mut guard = child.borrow_mut();
            queue.append(&mut guard.pending_mounted);
            let subtree = guard.vnode.clone().unwrap_or_else(VNode::empty);
            drop(guard);
            queue.push(child);
            Ok(subtree)
        }
        VNode::Element(el) => {
            let ElementVNode {
                tag,
                attrs,
                children,
                is_static,
            } = el;
            let children = children
                .into_iter()
                .map(|child| expand(rt, parent, child, queue))
                .collect::<Result<Vec<_>>>()?;
            Ok(VNode::Element(ElementVNode {
                tag,
                attrs,
                children,
                is_static,
            }))
        }
        other => Ok(other),
    }
}

/// Creates a child through the fast path. The parent must not be borrowed.
pub fn create_component_instance(
    rt: &Runtime,
    parent: &InstanceRef,
    vnode: Rc<ComponentVNode>,
) -> Result<InstanceRef> {
    let ctor = vnode.ctor.clone();
    rt.resolve_constructor_options(&ctor)?;
    let child = ComponentInstance::allocate(ctor, rt.config().clone());
    rt.initialize(
        &child,
        InstantiationKind::ChildFastPath(InternalComponentOptions::new(parent, vnode)),
    )?;
    Ok(child)
}

/// Writes `tree` into the host. Returns the element now representing the instance.
fn patch(vm: &InstanceRef, target: Option<&Handle>, tree: &VNode, hydrating: bool) -> Option<Handle> {
    let html = tree.to_html();

    if hydrating {
        if let Some(target) = target {
            if dom::outer_html(target) == html {
                return Some(target.clone());
            }
            vm.borrow().warn(
                "The client-side rendered virtual DOM tree is not matching server-rendered content. Bailing hydration and performing full client-side render.",
            );
        }
    }

    let nodes = match dom::parse_nodes(&html) {
        Ok(nodes) => nodes,
        Err(err) => {
            log::error!("failed to materialize rendered markup: {}", err);
            return target.cloned();
        }
    };
    let first = nodes.first().cloned();
    if let Some(target) = target {
        if !dom::replace_node(target, nodes) {
            log::debug!("mount target is detached; rendered nodes are kept off-document");
        }
    }
    first
}
