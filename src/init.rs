//! Instance initialization: the ordered setup phases every instance goes through.

use std::rc::{Rc, Weak};

use crate::class::resolve_constructor_options;
use crate::debug::format_component_name;
use crate::error::{Error, Result};
use crate::events::init_events;
use crate::inject::{init_injections, init_provide};
use crate::instance::{next_uid, InitPhase, InstanceOptions, InstanceRef, WeakInstance};
use crate::lifecycle::{call_hook, init_lifecycle};
use crate::merge::merge_options;
use crate::options::{ComponentOptions, LifecycleHook};
use crate::render::{init_render, RenderFn, RenderProxy};
use crate::runtime::Runtime;
use crate::state::init_state;
use crate::vnode::ComponentVNode;

/// Per-instantiation fields handed to a child created while its parent renders.
#[derive(Clone)]
pub struct InternalComponentOptions {
    pub parent: WeakInstance,
    pub parent_vnode: Rc<ComponentVNode>,
    /// Inline render function supplied for this one instantiation.
    pub render: Option<RenderFn>,
    pub static_render_fns: Option<Vec<RenderFn>>,
}

impl InternalComponentOptions {
    pub fn new(parent: &InstanceRef, parent_vnode: Rc<ComponentVNode>) -> Self {
        Self {
            parent: Rc::downgrade(parent),
            parent_vnode,
            render: None,
            static_render_fns: None,
        }
    }
}

/// How an instance's options are produced.
pub enum InstantiationKind {
    /// Explicit instantiation: the definition is merged over the class's resolved options.
    Root(ComponentOptions),
    /// Child created during patch: links to the class options, no merge.
    ChildFastPath(InternalComponentOptions),
}

fn advance(vm: &InstanceRef, phase: InitPhase) {
    let mut guard = vm.borrow_mut();
    log::trace!("instance {} entered phase {}", guard.uid, phase.as_str());
    guard.phase = phase;
}

/// Runs every setup phase on a freshly allocated instance.
///
/// User-code failures inside hooks and state initializers are reported and
/// initialization carries on. Malformed options and resolver failures are
/// returned as errors.
pub fn initialize(rt: &Runtime, vm: &InstanceRef, kind: InstantiationKind) -> Result<()> {
    {
        let guard = vm
            .try_borrow()
            .map_err(|_| Error::InstanceBusy { phase: "init" })?;
        if guard.phase != InitPhase::Allocated {
            guard.warn(
                "Component instance is already initialized; initialize must be called once on a freshly allocated instance.",
            );
            return Ok(());
        }
    }

    let uid = next_uid();
    {
        let mut guard = vm.borrow_mut();
        guard.uid = uid;
        guard.skip_observation = true;
        guard.phase = InitPhase::Identified;
    }

    let start_tag = format!("perf-start:{}", uid);
    let end_tag = format!("perf-end:{}", uid);
    let measure = rt.perf_active();
    if measure {
        rt.perf().mark(&start_tag);
    }

    match kind {
        InstantiationKind::ChildFastPath(opts) => init_internal_component(vm, opts),
        InstantiationKind::Root(definition) => {
            let ctor = vm.borrow().ctor.clone();
            let resolved = resolve_constructor_options(&ctor, rt.config())?;
            let merged = {
                let guard = vm.borrow();
                merge_options(&resolved, &definition, Some(&*guard), rt.config())?
            };
            vm.borrow_mut().options = InstanceOptions::merged(merged);
        }
    }
    advance(vm, InitPhase::OptionsResolved);

    {
        let mut guard = vm.borrow_mut();
        guard.render_proxy = if rt.config().dev_mode() {
            RenderProxy::Dev
        } else {
            RenderProxy::Identity
        };
        guard.phase = InitPhase::ProxyInstalled;
    }

    {
        let mut guard = vm.borrow_mut();
        guard.self_ref = Rc::downgrade(vm);
        guard.phase = InitPhase::SelfExposed;
    }

    init_lifecycle(vm);
    advance(vm, InitPhase::LifecycleWired);
    init_events(vm);
    advance(vm, InitPhase::EventsWired);
    init_render(vm);
    advance(vm, InitPhase::RenderWired);

    call_hook(vm, LifecycleHook::BeforeCreate);
    advance(vm, InitPhase::BeforeCreate);
    init_injections(vm);
    advance(vm, InitPhase::InjectionsResolved);
    init_state(vm);
    advance(vm, InitPhase::StateReady);
    init_provide(vm);
    advance(vm, InitPhase::Provided);
    call_hook(vm, LifecycleHook::Created);
    advance(vm, InitPhase::Created);

    if measure {
        rt.perf().mark(&end_tag);
        let name = format_component_name(&vm.borrow());
        rt.perf()
            .measure(&format!("{} init", name), &start_tag, &end_tag);
    }

    let el = vm.borrow().options.el().cloned();
    if let Some(el) = el {
        rt.mount(vm, Some(el), false)?;
    }
    Ok(())
}

/// Fast path for children created during patch: the options link to the
/// class's options and only the per-instantiation fields are copied.
fn init_internal_component(vm: &InstanceRef, internal: InternalComponentOptions) {
    let mut guard = vm.borrow_mut();
    let mut options = InstanceOptions::linked(guard.ctor.options());

    let vnode = internal.parent_vnode;
    options.parent = Some(Weak::clone(&internal.parent));
    options.props_data = Some(vnode.props_data.clone());
    options.parent_listeners = Some(vnode.listeners.clone());
    options.render_children = Some(vnode.children.clone());
    options.component_tag = Some(vnode.tag.clone());
    options.parent_vnode = Some(vnode);

    if let Some(render) = internal.render {
        options.set_render(render, internal.static_render_fns.unwrap_or_default());
    }
    guard.options = options;
}
