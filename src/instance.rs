//! Live component instances.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;

use crate::class::ComponentClass;
use crate::config::Config;
use crate::debug::{handle_error, warn};
use crate::dom::Handle;
use crate::error::HookError;
use crate::events::Listeners;
use crate::options::{
    ComponentOptions, ComponentRef, ComputedFn, DataOption, DirectiveDef, ErrorCapturedFn,
    FilterFn, HookFn, InjectOptions, LifecycleHook, MethodFn, MountTarget, PropOptions, Record,
    Registry, TemplateOption, WatchMap,
};
use crate::render::{RenderFn, RenderProxy};
use crate::state::run_watcher;
use crate::vnode::{ComponentVNode, VNode};

pub type InstanceRef = Rc<RefCell<ComponentInstance>>;
pub type WeakInstance = Weak<RefCell<ComponentInstance>>;

static INSTANCE_UID_COUNTER: AtomicU64 = AtomicU64::new(0);

pub(crate) fn next_uid() -> u64 {
    INSTANCE_UID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Initialization progress; phases only ever advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InitPhase {
    Allocated,
    Identified,
    OptionsResolved,
    ProxyInstalled,
    SelfExposed,
    LifecycleWired,
    EventsWired,
    RenderWired,
    BeforeCreate,
    InjectionsResolved,
    StateReady,
    Provided,
    Created,
}

impl InitPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            InitPhase::Allocated => "allocated",
            InitPhase::Identified => "identified",
            InitPhase::OptionsResolved => "options",
            InitPhase::ProxyInstalled => "proxy",
            InitPhase::SelfExposed => "self",
            InitPhase::LifecycleWired => "lifecycle",
            InitPhase::EventsWired => "events",
            InitPhase::RenderWired => "render",
            InitPhase::BeforeCreate => "beforeCreate",
            InitPhase::InjectionsResolved => "injections",
            InitPhase::StateReady => "state",
            InitPhase::Provided => "provide",
            InitPhase::Created => "created",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// INSTANCE OPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// The merged options an instance reads from.
///
/// Root instances own a fully merged object. Child instances created while
/// rendering their parent link to the class's resolved options instead and
/// only own the per-instantiation fields; reads check `own` first, then `proto`.
#[derive(Clone, Default)]
pub struct InstanceOptions {
    proto: Option<Rc<ComponentOptions>>,
    own: ComponentOptions,
    pub parent: Option<WeakInstance>,
    pub parent_vnode: Option<Rc<ComponentVNode>>,
    pub props_data: Option<Record>,
    pub parent_listeners: Option<Listeners>,
    pub render_children: Option<Vec<VNode>>,
    pub component_tag: Option<String>,
}

impl InstanceOptions {
    pub fn merged(options: ComponentOptions) -> Self {
        Self {
            own: options,
            ..Default::default()
        }
    }

    pub fn linked(proto: Rc<ComponentOptions>) -> Self {
        Self {
            proto: Some(proto),
            ..Default::default()
        }
    }

    pub fn proto(&self) -> Option<&Rc<ComponentOptions>> {
        self.proto.as_ref()
    }

    pub fn own(&self) -> &ComponentOptions {
        &self.own
    }

    fn layered<'a, T: ?Sized>(
        &'a self,
        get: fn(&'a ComponentOptions) -> Option<&'a T>,
    ) -> Option<&'a T> {
        get(&self.own).or_else(|| self.proto.as_deref().and_then(get))
    }

    pub fn name(&self) -> Option<&str> {
        self.layered(|o| o.name.as_deref())
    }

    pub fn data(&self) -> Option<&DataOption> {
        self.layered(|o| o.data.as_ref())
    }

    pub fn provide(&self) -> Option<&DataOption> {
        self.layered(|o| o.provide.as_ref())
    }

    pub fn props(&self) -> BTreeMap<String, PropOptions> {
        self.layered(|o| o.props.as_deref())
            .map(|props| props.normalized())
            .unwrap_or_default()
    }

    pub fn inject(&self) -> BTreeMap<String, InjectOptions> {
        self.layered(|o| o.inject.as_deref())
            .map(|inject| inject.normalized())
            .unwrap_or_default()
    }

    pub fn computed(&self) -> Option<&BTreeMap<String, ComputedFn>> {
        self.layered(|o| o.computed.as_deref())
    }

    pub fn methods(&self) -> Option<&BTreeMap<String, MethodFn>> {
        self.layered(|o| o.methods.as_deref())
    }

    pub fn watch(&self) -> Option<&WatchMap> {
        self.layered(|o| o.watch.as_deref())
    }

    pub fn hook_handlers(&self, hook: LifecycleHook) -> Vec<HookFn> {
        self.layered(|o| o.hooks.as_deref())
            .and_then(|hooks| hooks.get(&hook))
            .cloned()
            .unwrap_or_default()
    }

    pub fn error_captured(&self) -> Vec<ErrorCapturedFn> {
        self.layered(|o| o.error_captured.as_deref())
            .cloned()
            .unwrap_or_default()
    }

    pub fn components(&self) -> Option<&Registry<ComponentRef>> {
        self.layered(|o| o.components.as_deref())
    }

    pub fn directives(&self) -> Option<&Registry<DirectiveDef>> {
        self.layered(|o| o.directives.as_deref())
    }

    pub fn filters(&self) -> Option<&Registry<FilterFn>> {
        self.layered(|o| o.filters.as_deref())
    }

    pub fn template(&self) -> Option<&TemplateOption> {
        self.layered(|o| o.template.as_ref())
    }

    pub fn render(&self) -> Option<&RenderFn> {
        self.layered(|o| o.render.as_ref())
    }

    pub fn static_render_fns(&self) -> Option<&Vec<RenderFn>> {
        self.layered(|o| o.static_render_fns.as_deref())
    }

    pub fn el(&self) -> Option<&MountTarget> {
        self.layered(|o| o.el.as_ref())
    }

    pub fn delimiters(&self) -> Option<&(String, String)> {
        self.layered(|o| o.delimiters.as_ref())
    }

    pub fn comments(&self) -> bool {
        self.layered(|o| o.comments.as_ref()).copied().unwrap_or(false)
    }

    pub fn is_abstract(&self) -> bool {
        self.layered(|o| o.is_abstract.as_ref()).copied().unwrap_or(false)
    }

    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.own
            .extra
            .get(key)
            .or_else(|| self.proto.as_deref().and_then(|proto| proto.extra.get(key)))
    }

    /// Installs a compiled render function on this instance's own layer.
    pub fn set_render(&mut self, render: RenderFn, static_render_fns: Vec<RenderFn>) {
        self.own.render = Some(render);
        self.own.static_render_fns = Some(Rc::new(static_render_fns));
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPONENT INSTANCE
// ═══════════════════════════════════════════════════════════════════════════════

pub struct ComponentInstance {
    pub(crate) uid: u64,
    pub(crate) phase: InitPhase,
    pub(crate) ctor: Rc<ComponentClass>,
    pub(crate) config: Rc<Config>,
    pub(crate) options: InstanceOptions,
    /// Bookkeeping fields are never observed as reactive state.
    pub(crate) skip_observation: bool,
    pub(crate) render_proxy: RenderProxy,
    pub(crate) self_ref: WeakInstance,

    pub(crate) parent: Option<WeakInstance>,
    pub(crate) root: Option<WeakInstance>,
    pub(crate) children: Vec<InstanceRef>,
    pub(crate) is_mounted: bool,
    pub(crate) is_destroyed: bool,
    pub(crate) is_being_destroyed: bool,
    pub(crate) inactive: Option<bool>,

    pub(crate) events: Listeners,

    pub(crate) parent_vnode: Option<Rc<ComponentVNode>>,
    pub(crate) vnode: Option<VNode>,
    pub(crate) slots: BTreeMap<String, Vec<VNode>>,
    pub(crate) static_trees: RefCell<BTreeMap<usize, VNode>>,
    /// Descendants rendered into this subtree still waiting for `mounted`.
    pub(crate) pending_mounted: Vec<InstanceRef>,

    pub(crate) injected: Record,
    pub(crate) props: Record,
    pub(crate) data: Record,
    pub(crate) computed: Record,
    pub(crate) methods: BTreeMap<String, MethodFn>,
    pub(crate) watchers: WatchMap,
    pub(crate) provided: Record,

    pub(crate) el: Option<Handle>,
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("uid", &self.uid)
            .field("phase", &self.phase)
            .field("name", &self.options.name())
            .field("is_mounted", &self.is_mounted)
            .field("data", &self.data)
            .field("props", &self.props)
            .field("children", &self.children.len())
            .finish()
    }
}

impl ComponentInstance {
    /// A blank instance of `ctor`; [`crate::Runtime::initialize`] must run next.
    pub fn allocate(ctor: Rc<ComponentClass>, config: Rc<Config>) -> InstanceRef {
        Rc::new(RefCell::new(ComponentInstance {
            uid: 0,
            phase: InitPhase::Allocated,
            ctor,
            config,
            options: InstanceOptions::default(),
            skip_observation: false,
            render_proxy: RenderProxy::Identity,
            self_ref: Weak::new(),
            parent: None,
            root: None,
            children: Vec::new(),
            is_mounted: false,
            is_destroyed: false,
            is_being_destroyed: false,
            inactive: None,
            events: Listeners::new(),
            parent_vnode: None,
            vnode: None,
            slots: BTreeMap::new(),
            static_trees: RefCell::new(BTreeMap::new()),
            pending_mounted: Vec::new(),
            injected: Record::new(),
            props: Record::new(),
            data: Record::new(),
            computed: Record::new(),
            methods: BTreeMap::new(),
            watchers: WatchMap::new(),
            provided: Record::new(),
            el: None,
        }))
    }

    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn phase(&self) -> InitPhase {
        self.phase
    }

    pub fn constructor(&self) -> &Rc<ComponentClass> {
        &self.ctor
    }

    pub fn config(&self) -> &Rc<Config> {
        &self.config
    }

    pub fn options(&self) -> &InstanceOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut InstanceOptions {
        &mut self.options
    }

    pub fn is_observable(&self) -> bool {
        !self.skip_observation
    }

    pub fn render_proxy(&self) -> RenderProxy {
        self.render_proxy
    }

    /// The real instance, never a wrapping proxy.
    pub fn self_ref(&self) -> Option<InstanceRef> {
        self.self_ref.upgrade()
    }

    pub fn parent(&self) -> Option<InstanceRef> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    pub fn root(&self) -> Option<InstanceRef> {
        match &self.root {
            Some(root) => root.upgrade(),
            None => self.self_ref(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn children(&self) -> &[InstanceRef] {
        &self.children
    }

    pub fn is_mounted(&self) -> bool {
        self.is_mounted
    }

    pub fn is_destroyed(&self) -> bool {
        self.is_destroyed
    }

    pub fn el(&self) -> Option<&Handle> {
        self.el.as_ref()
    }

    pub fn vnode(&self) -> Option<&VNode> {
        self.vnode.as_ref()
    }

    pub fn parent_vnode(&self) -> Option<&Rc<ComponentVNode>> {
        self.parent_vnode.as_ref()
    }

    pub fn slots(&self) -> &BTreeMap<String, Vec<VNode>> {
        &self.slots
    }

    pub fn props(&self) -> &Record {
        &self.props
    }

    pub fn data(&self) -> &Record {
        &self.data
    }

    pub fn injected(&self) -> &Record {
        &self.injected
    }

    pub fn provided(&self) -> &Record {
        &self.provided
    }

    pub fn watched_keys(&self) -> Vec<&String> {
        self.watchers.keys().collect()
    }

    pub fn watcher_count(&self, key: &str) -> usize {
        self.watchers.get(key).map(Vec::len).unwrap_or(0)
    }

    pub fn warn(&self, msg: &str) {
        warn(&self.config, msg, Some(self));
    }

    /// Reads an instance property: props, then data, then computed, then injected.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.props
            .get(key)
            .or_else(|| self.data.get(key))
            .or_else(|| self.computed.get(key))
            .or_else(|| self.injected.get(key))
            .cloned()
    }

    pub fn has(&self, key: &str) -> bool {
        self.props.contains_key(key)
            || self.data.contains_key(key)
            || self.computed.contains_key(key)
            || self.injected.contains_key(key)
            || self.methods.contains_key(key)
    }

    /// Writes a data (or prop) property and runs its watchers in merged order.
    /// Returns `false` when the key is not declared.
    pub fn set(&mut self, key: &str, value: Value) -> bool {
        let old = if let Some(slot) = self.data.get_mut(key) {
            std::mem::replace(slot, value.clone())
        } else if let Some(slot) = self.props.get_mut(key) {
            let old = std::mem::replace(slot, value.clone());
            self.warn(&format!(
                "Avoid mutating a prop directly since the value will be overwritten whenever the parent component re-renders. Prop being mutated: \"{}\"",
                key
            ));
            old
        } else {
            self.warn(&format!(
                "Cannot set reactive property \"{}\": it is not declared in data or props.",
                key
            ));
            return false;
        };
        self.notify(key, &value, &old);
        true
    }

    pub(crate) fn notify(&mut self, key: &str, value: &Value, old: &Value) {
        let Some(handlers) = self.watchers.get(key).cloned() else {
            return;
        };
        let info = format!("callback for watcher \"{}\"", key);
        for handler in handlers {
            if let Err(err) = run_watcher(self, &handler, value, old) {
                handle_error(&err, self, &info);
            }
        }
    }

    pub fn call_method(&mut self, name: &str, args: &[Value]) -> Result<Value, HookError> {
        let method = self
            .methods
            .get(name)
            .cloned()
            .ok_or_else(|| HookError::new(format!("method \"{}\" is not defined", name)))?;
        method(self, args)
    }

    /// Resolves a filter through the layered registry.
    pub fn resolve_filter(&self, id: &str) -> Option<FilterFn> {
        self.options
            .filters()
            .and_then(|filters| filters.resolve(id))
            .cloned()
    }
}
