//! Component option types.
//!
//! A [`ComponentOptions`] value is both the user-authored definition and the
//! merged result the engine produces from it. Composite fields are held behind
//! `Rc` so that clones share storage and so the resolver can detect a late
//! modification by pointer identity alone.

use std::cell::OnceCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::{Rc, Weak};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::class::ComponentClass;
use crate::dom::Handle;
use crate::error::{Error, HookError, Result};
use crate::instance::ComponentInstance;
use crate::render::RenderFn;

pub type Record = serde_json::Map<String, Value>;

pub type HookFn = Rc<dyn Fn(&mut ComponentInstance) -> std::result::Result<(), HookError>>;
/// Returning `false` stops the error from propagating further up the tree.
pub type ErrorCapturedFn = Rc<dyn Fn(&mut ComponentInstance, &HookError, &str) -> bool>;
pub type RecordFn = Rc<dyn Fn(&ComponentInstance) -> std::result::Result<Record, HookError>>;
pub type ComputedFn = Rc<dyn Fn(&ComponentInstance) -> std::result::Result<Value, HookError>>;
pub type MethodFn =
    Rc<dyn Fn(&mut ComponentInstance, &[Value]) -> std::result::Result<Value, HookError>>;
pub type WatchFn =
    Rc<dyn Fn(&mut ComponentInstance, &Value, &Value) -> std::result::Result<(), HookError>>;
pub type FilterFn = Rc<dyn Fn(Value) -> Value>;
pub type DirectiveFn = Rc<dyn Fn(&mut ComponentInstance, &Value)>;

// ═══════════════════════════════════════════════════════════════════════════════
// LIFECYCLE HOOKS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LifecycleHook {
    BeforeCreate,
    Created,
    BeforeMount,
    Mounted,
    BeforeUpdate,
    Updated,
    BeforeDestroy,
    Destroyed,
    Activated,
    Deactivated,
    ServerPrefetch,
}

impl LifecycleHook {
    pub const ALL: [LifecycleHook; 11] = [
        LifecycleHook::BeforeCreate,
        LifecycleHook::Created,
        LifecycleHook::BeforeMount,
        LifecycleHook::Mounted,
        LifecycleHook::BeforeUpdate,
        LifecycleHook::Updated,
        LifecycleHook::BeforeDestroy,
        LifecycleHook::Destroyed,
        LifecycleHook::Activated,
        LifecycleHook::Deactivated,
        LifecycleHook::ServerPrefetch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleHook::BeforeCreate => "beforeCreate",
            LifecycleHook::Created => "created",
            LifecycleHook::BeforeMount => "beforeMount",
            LifecycleHook::Mounted => "mounted",
            LifecycleHook::BeforeUpdate => "beforeUpdate",
            LifecycleHook::Updated => "updated",
            LifecycleHook::BeforeDestroy => "beforeDestroy",
            LifecycleHook::Destroyed => "destroyed",
            LifecycleHook::Activated => "activated",
            LifecycleHook::Deactivated => "deactivated",
            LifecycleHook::ServerPrefetch => "serverPrefetch",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|hook| hook.as_str() == name)
    }
}

impl fmt::Display for LifecycleHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered handler sequence per hook, ancestors first.
pub type HookMap = BTreeMap<LifecycleHook, Vec<HookFn>>;

// ═══════════════════════════════════════════════════════════════════════════════
// LAYERED REGISTRIES
// ═══════════════════════════════════════════════════════════════════════════════

/// Two-level asset mapping: own entries shadow the entries of `parent`.
#[derive(Clone)]
pub struct Registry<T> {
    entries: BTreeMap<String, T>,
    parent: Option<Rc<Registry<T>>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            parent: None,
        }
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty layer whose lookups fall back to `parent`.
    pub fn extending(parent: Rc<Registry<T>>) -> Self {
        Self {
            entries: BTreeMap::new(),
            parent: Some(parent),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: T) -> Option<T> {
        self.entries.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        match self.entries.get(key) {
            Some(value) => Some(value),
            None => self.parent.as_ref().and_then(|parent| parent.get(key)),
        }
    }

    pub fn get_own(&self, key: &str) -> Option<&T> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn own_entries(&self) -> impl Iterator<Item = (&String, &T)> {
        self.entries.iter()
    }

    pub fn parent(&self) -> Option<&Rc<Registry<T>>> {
        self.parent.as_ref()
    }

    /// Every visible key across all layers.
    pub fn keys(&self) -> BTreeSet<String> {
        let mut keys = self
            .parent
            .as_ref()
            .map(|parent| parent.keys())
            .unwrap_or_default();
        keys.extend(self.entries.keys().cloned());
        keys
    }

    /// Asset lookup: exact id, then camelized, then capitalized.
    /// Own entries are tried in every form before falling back to the parent.
    pub fn resolve(&self, id: &str) -> Option<&T> {
        let camelized = camelize(id);
        let capitalized = capitalize(&camelized);
        for key in [id, camelized.as_str(), capitalized.as_str()] {
            if let Some(value) = self.entries.get(key) {
                return Some(value);
            }
        }
        self.get(id)
            .or_else(|| self.get(&camelized))
            .or_else(|| self.get(&capitalized))
    }
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("keys", &self.keys())
            .finish()
    }
}

/// Entry of a `components` registry.
#[derive(Clone)]
pub enum ComponentRef {
    Class(Rc<ComponentClass>),
    /// Self-registration of a named class; non-owning to avoid a cycle.
    SelfRef(Weak<ComponentClass>),
    /// A raw definition, extended into a class the first time it is rendered.
    Definition(Rc<LazyDefinition>),
}

impl ComponentRef {
    pub fn definition(options: ComponentOptions) -> Self {
        ComponentRef::Definition(Rc::new(LazyDefinition {
            options: Rc::new(options),
            ctor: OnceCell::new(),
        }))
    }
}

impl fmt::Debug for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentRef::Class(class) => write!(f, "Class(cid={})", class.cid()),
            ComponentRef::SelfRef(_) => f.write_str("SelfRef"),
            ComponentRef::Definition(def) => {
                write!(f, "Definition({:?})", def.options.name.as_deref())
            }
        }
    }
}

pub struct LazyDefinition {
    pub options: Rc<ComponentOptions>,
    pub(crate) ctor: OnceCell<Rc<ComponentClass>>,
}

/// Directive hooks; the function form sets `bind` and `update`.
#[derive(Clone, Default)]
pub struct DirectiveDef {
    pub bind: Option<DirectiveFn>,
    pub inserted: Option<DirectiveFn>,
    pub update: Option<DirectiveFn>,
    pub component_updated: Option<DirectiveFn>,
    pub unbind: Option<DirectiveFn>,
}

impl DirectiveDef {
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&mut ComponentInstance, &Value) + 'static,
    {
        let hook: DirectiveFn = Rc::new(f);
        Self {
            bind: Some(hook.clone()),
            update: Some(hook),
            ..Default::default()
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FIELD VALUE TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// `data` / `provide` shaped value: a plain record or an evaluator.
#[derive(Clone)]
pub enum DataOption {
    Record(Rc<Record>),
    Fn(RecordFn),
}

impl DataOption {
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&ComponentInstance) -> std::result::Result<Record, HookError> + 'static,
    {
        DataOption::Fn(Rc::new(f))
    }

    pub fn evaluate(&self, vm: &ComponentInstance) -> std::result::Result<Record, HookError> {
        match self {
            DataOption::Record(record) => Ok((**record).clone()),
            DataOption::Fn(f) => f(vm),
        }
    }

    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (DataOption::Record(a), DataOption::Record(b)) => Rc::ptr_eq(a, b),
            (DataOption::Fn(a), DataOption::Fn(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl PropType {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            PropType::String => value.is_string(),
            PropType::Number => value.is_number(),
            PropType::Boolean => value.is_boolean(),
            PropType::Array => value.is_array(),
            PropType::Object => value.is_object(),
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "String" => Some(PropType::String),
            "Number" => Some(PropType::Number),
            "Boolean" => Some(PropType::Boolean),
            "Array" => Some(PropType::Array),
            "Object" => Some(PropType::Object),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropOptions {
    /// Accepted types; empty accepts anything.
    #[serde(default)]
    pub types: Vec<PropType>,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub required: bool,
}

impl PropOptions {
    pub fn typed(ty: PropType) -> Self {
        Self {
            types: vec![ty],
            ..Default::default()
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropsDecl {
    Names(Vec<String>),
    Keyed(BTreeMap<String, PropOptions>),
}

impl PropsDecl {
    /// Canonical keyed form with camelized names.
    pub fn normalized(&self) -> BTreeMap<String, PropOptions> {
        match self {
            PropsDecl::Names(names) => names
                .iter()
                .map(|name| (camelize(name), PropOptions::default()))
                .collect(),
            PropsDecl::Keyed(map) => map
                .iter()
                .map(|(name, opts)| (camelize(name), opts.clone()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InjectOptions {
    pub from: String,
    pub default: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InjectDecl {
    Names(Vec<String>),
    Keyed(BTreeMap<String, InjectOptions>),
}

impl InjectDecl {
    pub fn normalized(&self) -> BTreeMap<String, InjectOptions> {
        match self {
            InjectDecl::Names(names) => names
                .iter()
                .map(|name| {
                    (
                        name.clone(),
                        InjectOptions {
                            from: name.clone(),
                            default: None,
                        },
                    )
                })
                .collect(),
            InjectDecl::Keyed(map) => map.clone(),
        }
    }
}

#[derive(Clone)]
pub enum WatchCallback {
    Fn(WatchFn),
    /// Name of a method on the instance.
    Method(String),
}

#[derive(Clone)]
pub struct WatchHandler {
    pub callback: WatchCallback,
    pub immediate: bool,
}

impl WatchHandler {
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&mut ComponentInstance, &Value, &Value) -> std::result::Result<(), HookError>
            + 'static,
    {
        Self {
            callback: WatchCallback::Fn(Rc::new(f)),
            immediate: false,
        }
    }

    pub fn method(name: impl Into<String>) -> Self {
        Self {
            callback: WatchCallback::Method(name.into()),
            immediate: false,
        }
    }

    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }
}

pub type WatchMap = BTreeMap<String, Vec<WatchHandler>>;

#[derive(Clone)]
pub enum TemplateOption {
    /// Inline markup, or a `#selector` naming an element whose inner markup is used.
    Markup(String),
    Node(Handle),
    /// Any other shape; refused at mount time.
    Invalid(Value),
}

impl TemplateOption {
    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (TemplateOption::Markup(a), TemplateOption::Markup(b)) => a == b,
            (TemplateOption::Node(a), TemplateOption::Node(b)) => Rc::ptr_eq(a, b),
            (TemplateOption::Invalid(a), TemplateOption::Invalid(b)) => a == b,
            _ => false,
        }
    }
}

#[derive(Clone)]
pub enum MountTarget {
    Selector(String),
    Node(Handle),
}

impl MountTarget {
    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (MountTarget::Selector(a), MountTarget::Selector(b)) => a == b,
            (MountTarget::Node(a), MountTarget::Node(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&str> for MountTarget {
    fn from(selector: &str) -> Self {
        MountTarget::Selector(selector.to_string())
    }
}

impl From<Handle> for MountTarget {
    fn from(node: Handle) -> Self {
        MountTarget::Node(node)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPONENT OPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Default)]
pub struct ComponentOptions {
    pub name: Option<String>,
    pub data: Option<DataOption>,
    pub props: Option<Rc<PropsDecl>>,
    pub computed: Option<Rc<BTreeMap<String, ComputedFn>>>,
    pub methods: Option<Rc<BTreeMap<String, MethodFn>>>,
    pub watch: Option<Rc<WatchMap>>,
    pub inject: Option<Rc<InjectDecl>>,
    pub provide: Option<DataOption>,
    pub hooks: Option<Rc<HookMap>>,
    pub error_captured: Option<Rc<Vec<ErrorCapturedFn>>>,
    pub components: Option<Rc<Registry<ComponentRef>>>,
    pub directives: Option<Rc<Registry<DirectiveDef>>>,
    pub filters: Option<Rc<Registry<FilterFn>>>,
    pub mixins: Option<Rc<Vec<Rc<ComponentOptions>>>>,
    pub extends: Option<Rc<ComponentOptions>>,
    pub template: Option<TemplateOption>,
    pub render: Option<RenderFn>,
    pub static_render_fns: Option<Rc<Vec<RenderFn>>>,
    pub el: Option<MountTarget>,
    pub delimiters: Option<(String, String)>,
    pub comments: Option<bool>,
    pub is_abstract: Option<bool>,
    /// Options without a dedicated field, merged by override or a configured strategy.
    pub extra: BTreeMap<String, Value>,
    /// Set on merge results; `extends`/`mixins` of a merged object are not re-applied.
    pub(crate) merged: bool,
}

impl fmt::Debug for ComponentOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentOptions")
            .field("name", &self.name)
            .field("props", &self.props)
            .field("has_data", &self.data.is_some())
            .field("has_render", &self.render.is_some())
            .field("components", &self.components)
            .field("extra", &self.extra)
            .finish()
    }
}

impl ComponentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_merged(&self) -> bool {
        self.merged
    }

    pub fn hook_handlers(&self, hook: LifecycleHook) -> &[HookFn] {
        self.hooks
            .as_ref()
            .and_then(|hooks| hooks.get(&hook))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn props_map(&self) -> BTreeMap<String, PropOptions> {
        self.props
            .as_ref()
            .map(|props| props.normalized())
            .unwrap_or_default()
    }

    // ───────────────────────────────────────────────────────────────────────
    // Builder
    // ───────────────────────────────────────────────────────────────────────

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn data<F>(mut self, f: F) -> Self
    where
        F: Fn(&ComponentInstance) -> std::result::Result<Record, HookError> + 'static,
    {
        self.data = Some(DataOption::from_fn(f));
        self
    }

    pub fn data_record(mut self, record: Record) -> Self {
        self.data = Some(DataOption::Record(Rc::new(record)));
        self
    }

    pub fn props<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.props = Some(Rc::new(PropsDecl::Names(
            names.into_iter().map(Into::into).collect(),
        )));
        self
    }

    pub fn prop(mut self, name: impl Into<String>, opts: PropOptions) -> Self {
        let mut map = self.props_map();
        map.insert(camelize(&name.into()), opts);
        self.props = Some(Rc::new(PropsDecl::Keyed(map)));
        self
    }

    pub fn computed<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&ComponentInstance) -> std::result::Result<Value, HookError> + 'static,
    {
        Rc::make_mut(self.computed.get_or_insert_with(Default::default))
            .insert(name.into(), Rc::new(f));
        self
    }

    pub fn method<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut ComponentInstance, &[Value]) -> std::result::Result<Value, HookError> + 'static,
    {
        Rc::make_mut(self.methods.get_or_insert_with(Default::default))
            .insert(name.into(), Rc::new(f));
        self
    }

    pub fn watch(mut self, key: impl Into<String>, handler: WatchHandler) -> Self {
        Rc::make_mut(self.watch.get_or_insert_with(Default::default))
            .entry(key.into())
            .or_default()
            .push(handler);
        self
    }

    pub fn inject<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inject = Some(Rc::new(InjectDecl::Names(
            names.into_iter().map(Into::into).collect(),
        )));
        self
    }

    pub fn inject_from(
        mut self,
        key: impl Into<String>,
        from: impl Into<String>,
        default: Option<Value>,
    ) -> Self {
        let mut map = self
            .inject
            .as_ref()
            .map(|inject| inject.normalized())
            .unwrap_or_default();
        map.insert(
            key.into(),
            InjectOptions {
                from: from.into(),
                default,
            },
        );
        self.inject = Some(Rc::new(InjectDecl::Keyed(map)));
        self
    }

    pub fn provide<F>(mut self, f: F) -> Self
    where
        F: Fn(&ComponentInstance) -> std::result::Result<Record, HookError> + 'static,
    {
        self.provide = Some(DataOption::from_fn(f));
        self
    }

    pub fn on<F>(mut self, hook: LifecycleHook, f: F) -> Self
    where
        F: Fn(&mut ComponentInstance) -> std::result::Result<(), HookError> + 'static,
    {
        Rc::make_mut(self.hooks.get_or_insert_with(Default::default))
            .entry(hook)
            .or_default()
            .push(Rc::new(f));
        self
    }

    /// Adds an already shared handler; the same `Rc` reached twice through
    /// mixins is only invoked once.
    pub fn on_shared(mut self, hook: LifecycleHook, f: HookFn) -> Self {
        Rc::make_mut(self.hooks.get_or_insert_with(Default::default))
            .entry(hook)
            .or_default()
            .push(f);
        self
    }

    pub fn error_captured<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut ComponentInstance, &HookError, &str) -> bool + 'static,
    {
        Rc::make_mut(self.error_captured.get_or_insert_with(Default::default)).push(Rc::new(f));
        self
    }

    pub fn component(mut self, name: impl Into<String>, component: ComponentRef) -> Self {
        Rc::make_mut(self.components.get_or_insert_with(Default::default))
            .insert(name, component);
        self
    }

    pub fn directive(mut self, name: impl Into<String>, def: DirectiveDef) -> Self {
        Rc::make_mut(self.directives.get_or_insert_with(Default::default)).insert(name, def);
        self
    }

    pub fn filter<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Value + 'static,
    {
        let filter: FilterFn = Rc::new(f);
        Rc::make_mut(self.filters.get_or_insert_with(Default::default)).insert(name, filter);
        self
    }

    pub fn mixin(mut self, mixin: impl Into<Rc<ComponentOptions>>) -> Self {
        Rc::make_mut(self.mixins.get_or_insert_with(Default::default)).push(mixin.into());
        self
    }

    pub fn extends(mut self, base: impl Into<Rc<ComponentOptions>>) -> Self {
        self.extends = Some(base.into());
        self
    }

    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(TemplateOption::Markup(template.into()));
        self
    }

    pub fn template_node(mut self, node: Handle) -> Self {
        self.template = Some(TemplateOption::Node(node));
        self
    }

    pub fn render<F>(mut self, f: F) -> Self
    where
        F: Fn(&dyn crate::render::RenderContext) -> std::result::Result<crate::vnode::VNode, HookError>
            + 'static,
    {
        self.render = Some(Rc::new(f));
        self
    }

    pub fn el(mut self, target: impl Into<MountTarget>) -> Self {
        self.el = Some(target.into());
        self
    }

    pub fn delimiters(mut self, open: impl Into<String>, close: impl Into<String>) -> Self {
        self.delimiters = Some((open.into(), close.into()));
        self
    }

    pub fn comments(mut self, keep: bool) -> Self {
        self.comments = Some(keep);
        self
    }

    pub fn abstract_component(mut self) -> Self {
        self.is_abstract = Some(true);
        self
    }

    pub fn custom(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    // ───────────────────────────────────────────────────────────────────────
    // JSON definitions
    // ───────────────────────────────────────────────────────────────────────

    /// Builds a definition from its JSON-expressible subset.
    ///
    /// Function-valued options (hooks, methods, computed) have no JSON form and
    /// must be attached with the builder.
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::invalid_option("<definition>", "an object", value))?;
        let mut opts = ComponentOptions::default();

        for (key, value) in object {
            match key.as_str() {
                "name" => {
                    let name = value
                        .as_str()
                        .ok_or_else(|| Error::invalid_option("name", "a string", value))?;
                    opts.name = Some(name.to_string());
                }
                "props" => opts.props = Some(Rc::new(parse_props(value)?)),
                "data" => {
                    let record = value
                        .as_object()
                        .ok_or_else(|| Error::invalid_option("data", "an object", value))?;
                    opts.data = Some(DataOption::Record(Rc::new(record.clone())));
                }
                "provide" => {
                    let record = value
                        .as_object()
                        .ok_or_else(|| Error::invalid_option("provide", "an object", value))?;
                    opts.provide = Some(DataOption::Record(Rc::new(record.clone())));
                }
                "inject" => opts.inject = Some(Rc::new(parse_inject(value)?)),
                "watch" => opts.watch = Some(Rc::new(parse_watch(value)?)),
                "template" => {
                    opts.template = Some(match value.as_str() {
                        Some(markup) => TemplateOption::Markup(markup.to_string()),
                        None => TemplateOption::Invalid(value.clone()),
                    })
                }
                "el" => {
                    let selector = value
                        .as_str()
                        .ok_or_else(|| Error::invalid_option("el", "a selector string", value))?;
                    opts.el = Some(MountTarget::Selector(selector.to_string()));
                }
                "delimiters" => {
                    let pair = value
                        .as_array()
                        .filter(|pair| pair.len() == 2)
                        .and_then(|pair| Some((pair[0].as_str()?, pair[1].as_str()?)))
                        .ok_or_else(|| {
                            Error::invalid_option("delimiters", "a pair of strings", value)
                        })?;
                    opts.delimiters = Some((pair.0.to_string(), pair.1.to_string()));
                }
                "comments" => {
                    opts.comments = Some(
                        value
                            .as_bool()
                            .ok_or_else(|| Error::invalid_option("comments", "a boolean", value))?,
                    )
                }
                "abstract" => {
                    opts.is_abstract = Some(
                        value
                            .as_bool()
                            .ok_or_else(|| Error::invalid_option("abstract", "a boolean", value))?,
                    )
                }
                "mixins" => {
                    let items = value
                        .as_array()
                        .ok_or_else(|| Error::invalid_option("mixins", "an array", value))?;
                    let mixins = items
                        .iter()
                        .map(|item| ComponentOptions::from_json(item).map(Rc::new))
                        .collect::<Result<Vec<_>>>()?;
                    opts.mixins = Some(Rc::new(mixins));
                }
                "extends" => opts.extends = Some(Rc::new(ComponentOptions::from_json(value)?)),
                "components" => {
                    let entries = value
                        .as_object()
                        .ok_or_else(|| Error::invalid_option("components", "an object", value))?;
                    let mut registry = Registry::new();
                    for (name, def) in entries {
                        registry.insert(
                            name.clone(),
                            ComponentRef::definition(ComponentOptions::from_json(def)?),
                        );
                    }
                    opts.components = Some(Rc::new(registry));
                }
                _ => {
                    opts.extra.insert(key.clone(), value.clone());
                }
            }
        }

        Ok(opts)
    }

    // ───────────────────────────────────────────────────────────────────────
    // Late-modification support
    // ───────────────────────────────────────────────────────────────────────

    /// Fields of `self` that are not identical to those in `sealed`.
    pub(crate) fn modified_since(&self, sealed: &ComponentOptions) -> Option<ComponentOptions> {
        let mut delta = ComponentOptions::default();
        let mut changed = false;

        macro_rules! diff_rc {
            ($($field:ident),*) => {$(
                if !same_rc(&self.$field, &sealed.$field) {
                    delta.$field = self.$field.clone();
                    changed = true;
                }
            )*};
        }
        diff_rc!(
            props, computed, methods, watch, inject, hooks, error_captured, components,
            directives, filters, mixins, extends, render, static_render_fns
        );

        if !same_with(&self.data, &sealed.data, DataOption::same) {
            delta.data = self.data.clone();
            changed = true;
        }
        if !same_with(&self.provide, &sealed.provide, DataOption::same) {
            delta.provide = self.provide.clone();
            changed = true;
        }
        if !same_with(&self.template, &sealed.template, TemplateOption::same) {
            delta.template = self.template.clone();
            changed = true;
        }
        if !same_with(&self.el, &sealed.el, MountTarget::same) {
            delta.el = self.el.clone();
            changed = true;
        }
        if self.name != sealed.name {
            delta.name = self.name.clone();
            changed = true;
        }
        if self.delimiters != sealed.delimiters {
            delta.delimiters = self.delimiters.clone();
            changed = true;
        }
        if self.comments != sealed.comments {
            delta.comments = self.comments;
            changed = true;
        }
        if self.is_abstract != sealed.is_abstract {
            delta.is_abstract = self.is_abstract;
            changed = true;
        }
        for (key, value) in &self.extra {
            if sealed.extra.get(key) != Some(value) {
                delta.extra.insert(key.clone(), value.clone());
                changed = true;
            }
        }

        changed.then_some(delta)
    }

    /// Copies every field that `delta` defines onto `self`.
    pub(crate) fn overlay(&mut self, delta: &ComponentOptions) {
        macro_rules! take_some {
            ($($field:ident),*) => {$(
                if delta.$field.is_some() {
                    self.$field = delta.$field.clone();
                }
            )*};
        }
        take_some!(
            name, data, props, computed, methods, watch, inject, provide, hooks,
            error_captured, components, directives, filters, mixins, extends, template,
            render, static_render_fns, el, delimiters, comments, is_abstract
        );
        for (key, value) in &delta.extra {
            self.extra.insert(key.clone(), value.clone());
        }
    }
}

fn same_rc<T: ?Sized>(a: &Option<Rc<T>>, b: &Option<Rc<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

fn same_with<T>(a: &Option<T>, b: &Option<T>, eq: fn(&T, &T) -> bool) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

fn parse_props(value: &Value) -> Result<PropsDecl> {
    match value {
        Value::Array(items) => {
            let names = items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| Error::invalid_option("props", "an array of strings", item))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(PropsDecl::Names(names))
        }
        Value::Object(entries) => {
            let mut map = BTreeMap::new();
            for (name, spec) in entries {
                let opts = match spec {
                    Value::Null => PropOptions::default(),
                    Value::String(ty) => PropOptions {
                        types: PropType::from_name(ty).into_iter().collect(),
                        ..Default::default()
                    },
                    Value::Object(_) => serde_json::from_value(spec.clone()).map_err(|_| {
                        Error::invalid_option("props", "a prop descriptor", spec)
                    })?,
                    other => {
                        return Err(Error::invalid_option("props", "a prop descriptor", other))
                    }
                };
                map.insert(name.clone(), opts);
            }
            Ok(PropsDecl::Keyed(map))
        }
        other => Err(Error::invalid_option("props", "an array or object", other)),
    }
}

fn parse_inject(value: &Value) -> Result<InjectDecl> {
    match value {
        Value::Array(items) => {
            let names = items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| Error::invalid_option("inject", "an array of strings", item))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(InjectDecl::Names(names))
        }
        Value::Object(entries) => {
            let mut map = BTreeMap::new();
            for (key, spec) in entries {
                let opts = match spec {
                    Value::String(from) => InjectOptions {
                        from: from.clone(),
                        default: None,
                    },
                    Value::Object(fields) => InjectOptions {
                        from: fields
                            .get("from")
                            .and_then(Value::as_str)
                            .unwrap_or(key)
                            .to_string(),
                        default: fields.get("default").cloned(),
                    },
                    other => {
                        return Err(Error::invalid_option("inject", "a string or object", other))
                    }
                };
                map.insert(key.clone(), opts);
            }
            Ok(InjectDecl::Keyed(map))
        }
        other => Err(Error::invalid_option("inject", "an array or object", other)),
    }
}

/// `watch` entries name methods; a single name is normalized to a one-element list.
fn parse_watch(value: &Value) -> Result<WatchMap> {
    let entries = value
        .as_object()
        .ok_or_else(|| Error::invalid_option("watch", "an object", value))?;
    let mut map = WatchMap::new();
    for (key, handlers) in entries {
        let list = match handlers {
            Value::String(method) => vec![WatchHandler::method(method.clone())],
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(WatchHandler::method)
                        .ok_or_else(|| Error::invalid_option("watch", "a method name", item))
                })
                .collect::<Result<Vec<_>>>()?,
            other => return Err(Error::invalid_option("watch", "a method name or list", other)),
        };
        map.insert(key.clone(), list);
    }
    Ok(map)
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAME HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

lazy_static! {
    static ref CAMELIZE_RE: Regex = Regex::new(r"-(\w)").unwrap();
    static ref HYPHENATE_RE: Regex = Regex::new(r"\B([A-Z])").unwrap();
}

/// `my-prop` → `myProp`
pub fn camelize(s: &str) -> String {
    CAMELIZE_RE
        .replace_all(s, |caps: &regex::Captures| caps[1].to_uppercase())
        .to_string()
}

/// `myProp` → `my-prop`
pub fn hyphenate(s: &str) -> String {
    HYPHENATE_RE.replace_all(s, "-$1").to_lowercase()
}

pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_name_helpers() {
        assert_eq!(camelize("my-long-prop"), "myLongProp");
        assert_eq!(hyphenate("myLongProp"), "my-long-prop");
        assert_eq!(capitalize("todoItem"), "TodoItem");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_registry_shadowing_and_fallback() {
        let mut base = Registry::new();
        base.insert("shared", 1);
        base.insert("base-only", 2);
        let mut child = Registry::extending(Rc::new(base));
        child.insert("shared", 10);

        assert_eq!(child.get("shared"), Some(&10));
        assert_eq!(child.get("base-only"), Some(&2));
        assert_eq!(child.get_own("base-only"), None);
        assert_eq!(child.keys().len(), 2);
    }

    #[test]
    fn test_registry_resolve_forms() {
        let mut registry = Registry::new();
        registry.insert("TodoItem", "pascal");
        assert_eq!(registry.resolve("todo-item"), Some(&"pascal"));
        assert_eq!(registry.resolve("todoItem"), Some(&"pascal"));
        assert_eq!(registry.resolve("other"), None);
    }

    #[test]
    fn test_props_normalization() {
        let props = PropsDecl::Names(vec!["first-name".into(), "age".into()]);
        let map = props.normalized();
        assert!(map.contains_key("firstName"));
        assert!(map.contains_key("age"));
    }

    #[test]
    fn test_from_json_definition() {
        let opts = ComponentOptions::from_json(&json!({
            "name": "card",
            "props": { "title": "String", "count": { "types": ["Number"], "default": 0 } },
            "inject": ["theme"],
            "watch": { "count": "onCount" },
            "delimiters": ["[[", "]]"],
            "custom": 42
        }))
        .unwrap();

        assert_eq!(opts.name.as_deref(), Some("card"));
        let props = opts.props_map();
        assert_eq!(props["title"].types, vec![PropType::String]);
        assert_eq!(props["count"].default, Some(json!(0)));
        assert_eq!(opts.watch.as_ref().unwrap()["count"].len(), 1);
        assert_eq!(opts.delimiters, Some(("[[".into(), "]]".into())));
        assert_eq!(opts.extra.get("custom"), Some(&json!(42)));
    }

    #[test]
    fn test_from_json_rejects_malformed_shapes() {
        let err = ComponentOptions::from_json(&json!({ "props": 3 })).unwrap_err();
        assert!(matches!(err, Error::InvalidOption { ref option, .. } if option == "props"));

        let err = ComponentOptions::from_json(&json!({ "delimiters": ["{"] })).unwrap_err();
        assert!(matches!(err, Error::InvalidOption { .. }));
    }

    #[test]
    fn test_from_json_template_shapes() {
        let opts = ComponentOptions::from_json(&json!({ "template": 5 })).unwrap();
        assert!(matches!(opts.template, Some(TemplateOption::Invalid(_))));
    }

    #[test]
    fn test_modified_since_detects_replaced_fields() {
        let sealed = ComponentOptions::new()
            .named("a")
            .component("x", ComponentRef::definition(ComponentOptions::new()));
        let mut live = sealed.clone();
        assert!(live.modified_since(&sealed).is_none());

        Rc::make_mut(live.components.as_mut().unwrap())
            .insert("y", ComponentRef::definition(ComponentOptions::new()));
        let delta = live.modified_since(&sealed).unwrap();
        assert!(delta.components.is_some());
        assert!(delta.name.is_none());
    }
}
