//! The runtime registry: configuration, the base class, host collaborators and
//! the process-lifetime caches, plus the global component API.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::class::{class_for_entry, resolve_constructor_options, ComponentClass};
use crate::compiler::{CompileConfig, CompiledTemplate, HtmlCompiler, TemplateCompiler};
use crate::config::Config;
use crate::dom::{self, DomQuery};
use crate::error::Result;
use crate::init::{initialize, InstantiationKind};
use crate::instance::{ComponentInstance, InstanceRef};
use crate::merge::{merge_options, validate_component_name, validate_directive_name};
use crate::options::{ComponentOptions, ComponentRef, DirectiveDef, FilterFn, MountTarget, Registry};
use crate::patch::{Mounter, PatchMounter};
use crate::perf::{Measure, Perf};

pub struct Runtime {
    config: Rc<Config>,
    base: Rc<ComponentClass>,
    dom: Option<Rc<dyn DomQuery>>,
    compiler: Rc<dyn TemplateCompiler>,
    mounter: Rc<dyn Mounter>,
    should_decode_newlines: bool,
    should_decode_newlines_for_href: bool,
    /// `#selector` -> inner markup, filled on first lookup.
    id_to_template: RefCell<HashMap<String, String>>,
    perf: Perf,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("base_cid", &self.base.cid())
            .field("has_dom", &self.dom.is_some())
            .field("cached_templates", &self.id_to_template.borrow().len())
            .finish()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Runtime {
    pub fn new(config: Config) -> Self {
        let perf = Perf::new(config.performance && config.dev_mode());
        let base = ComponentClass::base(ComponentOptions {
            components: Some(Rc::new(Registry::new())),
            directives: Some(Rc::new(Registry::new())),
            filters: Some(Rc::new(Registry::new())),
            ..Default::default()
        });
        Self {
            config: Rc::new(config),
            base,
            dom: None,
            compiler: Rc::new(HtmlCompiler::new()),
            mounter: Rc::new(PatchMounter),
            should_decode_newlines: false,
            should_decode_newlines_for_href: false,
            id_to_template: RefCell::new(HashMap::new()),
            perf,
        }
    }

    pub fn with_dom(mut self, dom: Rc<dyn DomQuery>) -> Self {
        self.dom = Some(dom);
        self
    }

    pub fn with_compiler(mut self, compiler: Rc<dyn TemplateCompiler>) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn with_mounter(mut self, mounter: Rc<dyn Mounter>) -> Self {
        self.mounter = mounter;
        self
    }

    /// Host quirks: whether attribute values (and `href` values) arrive with
    /// newlines already decoded.
    pub fn with_decode_flags(mut self, newlines: bool, href: bool) -> Self {
        self.should_decode_newlines = newlines;
        self.should_decode_newlines_for_href = href;
        self
    }

    pub fn config(&self) -> &Rc<Config> {
        &self.config
    }

    pub fn base(&self) -> &Rc<ComponentClass> {
        &self.base
    }

    pub fn dom(&self) -> Option<&Rc<dyn DomQuery>> {
        self.dom.as_ref()
    }

    pub fn compiler(&self) -> &Rc<dyn TemplateCompiler> {
        &self.compiler
    }

    pub fn mounter(&self) -> &Rc<dyn Mounter> {
        &self.mounter
    }

    pub fn should_decode_newlines(&self) -> bool {
        self.should_decode_newlines
    }

    pub fn should_decode_newlines_for_href(&self) -> bool {
        self.should_decode_newlines_for_href
    }

    pub(crate) fn perf(&self) -> &Perf {
        &self.perf
    }

    pub(crate) fn perf_active(&self) -> bool {
        self.perf.enabled()
    }

    pub fn measures(&self) -> Vec<Measure> {
        self.perf.measures()
    }

    /// Inner markup of the element `selector` names. The host is queried once
    /// per selector; a miss is remembered as empty markup.
    pub fn id_to_template(&self, selector: &str) -> String {
        if let Some(markup) = self.id_to_template.borrow().get(selector) {
            return markup.clone();
        }
        let markup = self
            .dom
            .as_ref()
            .and_then(|dom| dom.query(selector))
            .map(|node| dom::inner_html(&node))
            .unwrap_or_default();
        self.id_to_template
            .borrow_mut()
            .insert(selector.to_string(), markup.clone());
        markup
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Classes
    // ───────────────────────────────────────────────────────────────────────────

    pub fn extend(&self, definition: ComponentOptions) -> Result<Rc<ComponentClass>> {
        self.base.extend(definition, &self.config)
    }

    pub fn extend_from(
        &self,
        super_class: &Rc<ComponentClass>,
        definition: ComponentOptions,
    ) -> Result<Rc<ComponentClass>> {
        super_class.extend(definition, &self.config)
    }

    /// Merges `mixin` into the global defaults. Every class re-resolves on its
    /// next instantiation.
    pub fn mixin(&self, mixin: ComponentOptions) -> Result<()> {
        let merged = merge_options(&self.base.options(), &mixin, None, &self.config)?;
        self.base.replace_options(merged);
        Ok(())
    }

    pub fn resolve_constructor_options(
        &self,
        ctor: &Rc<ComponentClass>,
    ) -> Result<Rc<ComponentOptions>> {
        resolve_constructor_options(ctor, &self.config)
    }

    /// The class behind a registry entry, extending raw definitions from the base.
    pub fn component_class(&self, entry: &ComponentRef) -> Result<Option<Rc<ComponentClass>>> {
        class_for_entry(entry, &self.base, &self.config)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Global assets
    // ───────────────────────────────────────────────────────────────────────────

    /// Registers a global component, extending `definition` into a class.
    pub fn component(
        &self,
        name: &str,
        definition: ComponentOptions,
    ) -> Result<Rc<ComponentClass>> {
        let mut definition = definition;
        if definition.name.is_none() {
            definition.name = Some(name.to_string());
        }
        let class = self.extend(definition)?;
        self.register_component(name, class.clone());
        Ok(class)
    }

    /// Registers an already extended class under `name`.
    pub fn register_component(&self, name: &str, class: Rc<ComponentClass>) {
        if self.config.dev_mode() {
            validate_component_name(name, &self.config);
        }
        self.base.modify_options(|options| {
            Rc::make_mut(options.components.get_or_insert_with(Default::default))
                .insert(name, ComponentRef::Class(class));
        });
    }

    pub fn directive(&self, name: &str, def: DirectiveDef) {
        if self.config.dev_mode() {
            validate_directive_name(name, &self.config);
        }
        self.base.modify_options(|options| {
            Rc::make_mut(options.directives.get_or_insert_with(Default::default)).insert(name, def);
        });
    }

    pub fn filter<F>(&self, name: &str, f: F)
    where
        F: Fn(serde_json::Value) -> serde_json::Value + 'static,
    {
        let filter: FilterFn = Rc::new(f);
        self.base.modify_options(|options| {
            Rc::make_mut(options.filters.get_or_insert_with(Default::default)).insert(name, filter);
        });
    }

    /// Compiles markup with default settings through the configured compiler.
    pub fn compile(&self, template: &str) -> CompiledTemplate {
        let config = CompileConfig {
            should_decode_newlines: self.should_decode_newlines,
            should_decode_newlines_for_href: self.should_decode_newlines_for_href,
            ..Default::default()
        };
        self.compiler.compile(template, &config)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Instances
    // ───────────────────────────────────────────────────────────────────────────

    /// Allocates and initializes an instance of `class` from `definition`.
    pub fn new_instance(
        &self,
        class: &Rc<ComponentClass>,
        definition: ComponentOptions,
    ) -> Result<InstanceRef> {
        let vm = ComponentInstance::allocate(class.clone(), self.config.clone());
        self.initialize(&vm, InstantiationKind::Root(definition))?;
        Ok(vm)
    }

    /// Root instance of the base class.
    pub fn create_root(&self, definition: ComponentOptions) -> Result<InstanceRef> {
        let base = self.base.clone();
        self.new_instance(&base, definition)
    }

    pub fn initialize(&self, vm: &InstanceRef, kind: InstantiationKind) -> Result<()> {
        initialize(self, vm, kind)
    }

    pub fn mount(
        &self,
        vm: &InstanceRef,
        target: Option<MountTarget>,
        hydrating: bool,
    ) -> Result<InstanceRef> {
        crate::mount::mount(self, vm, target, hydrating)
    }
}
