//! Component classes and the constructor options resolver.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::merge::{merge_options, validate_component_name};
use crate::options::{ComponentOptions, ComponentRef};

/// Deepest `super` chain the resolver will walk.
pub const MAX_INHERITANCE_DEPTH: usize = 64;

static CLASS_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_cid() -> u64 {
    CLASS_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// A component constructor: the merged options every instance starts from.
pub struct ComponentClass {
    cid: u64,
    super_class: Option<Rc<ComponentClass>>,
    state: RefCell<ClassState>,
}

struct ClassState {
    /// Live merged options. May be edited after definition.
    options: Rc<ComponentOptions>,
    /// Resolved options of the super class this class was last merged against.
    super_options: Option<Rc<ComponentOptions>>,
    /// The definition passed to `extend`, plus any late edits carried forward.
    extend_options: Rc<ComponentOptions>,
    /// Snapshot of `options` taken when they were last merged.
    sealed_options: Rc<ComponentOptions>,
}

impl fmt::Debug for ComponentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentClass")
            .field("cid", &self.cid)
            .field("name", &self.name())
            .field("super_cid", &self.super_class.as_ref().map(|s| s.cid))
            .finish()
    }
}

impl ComponentClass {
    /// Root class; its options are the global defaults every class inherits.
    pub fn base(options: ComponentOptions) -> Rc<Self> {
        let mut options = options;
        options.merged = true;
        let options = Rc::new(options);
        Rc::new(ComponentClass {
            cid: next_cid(),
            super_class: None,
            state: RefCell::new(ClassState {
                options: options.clone(),
                super_options: None,
                extend_options: Rc::new(ComponentOptions::default()),
                sealed_options: options,
            }),
        })
    }

    /// Defines a subclass whose options are `definition` merged over this class's.
    ///
    /// A named subclass registers itself in its own `components` so templates
    /// can refer to it recursively.
    pub fn extend(
        self: &Rc<Self>,
        definition: ComponentOptions,
        config: &Config,
    ) -> Result<Rc<ComponentClass>> {
        let super_options = resolve_constructor_options(self, config)?;
        let name = definition.name.clone().or_else(|| super_options.name.clone());
        if let Some(name) = &name {
            if config.dev_mode() {
                validate_component_name(name, config);
            }
        }

        let extend_options = Rc::new(definition);
        let merged = merge_options(&super_options, &extend_options, None, config)?;

        let class = Rc::new_cyclic(|weak| {
            let mut options = merged;
            if let Some(name) = name {
                Rc::make_mut(options.components.get_or_insert_with(Default::default))
                    .insert(name, ComponentRef::SelfRef(weak.clone()));
            }
            let options = Rc::new(options);
            ComponentClass {
                cid: next_cid(),
                super_class: Some(self.clone()),
                state: RefCell::new(ClassState {
                    sealed_options: options.clone(),
                    options,
                    super_options: Some(super_options),
                    extend_options,
                }),
            }
        });
        log::debug!("defined component class {:?}", class);
        Ok(class)
    }

    pub fn cid(&self) -> u64 {
        self.cid
    }

    pub fn super_class(&self) -> Option<&Rc<ComponentClass>> {
        self.super_class.as_ref()
    }

    /// The root of the `super` chain.
    pub fn base_class(self: &Rc<Self>) -> Rc<ComponentClass> {
        let mut current = self.clone();
        while let Some(parent) = current.super_class.clone() {
            current = parent;
        }
        current
    }

    /// Current live options, without resolving against the super chain.
    pub fn options(&self) -> Rc<ComponentOptions> {
        self.state.borrow().options.clone()
    }

    pub fn sealed_options(&self) -> Rc<ComponentOptions> {
        self.state.borrow().sealed_options.clone()
    }

    pub fn extend_options(&self) -> Rc<ComponentOptions> {
        self.state.borrow().extend_options.clone()
    }

    pub fn name(&self) -> Option<String> {
        self.state.borrow().options.name.clone()
    }

    /// Edits the live options in place. Fields shared with the sealed snapshot
    /// are copied first, so the edit is visible to change detection.
    pub fn modify_options<F>(&self, f: F)
    where
        F: FnOnce(&mut ComponentOptions),
    {
        let mut state = self.state.borrow_mut();
        f(Rc::make_mut(&mut state.options));
    }

    /// Swaps in a new options object wholesale.
    pub fn replace_options(&self, options: ComponentOptions) {
        self.state.borrow_mut().options = Rc::new(options);
    }
}

/// Returns the options instances of `ctor` should start from.
///
/// Classes without a super class return their own options. Otherwise the
/// super chain is resolved first; when it yields the same object as last time
/// the cached options come back untouched. When it changed, any late edits to
/// this class's options are carried onto its extend-time definition and the
/// definition is merged again against the new super options.
pub fn resolve_constructor_options(
    ctor: &Rc<ComponentClass>,
    config: &Config,
) -> Result<Rc<ComponentOptions>> {
    resolve_at_depth(ctor, config, 0)
}

fn resolve_at_depth(
    ctor: &Rc<ComponentClass>,
    config: &Config,
    depth: usize,
) -> Result<Rc<ComponentOptions>> {
    if depth > MAX_INHERITANCE_DEPTH {
        return Err(Error::InheritanceTooDeep {
            limit: MAX_INHERITANCE_DEPTH,
        });
    }
    let Some(super_class) = &ctor.super_class else {
        return Ok(ctor.options());
    };

    let super_options = resolve_at_depth(super_class, config, depth + 1)?;
    let unchanged = ctor
        .state
        .borrow()
        .super_options
        .as_ref()
        .is_some_and(|cached| Rc::ptr_eq(cached, &super_options));
    if unchanged {
        return Ok(ctor.options());
    }

    log::debug!("super options of class {} changed, re-merging", ctor.cid);
    let mut state = ctor.state.borrow_mut();
    state.super_options = Some(super_options.clone());
    if let Some(delta) = state.options.modified_since(&state.sealed_options) {
        Rc::make_mut(&mut state.extend_options).overlay(&delta);
    }

    let mut options = merge_options(&super_options, &state.extend_options, None, config)?;
    if let Some(name) = options.name.clone() {
        Rc::make_mut(options.components.get_or_insert_with(Default::default))
            .insert(name, ComponentRef::SelfRef(Rc::downgrade(ctor)));
    }
    let options = Rc::new(options);
    state.options = options.clone();
    state.sealed_options = options.clone();
    Ok(options)
}

/// The class behind a `components` entry. Raw definitions are extended from
/// `base` the first time and the class is cached on the entry.
pub fn class_for_entry(
    entry: &ComponentRef,
    base: &Rc<ComponentClass>,
    config: &Config,
) -> Result<Option<Rc<ComponentClass>>> {
    match entry {
        ComponentRef::Class(class) => Ok(Some(class.clone())),
        ComponentRef::SelfRef(weak) => Ok(weak.upgrade()),
        ComponentRef::Definition(def) => {
            if let Some(ctor) = def.ctor.get() {
                return Ok(Some(ctor.clone()));
            }
            let ctor = base.extend((*def.options).clone(), config)?;
            Ok(Some(def.ctor.get_or_init(|| ctor).clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::LifecycleHook;

    #[test]
    fn test_base_class_returns_own_options() {
        let base = ComponentClass::base(ComponentOptions::new());
        let config = Config::new();
        let first = resolve_constructor_options(&base, &config).unwrap();
        let second = resolve_constructor_options(&base, &config).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert!(first.is_merged());
    }

    #[test]
    fn test_named_class_registers_itself() {
        let config = Config::new();
        let base = ComponentClass::base(ComponentOptions::new());
        let tree = base
            .extend(ComponentOptions::new().named("tree-node"), &config)
            .unwrap();

        let options = tree.options();
        match options.components.as_ref().and_then(|c| c.get("tree-node")) {
            Some(ComponentRef::SelfRef(weak)) => {
                assert!(Rc::ptr_eq(&weak.upgrade().unwrap(), &tree))
            }
            other => panic!("expected self reference, got {:?}", other),
        }
        assert!(Rc::ptr_eq(&tree.base_class(), &base));
    }

    #[test]
    fn test_modify_options_is_detected() {
        let config = Config::new();
        let base = ComponentClass::base(ComponentOptions::new());
        let child = base.extend(ComponentOptions::new(), &config).unwrap();
        assert!(child.options().modified_since(&child.sealed_options()).is_none());

        child.modify_options(|opts| {
            Rc::make_mut(opts.hooks.get_or_insert_with(Default::default))
                .entry(LifecycleHook::Created)
                .or_default()
                .push(Rc::new(|_| Ok(())));
        });
        let delta = child
            .options()
            .modified_since(&child.sealed_options())
            .unwrap();
        assert!(delta.hooks.is_some());
    }

    #[test]
    fn test_inheritance_depth_is_limited() {
        let config = Config::new();
        let mut class = ComponentClass::base(ComponentOptions::new());
        for _ in 0..=MAX_INHERITANCE_DEPTH {
            class = class.extend(ComponentOptions::new(), &config).unwrap();
        }
        let err = resolve_constructor_options(&class, &config).unwrap_err();
        assert!(matches!(err, Error::InheritanceTooDeep { .. }));
    }
}
