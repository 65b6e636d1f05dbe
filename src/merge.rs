//! Options merge engine.
//!
//! [`merge_options`] combines a parent options object with a child definition
//! field by field. The strategy for each field is fixed by the field itself:
//!
//! | field                                   | strategy                              |
//! |-----------------------------------------|---------------------------------------|
//! | lifecycle hooks, `errorCaptured`        | concatenate, parent first, dedupe     |
//! | `components`, `directives`, `filters`   | layered registry, child shadows       |
//! | `data`, `provide`                       | combined evaluator, child keys win    |
//! | `watch`                                 | coalesce per key, parent first        |
//! | `props`, `inject`, `computed`, `methods`| normalized shallow overlay            |
//! | custom keys                             | configured strategy, else override    |
//! | everything else                         | override (child wins)                 |

use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::rc::Rc;

use lazy_static::lazy_static;
use regex::Regex;

use crate::config::Config;
use crate::debug::warn;
use crate::error::Result;
use crate::instance::ComponentInstance;
use crate::options::{
    ComponentOptions, DataOption, HookFn, HookMap, InjectDecl, PropsDecl,
    Registry, WatchCallback, WatchHandler, WatchMap,
};

thread_local! {
    static MERGE_INVOCATIONS: Cell<u64> = const { Cell::new(0) };
}

/// Number of [`merge_options`] calls made on this thread, nested merges included.
pub fn merge_invocations() -> u64 {
    MERGE_INVOCATIONS.with(Cell::get)
}

lazy_static! {
    static ref CUSTOM_ELEMENT_NAME_RE: Regex = Regex::new(
        r"^[a-zA-Z][\-\.0-9_a-zA-Z\x{00B7}\x{00C0}-\x{00D6}\x{00D8}-\x{00F6}\x{00F8}-\x{037D}\x{037F}-\x{1FFF}\x{200C}-\x{200D}\x{203F}-\x{2040}\x{2070}-\x{218F}\x{2C00}-\x{2FEF}\x{3001}-\x{D7FF}\x{F900}-\x{FDCF}\x{FDF0}-\x{FFFD}]*$"
    )
    .unwrap();

    static ref BUILTIN_TAGS: HashSet<&'static str> = ["slot", "component"].into_iter().collect();

    static ref RESERVED_TAGS: HashSet<&'static str> = [
        // HTML
        "html", "body", "base", "head", "link", "meta", "style", "title", "address", "article",
        "aside", "footer", "header", "h1", "h2", "h3", "h4", "h5", "h6", "hgroup", "nav",
        "section", "div", "dd", "dl", "dt", "figcaption", "figure", "picture", "hr", "img", "li",
        "main", "ol", "p", "pre", "ul", "a", "b", "abbr", "bdi", "bdo", "br", "cite", "code",
        "data", "dfn", "em", "i", "kbd", "mark", "q", "rp", "rt", "rtc", "ruby", "s", "samp",
        "small", "span", "strong", "sub", "sup", "time", "u", "var", "wbr", "area", "audio",
        "map", "track", "video", "embed", "object", "param", "source", "canvas", "script",
        "noscript", "del", "ins", "caption", "col", "colgroup", "table", "thead", "tbody", "td",
        "th", "tr", "button", "datalist", "fieldset", "form", "input", "label", "legend", "meter",
        "optgroup", "option", "output", "progress", "select", "textarea", "details", "dialog",
        "menu", "menuitem", "summary", "content", "element", "shadow", "template", "blockquote",
        "iframe", "tfoot",
        // SVG
        "svg", "animate", "circle", "clippath", "cursor", "defs", "desc", "ellipse", "filter",
        "font-face", "foreignobject", "g", "glyph", "image", "line", "marker", "mask",
        "missing-glyph", "path", "pattern", "polygon", "polyline", "rect", "switch", "symbol",
        "text", "textpath", "tspan", "use", "view",
    ]
    .into_iter()
    .collect();

    static ref BUILTIN_DIRECTIVES: HashSet<&'static str> = [
        "bind", "cloak", "else", "else-if", "for", "html", "if", "model", "on", "once", "pre",
        "show", "slot", "text",
    ]
    .into_iter()
    .collect();
}

/// Advisory check for a component registration name. Returns whether the name is acceptable.
pub fn validate_component_name(name: &str, config: &Config) -> bool {
    if !CUSTOM_ELEMENT_NAME_RE.is_match(name) {
        warn(
            config,
            &format!(
                "Invalid component name: \"{}\". Component names should conform to valid custom element name in html5 specification.",
                name
            ),
            None,
        );
        return false;
    }
    let lower = name.to_lowercase();
    if BUILTIN_TAGS.contains(lower.as_str()) || RESERVED_TAGS.contains(lower.as_str()) {
        warn(
            config,
            &format!(
                "Do not use built-in or reserved HTML elements as component id: {}",
                name
            ),
            None,
        );
        return false;
    }
    true
}

pub fn validate_directive_name(name: &str, config: &Config) {
    if BUILTIN_DIRECTIVES.contains(name) {
        warn(
            config,
            &format!(
                "Do not use built-in directive ids as custom directive id: {}",
                name
            ),
            None,
        );
    }
}

fn check_asset_names(child: &ComponentOptions, config: &Config) {
    if let Some(components) = &child.components {
        for (name, _) in components.own_entries() {
            validate_component_name(name, config);
        }
    }
    if let Some(directives) = &child.directives {
        for (name, _) in directives.own_entries() {
            validate_directive_name(name, config);
        }
    }
}

/// Merges `child` over `parent`.
///
/// `vm` is present when merging for a concrete instance and absent when a
/// class is being defined. Malformed custom options are the only fatal
/// outcome; naming problems are reported as warnings and the merge goes on.
pub fn merge_options(
    parent: &ComponentOptions,
    child: &ComponentOptions,
    vm: Option<&ComponentInstance>,
    config: &Config,
) -> Result<ComponentOptions> {
    MERGE_INVOCATIONS.with(|count| count.set(count.get() + 1));

    if config.dev_mode() {
        check_asset_names(child, config);
    }

    // `extends` and `mixins` fold into the parent first. A merged object has
    // already had them applied.
    let mut base: Option<ComponentOptions> = None;
    if !child.merged {
        if let Some(extends) = &child.extends {
            base = Some(merge_options(parent, extends, vm, config)?);
        }
        if let Some(mixins) = &child.mixins {
            for mixin in mixins.iter() {
                let current = base.as_ref().unwrap_or(parent);
                base = Some(merge_options(current, mixin, vm, config)?);
            }
        }
    }
    let parent = base.as_ref().unwrap_or(parent);

    if vm.is_none() && config.dev_mode() {
        if child.el.is_some() {
            warn(
                config,
                "option \"el\" can only be used during instance creation.",
                None,
            );
        }
        if matches!(child.data, Some(DataOption::Record(_))) {
            warn(
                config,
                "The \"data\" option should be a function that returns a per-instance value in component definitions.",
                None,
            );
        }
    }

    let mut merged = ComponentOptions {
        name: child.name.clone().or_else(|| parent.name.clone()),
        data: merge_data_or_fn(&parent.data, &child.data),
        props: merge_props(&parent.props, &child.props),
        computed: overlay_map(&parent.computed, &child.computed),
        methods: overlay_map(&parent.methods, &child.methods),
        watch: merge_watch(&parent.watch, &child.watch),
        inject: merge_inject(&parent.inject, &child.inject),
        provide: merge_data_or_fn(&parent.provide, &child.provide),
        hooks: merge_hooks(&parent.hooks, &child.hooks),
        error_captured: concat_dedupe(&parent.error_captured, &child.error_captured),
        components: merge_registry(&parent.components, &child.components),
        directives: merge_registry(&parent.directives, &child.directives),
        filters: merge_registry(&parent.filters, &child.filters),
        mixins: child.mixins.clone().or_else(|| parent.mixins.clone()),
        extends: child.extends.clone().or_else(|| parent.extends.clone()),
        template: child.template.clone().or_else(|| parent.template.clone()),
        render: child.render.clone().or_else(|| parent.render.clone()),
        static_render_fns: child
            .static_render_fns
            .clone()
            .or_else(|| parent.static_render_fns.clone()),
        el: child.el.clone().or_else(|| parent.el.clone()),
        delimiters: child
            .delimiters
            .clone()
            .or_else(|| parent.delimiters.clone()),
        comments: child.comments.or(parent.comments),
        is_abstract: child.is_abstract.or(parent.is_abstract),
        extra: BTreeMap::new(),
        merged: true,
    };

    let keys: BTreeSet<&String> = parent.extra.keys().chain(child.extra.keys()).collect();
    for key in keys {
        let parent_value = parent.extra.get(key);
        let child_value = child.extra.get(key);
        let value = match config.option_merge_strategies.get(key.as_str()) {
            Some(strategy) => strategy(parent_value, child_value)?,
            None => child_value.or(parent_value).cloned(),
        };
        if let Some(value) = value {
            merged.extra.insert(key.clone(), value);
        }
    }

    Ok(merged)
}

// ═══════════════════════════════════════════════════════════════════════════════
// STRATEGIES
// ═══════════════════════════════════════════════════════════════════════════════

/// Both sides present: an evaluator that runs the child, then the parent, and
/// lays the child's keys over the parent's.
fn merge_data_or_fn(parent: &Option<DataOption>, child: &Option<DataOption>) -> Option<DataOption> {
    match (parent, child) {
        (None, None) => None,
        (Some(only), None) | (None, Some(only)) => Some(only.clone()),
        (Some(parent), Some(child)) => {
            let parent = parent.clone();
            let child = child.clone();
            Some(DataOption::from_fn(move |vm| {
                let own = child.evaluate(vm)?;
                let mut record = parent.evaluate(vm)?;
                for (key, value) in own {
                    record.insert(key, value);
                }
                Ok(record)
            }))
        }
    }
}

fn concat_dedupe<T: ?Sized>(
    parent: &Option<Rc<Vec<Rc<T>>>>,
    child: &Option<Rc<Vec<Rc<T>>>>,
) -> Option<Rc<Vec<Rc<T>>>> {
    match (parent, child) {
        (None, None) => None,
        (Some(only), None) | (None, Some(only)) => Some(only.clone()),
        (Some(parent), Some(child)) => Some(Rc::new(dedupe(parent.iter().chain(child.iter())))),
    }
}

/// Keeps the first occurrence of each handler.
fn dedupe<'a, T: ?Sized + 'a>(handlers: impl Iterator<Item = &'a Rc<T>>) -> Vec<Rc<T>> {
    let mut out: Vec<Rc<T>> = Vec::new();
    for handler in handlers {
        if !out.iter().any(|seen| Rc::ptr_eq(seen, handler)) {
            out.push(handler.clone());
        }
    }
    out
}

fn merge_hooks(parent: &Option<Rc<HookMap>>, child: &Option<Rc<HookMap>>) -> Option<Rc<HookMap>> {
    match (parent, child) {
        (None, None) => None,
        (Some(only), None) | (None, Some(only)) => Some(only.clone()),
        (Some(parent), Some(child)) => {
            let mut merged = HookMap::new();
            let hooks: BTreeSet<_> = parent.keys().chain(child.keys()).copied().collect();
            for hook in hooks {
                let parent_handlers = parent.get(&hook).into_iter().flatten();
                let child_handlers = child.get(&hook).into_iter().flatten();
                let handlers: Vec<HookFn> = dedupe(parent_handlers.chain(child_handlers));
                merged.insert(hook, handlers);
            }
            Some(Rc::new(merged))
        }
    }
}

/// New layer over `parent` holding the child's own entries.
fn merge_registry<T: Clone>(
    parent: &Option<Rc<Registry<T>>>,
    child: &Option<Rc<Registry<T>>>,
) -> Option<Rc<Registry<T>>> {
    match (parent, child) {
        (None, None) => None,
        (None, Some(child)) => Some(child.clone()),
        (Some(parent), child) => {
            let mut layer = Registry::extending(parent.clone());
            if let Some(child) = child {
                for (key, value) in child.own_entries() {
                    layer.insert(key.clone(), value.clone());
                }
            }
            Some(Rc::new(layer))
        }
    }
}

fn merge_watch(parent: &Option<Rc<WatchMap>>, child: &Option<Rc<WatchMap>>) -> Option<Rc<WatchMap>> {
    match (parent, child) {
        (None, None) => None,
        (Some(only), None) | (None, Some(only)) => Some(only.clone()),
        (Some(parent), Some(child)) => {
            let mut merged = (**parent).clone();
            for (key, handlers) in child.iter() {
                let slot = merged.entry(key.clone()).or_default();
                for handler in handlers {
                    if !contains_watch_fn(slot, handler) {
                        slot.push(handler.clone());
                    }
                }
            }
            Some(Rc::new(merged))
        }
    }
}

/// A function handler already in `handlers`, compared by identity.
/// Method handlers are names and may legitimately repeat.
fn contains_watch_fn(handlers: &[WatchHandler], handler: &WatchHandler) -> bool {
    let WatchCallback::Fn(f) = &handler.callback else {
        return false;
    };
    handlers.iter().any(|seen| match &seen.callback {
        WatchCallback::Fn(g) => Rc::ptr_eq(f, g),
        WatchCallback::Method(_) => false,
    })
}

fn overlay_map<V: Clone>(
    parent: &Option<Rc<BTreeMap<String, V>>>,
    child: &Option<Rc<BTreeMap<String, V>>>,
) -> Option<Rc<BTreeMap<String, V>>> {
    match (parent, child) {
        (None, None) => None,
        (Some(only), None) | (None, Some(only)) => Some(only.clone()),
        (Some(parent), Some(child)) => {
            let mut merged = (**parent).clone();
            merged.extend(child.iter().map(|(k, v)| (k.clone(), v.clone())));
            Some(Rc::new(merged))
        }
    }
}

fn merge_props(parent: &Option<Rc<PropsDecl>>, child: &Option<Rc<PropsDecl>>) -> Option<Rc<PropsDecl>> {
    match (parent, child) {
        (None, None) => None,
        (Some(parent), None) => Some(parent.clone()),
        (parent, Some(child)) => {
            let mut merged = parent
                .as_ref()
                .map(|parent| parent.normalized())
                .unwrap_or_default();
            merged.extend(child.normalized());
            Some(Rc::new(PropsDecl::Keyed(merged)))
        }
    }
}

fn merge_inject(
    parent: &Option<Rc<InjectDecl>>,
    child: &Option<Rc<InjectDecl>>,
) -> Option<Rc<InjectDecl>> {
    match (parent, child) {
        (None, None) => None,
        (Some(parent), None) => Some(parent.clone()),
        (parent, Some(child)) => {
            let mut merged = parent
                .as_ref()
                .map(|parent| parent.normalized())
                .unwrap_or_default();
            merged.extend(child.normalized());
            Some(Rc::new(InjectDecl::Keyed(merged)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::options::{ComponentRef, LifecycleHook, PropOptions, PropType, WatchHandler};
    use serde_json::{json, Value};
    use std::cell::RefCell;

    fn capture_config() -> (Config, Rc<RefCell<Vec<String>>>) {
        let warnings = Rc::new(RefCell::new(Vec::new()));
        let sink = warnings.clone();
        let config = Config::new().with_warn_handler(move |msg, _, _| {
            sink.borrow_mut().push(msg.to_string());
        });
        (config, warnings)
    }

    #[test]
    fn test_hooks_concatenate_parent_first() {
        let parent = ComponentOptions::new()
            .on(LifecycleHook::Created, |_| Ok(()))
            .on(LifecycleHook::Mounted, |_| Ok(()));
        let child = ComponentOptions::new().on(LifecycleHook::Created, |_| Ok(()));

        let merged = merge_options(&parent, &child, None, &Config::new()).unwrap();
        let created = merged.hook_handlers(LifecycleHook::Created);
        assert_eq!(created.len(), 2);
        assert!(Rc::ptr_eq(
            &created[0],
            &parent.hook_handlers(LifecycleHook::Created)[0]
        ));
        assert!(Rc::ptr_eq(
            &created[1],
            &child.hook_handlers(LifecycleHook::Created)[0]
        ));
        assert_eq!(merged.hook_handlers(LifecycleHook::Mounted).len(), 1);
    }

    #[test]
    fn test_shared_hook_reached_twice_runs_once() {
        let shared: HookFn = Rc::new(|_| Ok(()));
        let mixin = Rc::new(ComponentOptions::new().on_shared(LifecycleHook::Created, shared.clone()));
        let child = ComponentOptions::new()
            .mixin(mixin.clone())
            .mixin(mixin)
            .on_shared(LifecycleHook::Created, shared);

        let merged = merge_options(&ComponentOptions::new(), &child, None, &Config::new()).unwrap();
        assert_eq!(merged.hook_handlers(LifecycleHook::Created).len(), 1);
    }

    #[test]
    fn test_watch_coalesces_same_key() {
        let parent = ComponentOptions::new().watch("count", WatchHandler::method("fromParent"));
        let child = ComponentOptions::new()
            .watch("count", WatchHandler::method("fromChild"))
            .watch("other", WatchHandler::method("onOther"));

        let merged = merge_options(&parent, &child, None, &Config::new()).unwrap();
        let watch = merged.watch.unwrap();
        let names: Vec<_> = watch["count"]
            .iter()
            .map(|handler| match &handler.callback {
                crate::options::WatchCallback::Method(name) => name.clone(),
                _ => String::new(),
            })
            .collect();
        assert_eq!(names, vec!["fromParent", "fromChild"]);
        assert_eq!(watch["other"].len(), 1);
    }

    #[test]
    fn test_watch_function_reached_twice_runs_once() {
        let shared = WatchHandler::from_fn(|_, _, _| Ok(()));
        let parent = ComponentOptions::new().watch("count", shared.clone());
        let child = ComponentOptions::new()
            .watch("count", shared)
            .watch("count", WatchHandler::from_fn(|_, _, _| Ok(())));

        let merged = merge_options(&parent, &child, None, &Config::new()).unwrap();
        assert_eq!(merged.watch.unwrap()["count"].len(), 2);
    }

    #[test]
    fn test_registry_child_shadows_parent() {
        let parent = ComponentOptions::new()
            .component("shared-item", ComponentRef::definition(ComponentOptions::new().named("parent")))
            .component("parent-only", ComponentRef::definition(ComponentOptions::new()));
        let child = ComponentOptions::new()
            .component("shared-item", ComponentRef::definition(ComponentOptions::new().named("child")));

        let merged = merge_options(&parent, &child, None, &Config::new()).unwrap();
        let components = merged.components.unwrap();
        match components.get("shared-item") {
            Some(ComponentRef::Definition(def)) => {
                assert_eq!(def.options.name.as_deref(), Some("child"))
            }
            other => panic!("unexpected entry {:?}", other),
        }
        assert!(components.contains("parent-only"));
        assert!(components.get_own("parent-only").is_none());
    }

    #[test]
    fn test_props_overlay_normalizes_array_form() {
        let parent = ComponentOptions::new().props(["first-name", "age"]);
        let child = ComponentOptions::new().prop("age", PropOptions::typed(PropType::Number));

        let merged = merge_options(&parent, &child, None, &Config::new()).unwrap();
        let props = merged.props_map();
        assert_eq!(props.len(), 2);
        assert!(props.contains_key("firstName"));
        assert_eq!(props["age"].types, vec![PropType::Number]);
    }

    #[test]
    fn test_other_fields_override() {
        let parent = ComponentOptions::new()
            .named("parent")
            .template("<p>parent</p>")
            .custom("flavor", json!("vanilla"));
        let child = ComponentOptions::new().custom("flavor", json!("mint"));

        let merged = merge_options(&parent, &child, None, &Config::new()).unwrap();
        assert_eq!(merged.name.as_deref(), Some("parent"));
        assert!(merged.template.is_some());
        assert_eq!(merged.extra["flavor"], json!("mint"));
        assert!(merged.is_merged());
    }

    #[test]
    fn test_custom_strategy_applies_and_can_fail() {
        let config = Config::new().with_merge_strategy("tags", |parent, child| {
            let mut tags: Vec<Value> = Vec::new();
            for side in [parent, child].into_iter().flatten() {
                match side {
                    Value::Array(items) => tags.extend(items.iter().cloned()),
                    other => return Err(Error::invalid_option("tags", "an array", other)),
                }
            }
            Ok(Some(Value::Array(tags)))
        });

        let parent = ComponentOptions::new().custom("tags", json!(["a"]));
        let child = ComponentOptions::new().custom("tags", json!(["b"]));
        let merged = merge_options(&parent, &child, None, &config).unwrap();
        assert_eq!(merged.extra["tags"], json!(["a", "b"]));

        let bad = ComponentOptions::new().custom("tags", json!(7));
        assert!(merge_options(&parent, &bad, None, &config).is_err());
    }

    #[test]
    fn test_extends_and_mixins_apply_before_child() {
        let base = ComponentOptions::new().computed("fromBase", |_| Ok(json!(1)));
        let mixin = ComponentOptions::new().method("fromMixin", |_, _| Ok(Value::Null));
        let child = ComponentOptions::new().extends(base).mixin(mixin);

        let merged = merge_options(&ComponentOptions::new(), &child, None, &Config::new()).unwrap();
        assert!(merged.computed.unwrap().contains_key("fromBase"));
        assert!(merged.methods.unwrap().contains_key("fromMixin"));
    }

    #[test]
    fn test_reserved_names_warn_without_aborting() {
        let (config, warnings) = capture_config();
        let child = ComponentOptions::new()
            .component("div", ComponentRef::definition(ComponentOptions::new()))
            .component("1bad", ComponentRef::definition(ComponentOptions::new()))
            .directive("show", Default::default());

        let merged = merge_options(&ComponentOptions::new(), &child, None, &config).unwrap();
        assert!(merged.components.unwrap().contains("div"));
        let warnings = warnings.borrow();
        assert_eq!(warnings.len(), 3);
        assert!(warnings[0].contains("Invalid component name"));
        assert!(warnings[1].contains("reserved HTML elements"));
        assert!(warnings[2].contains("built-in directive"));
    }

    #[test]
    fn test_definition_data_record_warns() {
        let (config, warnings) = capture_config();
        let child = ComponentOptions::new().data_record(Default::default());
        merge_options(&ComponentOptions::new(), &child, None, &config).unwrap();
        assert_eq!(warnings.borrow().len(), 1);
        assert!(warnings.borrow()[0].contains("should be a function"));
    }

    #[test]
    fn test_merge_counter_advances() {
        let before = merge_invocations();
        let child = ComponentOptions::new().mixin(ComponentOptions::new());
        merge_options(&ComponentOptions::new(), &child, None, &Config::new()).unwrap();
        assert_eq!(merge_invocations() - before, 2);
    }
}
