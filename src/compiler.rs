//! Template compiler: markup → render function.
//!
//! [`HtmlCompiler`] parses a template with html5ever, lowers it to a small
//! template tree, hoists fully static subtrees into separate render functions
//! and returns closures that build [`VNode`] trees against a
//! [`RenderContext`].
//!
//! Supported template syntax:
//!
//! - `{{ path }}` interpolation, custom delimiters, `{{ path | filter }}`
//! - `:attr="path"` / `v-bind:attr` bound attributes
//! - `@event="method"` / `v-on:event` listeners on component tags
//! - `<slot name="...">fallback</slot>`
//! - PascalCase or hyphenated tags resolve against registered components
//!
//! Results are memoized by a SHA-256 key over the template and the options
//! that affect code generation.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use html5ever::parse_document;
use tendril::TendrilSink;
use lazy_static::lazy_static;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{
    CompileError, HookError, ERR_MULTIPLE_ROOTS, ERR_NO_ROOT, ERR_PARSE, ERR_UNCLOSED_INTERPOLATION,
};
use crate::options::Record;
use crate::render::{RenderContext, RenderFn};
use crate::vnode::{ComponentVNode, ElementVNode, VNode};

/// Turns template markup into render functions.
pub trait TemplateCompiler {
    fn compile(&self, template: &str, config: &CompileConfig) -> CompiledTemplate;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompileConfig {
    /// Attach byte ranges to diagnostics.
    pub output_source_range: bool,
    /// Decode `&#10;` / `&#9;` in attribute values.
    pub should_decode_newlines: bool,
    /// Decode `&#10;` / `&#9;` in `href` values.
    pub should_decode_newlines_for_href: bool,
    pub delimiters: Option<(String, String)>,
    /// Keep template comments in the rendered output.
    pub comments: bool,
}

#[derive(Clone)]
pub struct CompiledTemplate {
    pub render: RenderFn,
    pub static_render_fns: Vec<RenderFn>,
    pub errors: Vec<CompileError>,
}

impl std::fmt::Debug for CompiledTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledTemplate")
            .field("static_render_fns", &self.static_render_fns.len())
            .field("errors", &self.errors)
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEMPLATE TREE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
enum Operand {
    Path(String),
    Literal(Value),
}

#[derive(Debug, Clone)]
struct Expression {
    operand: Operand,
    filters: Vec<String>,
}

#[derive(Debug, Clone)]
enum TextPart {
    Literal(String),
    Expr(Expression),
}

#[derive(Debug, Clone)]
struct ElementNode {
    tag: String,
    attrs: Vec<(String, String)>,
    bindings: Vec<(String, Expression)>,
    listeners: Vec<(String, String)>,
    children: Vec<TemplateNode>,
    maybe_component: bool,
}

#[derive(Debug, Clone)]
enum TemplateNode {
    Element(ElementNode),
    Text(Vec<TextPart>),
    Comment(String),
    Slot {
        name: String,
        fallback: Vec<TemplateNode>,
    },
    /// Index into the hoisted static render functions.
    Static(usize),
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRE-PASSES
// ═══════════════════════════════════════════════════════════════════════════════

const ORIG_NAME_ATTR: &str = "data-orig-name";

lazy_static! {
    static ref DEFAULT_INTERPOLATION_RE: Regex = Regex::new(r"\{\{((?s:.)+?)\}\}").unwrap();
    static ref TAG_OPEN_RE: Regex = Regex::new(r"<([A-Z][a-zA-Z0-9]*)(\s|/?>)").unwrap();
    static ref SELF_CLOSING_RE: Regex =
        Regex::new(r"<([A-Z][a-zA-Z0-9]*|[a-z][a-z0-9]*-[a-z0-9-]*)(\s[^>]*?)?\s*/>").unwrap();
    static ref ATTR_VALUE_RE: Regex =
        Regex::new(r#"(\s)([^\s=/>"']+)="([^"]*)""#).unwrap();
}

/// `<TodoItem />` and `<todo-item />` become open/close pairs; html5ever
/// would otherwise nest the following siblings inside them.
fn convert_self_closing_components(html: &str) -> String {
    SELF_CLOSING_RE
        .replace_all(html, |caps: &regex::Captures| {
            let name = &caps[1];
            let attrs = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            format!("<{}{}></{}>", name, attrs, name)
        })
        .to_string()
}

/// Records PascalCase tag names before html5ever lowercases them.
fn mark_component_tags(html: &str) -> String {
    TAG_OPEN_RE
        .replace_all(html, |caps: &regex::Captures| {
            let name = &caps[1];
            let sep = &caps[2];
            format!("<{} {}=\"{}\"{}", name, ORIG_NAME_ATTR, name, sep)
        })
        .to_string()
}

/// Newline entities in attribute values are kept literally unless the
/// matching decode flag is set.
fn protect_newline_entities(html: &str, config: &CompileConfig) -> String {
    if config.should_decode_newlines && config.should_decode_newlines_for_href {
        return html.to_string();
    }
    ATTR_VALUE_RE
        .replace_all(html, |caps: &regex::Captures| {
            let name = &caps[2];
            let value = &caps[3];
            let decode = if name.eq_ignore_ascii_case("href") {
                config.should_decode_newlines_for_href
            } else {
                config.should_decode_newlines
            };
            if decode {
                caps[0].to_string()
            } else {
                let value = value.replace("&#10;", "&amp;#10;").replace("&#9;", "&amp;#9;");
                format!("{}{}=\"{}\"", &caps[1], name, value)
            }
        })
        .to_string()
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOWERING
// ═══════════════════════════════════════════════════════════════════════════════

struct Lowering<'a> {
    source: &'a str,
    config: &'a CompileConfig,
    interpolation: Regex,
    open_delimiter: String,
    errors: Vec<CompileError>,
}

impl<'a> Lowering<'a> {
    fn new(source: &'a str, config: &'a CompileConfig) -> Self {
        let (interpolation, open) = match &config.delimiters {
            Some((open, close)) => {
                let pattern = format!("{}((?s:.)+?){}", regex::escape(open), regex::escape(close));
                match Regex::new(&pattern) {
                    Ok(re) => (re, open.clone()),
                    Err(_) => (DEFAULT_INTERPOLATION_RE.clone(), "{{".to_string()),
                }
            }
            None => (DEFAULT_INTERPOLATION_RE.clone(), "{{".to_string()),
        };
        Self {
            source,
            config,
            interpolation,
            open_delimiter: open,
            errors: Vec::new(),
        }
    }

    fn error(&mut self, code: &str, message: &str) {
        let mut error = CompileError::new(code, message);
        if self.config.output_source_range {
            error = error.with_range(0, self.source.len());
        }
        self.errors.push(error);
    }

    /// Top-level nodes, with the html/head/body wrappers html5ever adds flattened away.
    fn collect_roots(&mut self, handle: &Handle, out: &mut Vec<TemplateNode>) {
        for child in handle.children.borrow().iter() {
            match &child.data {
                NodeData::Element { name, .. }
                    if matches!(&*name.local, "html" | "head" | "body") =>
                {
                    self.collect_roots(child, out)
                }
                _ => {
                    if let Some(node) = self.lower(child) {
                        out.push(node);
                    }
                }
            }
        }
    }

    fn lower_children(&mut self, handle: &Handle) -> Vec<TemplateNode> {
        handle
            .children
            .borrow()
            .iter()
            .filter_map(|child| self.lower(child))
            .collect()
    }

    fn lower(&mut self, handle: &Handle) -> Option<TemplateNode> {
        match &handle.data {
            NodeData::Text { contents } => {
                let text = contents.borrow().to_string();
                if text.trim().is_empty() {
                    return if text.contains('\n') {
                        None
                    } else {
                        Some(TemplateNode::Text(vec![TextPart::Literal(" ".to_string())]))
                    };
                }
                Some(TemplateNode::Text(self.parse_text(&text)))
            }
            NodeData::Comment { contents } => self
                .config
                .comments
                .then(|| TemplateNode::Comment(contents.to_string())),
            NodeData::Element {
                name,
                attrs,
                template_contents,
                ..
            } => {
                let mut tag = name.local.to_string();
                let mut maybe_component = tag.contains('-');
                let mut static_attrs = Vec::new();
                let mut bindings = Vec::new();
                let mut listeners = Vec::new();

                for attr in attrs.borrow().iter() {
                    let attr_name = attr.name.local.to_string();
                    let value = attr.value.to_string();
                    if attr_name == ORIG_NAME_ATTR {
                        tag = value;
                        maybe_component = true;
                    } else if let Some(prop) = attr_name
                        .strip_prefix(':')
                        .or_else(|| attr_name.strip_prefix("v-bind:"))
                    {
                        bindings.push((prop.to_string(), parse_expression(&value)));
                    } else if let Some(event) = attr_name
                        .strip_prefix('@')
                        .or_else(|| attr_name.strip_prefix("v-on:"))
                    {
                        listeners.push((event.to_string(), value.trim().to_string()));
                    } else {
                        static_attrs.push((attr_name, value));
                    }
                }

                let children = match template_contents.borrow().as_ref() {
                    Some(contents) => self.lower_children(contents),
                    None => self.lower_children(handle),
                };

                if tag == "slot" {
                    let name = static_attrs
                        .iter()
                        .find(|(key, _)| key == "name")
                        .map(|(_, value)| value.clone())
                        .unwrap_or_else(|| "default".to_string());
                    return Some(TemplateNode::Slot {
                        name,
                        fallback: children,
                    });
                }

                Some(TemplateNode::Element(ElementNode {
                    tag,
                    attrs: static_attrs,
                    bindings,
                    listeners,
                    children,
                    maybe_component,
                }))
            }
            _ => None,
        }
    }

    fn parse_text(&mut self, text: &str) -> Vec<TextPart> {
        let mut parts = Vec::new();
        let mut last = 0;
        for caps in self.interpolation.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            if whole.start() > last {
                parts.push(TextPart::Literal(text[last..whole.start()].to_string()));
            }
            parts.push(TextPart::Expr(parse_expression(&caps[1])));
            last = whole.end();
        }
        if last < text.len() {
            let rest = &text[last..];
            if rest.contains(self.open_delimiter.as_str()) {
                let message = format!("Unclosed interpolation in text: {}", rest.trim());
                self.error(ERR_UNCLOSED_INTERPOLATION, &message);
            }
            parts.push(TextPart::Literal(rest.to_string()));
        }
        parts
    }
}

/// `path | filterA | filterB`, where `path` may also be a JSON literal or a
/// single-quoted string.
fn parse_expression(source: &str) -> Expression {
    let mut segments = source.split('|').map(str::trim);
    let head = segments.next().unwrap_or_default();
    let operand = if head.len() >= 2 && head.starts_with('\'') && head.ends_with('\'') {
        Operand::Literal(Value::String(head[1..head.len() - 1].to_string()))
    } else {
        match serde_json::from_str::<Value>(head) {
            Ok(value) => Operand::Literal(value),
            Err(_) => Operand::Path(head.to_string()),
        }
    };
    Expression {
        operand,
        filters: segments
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATIC HOISTING
// ═══════════════════════════════════════════════════════════════════════════════

fn is_static(node: &TemplateNode) -> bool {
    match node {
        TemplateNode::Element(el) => {
            !el.maybe_component
                && el.bindings.is_empty()
                && el.listeners.is_empty()
                && el.children.iter().all(is_static)
        }
        TemplateNode::Text(parts) => parts.iter().all(|part| matches!(part, TextPart::Literal(_))),
        TemplateNode::Comment(_) | TemplateNode::Static(_) => true,
        TemplateNode::Slot { .. } => false,
    }
}

/// A static element is worth hoisting unless it only wraps a single text node.
fn is_static_root(node: &TemplateNode) -> bool {
    match node {
        TemplateNode::Element(el) => {
            is_static(node)
                && !el.children.is_empty()
                && !(el.children.len() == 1 && matches!(el.children[0], TemplateNode::Text(_)))
        }
        _ => false,
    }
}

fn hoist(node: TemplateNode, statics: &mut Vec<VNode>) -> TemplateNode {
    if is_static_root(&node) {
        statics.push(to_static_vnode(&node));
        return TemplateNode::Static(statics.len() - 1);
    }
    match node {
        TemplateNode::Element(mut el) => {
            el.children = el
                .children
                .into_iter()
                .map(|child| hoist(child, statics))
                .collect();
            TemplateNode::Element(el)
        }
        TemplateNode::Slot { name, fallback } => TemplateNode::Slot {
            name,
            fallback: fallback
                .into_iter()
                .map(|child| hoist(child, statics))
                .collect(),
        },
        other => other,
    }
}

fn to_static_vnode(node: &TemplateNode) -> VNode {
    match node {
        TemplateNode::Element(el) => VNode::Element(ElementVNode {
            tag: el.tag.clone(),
            attrs: el.attrs.clone(),
            children: el.children.iter().map(to_static_vnode).collect(),
            is_static: true,
        }),
        TemplateNode::Text(parts) => VNode::Text(
            parts
                .iter()
                .map(|part| match part {
                    TextPart::Literal(text) => text.as_str(),
                    TextPart::Expr(_) => "",
                })
                .collect(),
        ),
        TemplateNode::Comment(text) => VNode::Comment(text.clone()),
        TemplateNode::Slot { .. } | TemplateNode::Static(_) => VNode::empty(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RENDERING
// ═══════════════════════════════════════════════════════════════════════════════

fn evaluate(expr: &Expression, ctx: &dyn RenderContext) -> Value {
    let mut value = match &expr.operand {
        Operand::Path(path) => ctx.lookup(path).unwrap_or(Value::Null),
        Operand::Literal(value) => value.clone(),
    };
    for filter in &expr.filters {
        value = ctx.apply_filter(filter, value);
    }
    value
}

/// Interpolated text form of a value.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => {
            serde_json::to_string_pretty(value).unwrap_or_default()
        }
        other => other.to_string(),
    }
}

fn render_node(
    node: &TemplateNode,
    ctx: &dyn RenderContext,
    out: &mut Vec<VNode>,
) -> Result<(), HookError> {
    match node {
        TemplateNode::Text(parts) => {
            let text: String = parts
                .iter()
                .map(|part| match part {
                    TextPart::Literal(text) => text.clone(),
                    TextPart::Expr(expr) => display_value(&evaluate(expr, ctx)),
                })
                .collect();
            out.push(VNode::Text(text));
        }
        TemplateNode::Comment(text) => out.push(VNode::Comment(text.clone())),
        TemplateNode::Static(index) => out.push(ctx.render_static(*index)),
        TemplateNode::Slot { name, fallback } => {
            let provided = ctx.slot(name);
            if provided.is_empty() {
                for child in fallback {
                    render_node(child, ctx, out)?;
                }
            } else {
                out.extend(provided);
            }
        }
        TemplateNode::Element(el) => {
            let mut children = Vec::new();
            for child in &el.children {
                render_node(child, ctx, &mut children)?;
            }

            if el.maybe_component {
                if let Some(ctor) = ctx.resolve_component(&el.tag) {
                    let mut props_data = Record::new();
                    for (key, value) in &el.attrs {
                        props_data.insert(key.clone(), Value::String(value.clone()));
                    }
                    for (key, expr) in &el.bindings {
                        props_data.insert(key.clone(), evaluate(expr, ctx));
                    }
                    let mut listeners = crate::events::Listeners::new();
                    for (event, method) in &el.listeners {
                        listeners
                            .entry(event.clone())
                            .or_default()
                            .push(ctx.bind_listener(method));
                    }
                    out.push(VNode::Component(Rc::new(ComponentVNode {
                        tag: el.tag.clone(),
                        ctor,
                        props_data,
                        listeners,
                        children,
                    })));
                    return Ok(());
                }
            }

            let mut attrs = el.attrs.clone();
            for (key, expr) in &el.bindings {
                match evaluate(expr, ctx) {
                    Value::Null | Value::Bool(false) => {}
                    Value::Bool(true) => attrs.push((key.clone(), String::new())),
                    value => attrs.push((key.clone(), display_value(&value))),
                }
            }
            out.push(VNode::Element(ElementVNode {
                tag: el.tag.clone(),
                attrs,
                children,
                is_static: false,
            }));
        }
    }
    Ok(())
}

fn render_root(root: Option<&TemplateNode>, ctx: &dyn RenderContext) -> Result<VNode, HookError> {
    let Some(root) = root else {
        return Ok(VNode::empty());
    };
    let mut out = Vec::new();
    render_node(root, ctx, &mut out)?;
    Ok(out.into_iter().next().unwrap_or_else(VNode::empty))
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILER
// ═══════════════════════════════════════════════════════════════════════════════

/// Memo key over everything that changes the generated code.
pub fn compute_hash(template: &str, config: &CompileConfig) -> String {
    let mut hasher = Sha256::new();
    hasher.update(template.as_bytes());
    if let Some((open, close)) = &config.delimiters {
        hasher.update(b"\0delimiters\0");
        hasher.update(open.as_bytes());
        hasher.update(b"\0");
        hasher.update(close.as_bytes());
    }
    hasher.update([
        config.comments as u8,
        config.should_decode_newlines as u8,
        config.should_decode_newlines_for_href as u8,
        config.output_source_range as u8,
    ]);
    format!("{:x}", hasher.finalize())
}

/// Reference compiler built on html5ever.
#[derive(Default)]
pub struct HtmlCompiler {
    memo: RefCell<HashMap<String, CompiledTemplate>>,
    compilations: Cell<usize>,
}

impl HtmlCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Templates actually compiled, memo hits excluded.
    pub fn compilations(&self) -> usize {
        self.compilations.get()
    }

    fn compile_uncached(&self, template: &str, config: &CompileConfig) -> CompiledTemplate {
        self.compilations.set(self.compilations.get() + 1);

        let prepared = convert_self_closing_components(template);
        let prepared = mark_component_tags(&prepared);
        let prepared = protect_newline_entities(&prepared, config);

        let mut lowering = Lowering::new(template, config);
        let parsed = parse_document(RcDom::default(), Default::default())
            .from_utf8()
            .read_from(&mut prepared.as_bytes());
        let mut roots = Vec::new();
        match parsed {
            Ok(dom) => lowering.collect_roots(&dom.document, &mut roots),
            Err(e) => lowering.error(ERR_PARSE, &format!("Failed to parse template: {}", e)),
        }

        let elements: Vec<TemplateNode> = roots
            .into_iter()
            .filter(|node| !matches!(node, TemplateNode::Text(_) | TemplateNode::Comment(_)))
            .collect();
        if elements.is_empty() && lowering.errors.is_empty() {
            lowering.error(
                ERR_NO_ROOT,
                "Component template requires a root element, rather than just text.",
            );
        } else if elements.len() > 1 {
            lowering.error(
                ERR_MULTIPLE_ROOTS,
                "Component template should contain exactly one root element.",
            );
        }

        let mut statics = Vec::new();
        let root = elements
            .into_iter()
            .next()
            .map(|node| hoist(node, &mut statics));

        let root = root.map(Rc::new);
        let render: RenderFn =
            Rc::new(move |ctx: &dyn RenderContext| render_root(root.as_deref(), ctx));
        let static_render_fns = statics
            .into_iter()
            .map(|tree| -> RenderFn { Rc::new(move |_: &dyn RenderContext| Ok(tree.clone())) })
            .collect();

        CompiledTemplate {
            render,
            static_render_fns,
            errors: lowering.errors,
        }
    }
}

impl TemplateCompiler for HtmlCompiler {
    fn compile(&self, template: &str, config: &CompileConfig) -> CompiledTemplate {
        let key = compute_hash(template, config);
        if let Some(hit) = self.memo.borrow().get(&key) {
            return hit.clone();
        }
        let compiled = self.compile_uncached(template, config);
        self.memo.borrow_mut().insert(key, compiled.clone());
        compiled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ComponentClass;
    use crate::events::Listener;
    use serde_json::json;
    use std::collections::BTreeMap;

    /// Render context over a plain record.
    struct MapContext {
        values: Record,
        statics: Vec<RenderFn>,
        slots: BTreeMap<String, Vec<VNode>>,
    }

    impl MapContext {
        fn new(values: Value, compiled: &CompiledTemplate) -> Self {
            Self {
                values: values.as_object().cloned().unwrap_or_default(),
                statics: compiled.static_render_fns.clone(),
                slots: BTreeMap::new(),
            }
        }
    }

    impl RenderContext for MapContext {
        fn lookup(&self, path: &str) -> Option<Value> {
            self.values.get(path).cloned()
        }
        fn apply_filter(&self, name: &str, value: Value) -> Value {
            match (name, value) {
                ("upper", Value::String(s)) => Value::String(s.to_uppercase()),
                (_, value) => value,
            }
        }
        fn render_static(&self, index: usize) -> VNode {
            (self.statics[index])(self).unwrap()
        }
        fn resolve_component(&self, _tag: &str) -> Option<Rc<ComponentClass>> {
            None
        }
        fn bind_listener(&self, _method: &str) -> Listener {
            Rc::new(|_| Ok(()))
        }
        fn slot(&self, name: &str) -> Vec<VNode> {
            self.slots.get(name).cloned().unwrap_or_default()
        }
        fn warn(&self, _msg: &str) {}
    }

    fn render(template: &str, config: &CompileConfig, values: Value) -> (String, CompiledTemplate) {
        let compiled = HtmlCompiler::new().compile(template, config);
        let ctx = MapContext::new(values, &compiled);
        let vnode = (compiled.render)(&ctx).unwrap();
        (vnode.to_html(), compiled)
    }

    #[test]
    fn test_interpolation_and_filters() {
        let (html, compiled) = render(
            "<div>{{ msg }} / {{ msg | upper }} / {{ 'lit' }}</div>",
            &CompileConfig::default(),
            json!({ "msg": "hi" }),
        );
        assert!(compiled.errors.is_empty());
        assert_eq!(html, "<div>hi / HI / lit</div>");
    }

    #[test]
    fn test_custom_delimiters() {
        let config = CompileConfig {
            delimiters: Some(("[[".into(), "]]".into())),
            ..Default::default()
        };
        let (html, _) = render("<p>[[ count ]] {{ raw }}</p>", &config, json!({ "count": 3 }));
        assert_eq!(html, "<p>3 {{ raw }}</p>");
    }

    #[test]
    fn test_bound_attributes() {
        let (html, _) = render(
            r#"<a :href="url" :hidden="off" class="link">go</a>"#,
            &CompileConfig::default(),
            json!({ "url": "/home", "off": false }),
        );
        assert_eq!(html, r#"<a class="link" href="/home">go</a>"#);
    }

    #[test]
    fn test_static_subtree_is_hoisted() {
        let (html, compiled) = render(
            "<div><ul><li>one</li><li>two</li></ul><span>{{ n }}</span></div>",
            &CompileConfig::default(),
            json!({ "n": 1 }),
        );
        assert_eq!(compiled.static_render_fns.len(), 1);
        assert_eq!(html, "<div><ul><li>one</li><li>two</li></ul><span>1</span></div>");
    }

    #[test]
    fn test_comments_kept_only_on_request() {
        let template = "<div><!-- note -->x</div>";
        let (dropped, _) = render(template, &CompileConfig::default(), json!({}));
        assert_eq!(dropped, "<div>x</div>");

        let config = CompileConfig {
            comments: true,
            ..Default::default()
        };
        let (kept, _) = render(template, &config, json!({}));
        assert_eq!(kept, "<div><!-- note -->x</div>");
    }

    #[test]
    fn test_slot_fallback() {
        let (html, _) = render(
            "<div><slot>fallback</slot></div>",
            &CompileConfig::default(),
            json!({}),
        );
        assert_eq!(html, "<div>fallback</div>");
    }

    #[test]
    fn test_root_errors() {
        let compiler = HtmlCompiler::new();
        let multiple = compiler.compile("<p>a</p><p>b</p>", &CompileConfig::default());
        assert_eq!(multiple.errors[0].code, ERR_MULTIPLE_ROOTS);

        let config = CompileConfig {
            output_source_range: true,
            ..Default::default()
        };
        let text_only = compiler.compile("just text", &config);
        assert_eq!(text_only.errors[0].code, ERR_NO_ROOT);
        assert_eq!(text_only.errors[0].range, Some((0, 9)));
    }

    #[test]
    fn test_unclosed_interpolation_reported() {
        let compiler = HtmlCompiler::new();
        let compiled = compiler.compile("<p>{{ open</p>", &CompileConfig::default());
        assert_eq!(compiled.errors[0].code, ERR_UNCLOSED_INTERPOLATION);
    }

    #[test]
    fn test_newline_entities_follow_decode_flags() {
        let template = r#"<a title="a&#10;b" href="x&#10;y">t</a>"#;
        let (kept, _) = render(template, &CompileConfig::default(), json!({}));
        assert!(kept.contains("title=\"a&amp;#10;b\""));

        let config = CompileConfig {
            should_decode_newlines: true,
            ..Default::default()
        };
        let (decoded, _) = render(template, &config, json!({}));
        assert!(decoded.contains("title=\"a\nb\""));
        assert!(decoded.contains("href=\"x&amp;#10;y\""));
    }

    #[test]
    fn test_memo_skips_recompilation() {
        let compiler = HtmlCompiler::new();
        let config = CompileConfig::default();
        let first = compiler.compile("<div>{{ a }}</div>", &config);
        let second = compiler.compile("<div>{{ a }}</div>", &config);
        assert_eq!(compiler.compilations(), 1);
        assert!(Rc::ptr_eq(&first.render, &second.render));

        compiler.compile("<div>{{ a }}</div>", &CompileConfig {
            comments: true,
            ..Default::default()
        });
        assert_eq!(compiler.compilations(), 2);
    }

    #[test]
    fn test_component_tags_are_marked() {
        assert_eq!(
            convert_self_closing_components(r#"<TodoItem :item="x" />"#),
            r#"<TodoItem :item="x"></TodoItem>"#
        );
        assert_eq!(
            mark_component_tags("<TodoItem>"),
            r#"<TodoItem data-orig-name="TodoItem">"#
        );
    }
}
