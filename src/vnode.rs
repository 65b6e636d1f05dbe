//! Virtual nodes produced by render functions.

use std::fmt;
use std::rc::Rc;

use lazy_static::lazy_static;
use std::collections::HashSet;

use crate::class::ComponentClass;
use crate::events::Listeners;
use crate::options::Record;

lazy_static! {
    static ref VOID_ELEMENTS: HashSet<&'static str> = [
        "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
        "track", "wbr",
    ]
    .into_iter()
    .collect();
}

#[derive(Clone)]
pub enum VNode {
    Element(ElementVNode),
    Text(String),
    Comment(String),
    /// Placeholder for a child component, instantiated during patch.
    Component(Rc<ComponentVNode>),
}

#[derive(Clone, Debug, Default)]
pub struct ElementVNode {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<VNode>,
    /// Produced by a hoisted static render function.
    pub is_static: bool,
}

pub struct ComponentVNode {
    pub tag: String,
    pub ctor: Rc<ComponentClass>,
    /// Attributes as written on the tag; props are picked from these at init.
    pub props_data: Record,
    pub listeners: Listeners,
    pub children: Vec<VNode>,
}

impl fmt::Debug for ComponentVNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentVNode")
            .field("tag", &self.tag)
            .field("cid", &self.ctor.cid())
            .field("props_data", &self.props_data)
            .field("listeners", &self.listeners.keys().collect::<Vec<_>>())
            .field("children", &self.children)
            .finish()
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VNode::Element(el) => fmt::Debug::fmt(el, f),
            VNode::Text(text) => write!(f, "Text({:?})", text),
            VNode::Comment(text) => write!(f, "Comment({:?})", text),
            VNode::Component(component) => fmt::Debug::fmt(component, f),
        }
    }
}

impl VNode {
    pub fn element(tag: impl Into<String>, attrs: Vec<(String, String)>, children: Vec<VNode>) -> Self {
        VNode::Element(ElementVNode {
            tag: tag.into(),
            attrs,
            children,
            is_static: false,
        })
    }

    pub fn text(text: impl Into<String>) -> Self {
        VNode::Text(text.into())
    }

    /// Placeholder rendered when there is nothing to show.
    pub fn empty() -> Self {
        VNode::Comment(String::new())
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        match self {
            VNode::Element(el) => el
                .attrs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            VNode::Component(component) => component.props_data.get(name).and_then(|v| v.as_str()),
            _ => None,
        }
    }

    pub fn is_whitespace(&self) -> bool {
        matches!(self, VNode::Text(text) if text.trim().is_empty())
    }

    /// Serializes the tree. Component placeholders must be expanded by the
    /// patcher first; any left over serialize as empty comments.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        match self {
            VNode::Element(el) => {
                out.push('<');
                out.push_str(&el.tag);
                for (name, value) in &el.attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape_attr(value));
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(el.tag.as_str()) {
                    return;
                }
                for child in &el.children {
                    child.write_html(out);
                }
                out.push_str("</");
                out.push_str(&el.tag);
                out.push('>');
            }
            VNode::Text(text) => out.push_str(&escape_text(text)),
            VNode::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            VNode::Component(_) => out.push_str("<!---->"),
        }
    }

    pub fn text_content(&self) -> String {
        match self {
            VNode::Element(el) => el.children.iter().map(VNode::text_content).collect(),
            VNode::Text(text) => text.clone(),
            VNode::Comment(_) => String::new(),
            VNode::Component(component) => {
                component.children.iter().map(VNode::text_content).collect()
            }
        }
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
