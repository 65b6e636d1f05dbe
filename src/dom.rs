//! Host document: parsing, selector queries, markup extraction and node replacement.

use std::rc::Rc;

use html5ever::parse_document;
use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use tendril::TendrilSink;
use markup5ever_rcdom::{NodeData, RcDom, SerializableHandle};

pub use markup5ever_rcdom::Handle;

use crate::error::{CompileError, ERR_PARSE};

/// Selector lookup against a host document.
pub trait DomQuery {
    /// First element matching `selector` (`#id`, `.class` or a tag name).
    fn query(&self, selector: &str) -> Option<Handle>;
}

pub struct Document {
    dom: RcDom,
}

impl Document {
    pub fn parse(html: &str) -> Result<Self, CompileError> {
        let dom = parse_document(RcDom::default(), Default::default())
            .from_utf8()
            .read_from(&mut html.as_bytes())
            .map_err(|e| CompileError::new(ERR_PARSE, &format!("Failed to parse HTML: {}", e)))?;
        Ok(Self { dom })
    }

    /// The document node itself.
    pub fn root(&self) -> Handle {
        self.dom.document.clone()
    }

    pub fn document_element(&self) -> Option<Handle> {
        find_first(&self.dom.document, &|node| tag_name(node).as_deref() == Some("html"))
    }

    pub fn body(&self) -> Option<Handle> {
        find_first(&self.dom.document, &|node| tag_name(node).as_deref() == Some("body"))
    }

    pub fn to_html(&self) -> String {
        serialize_node(&self.dom.document, TraversalScope::ChildrenOnly(None))
    }
}

impl DomQuery for Document {
    fn query(&self, selector: &str) -> Option<Handle> {
        let selector = selector.trim();
        if let Some(id) = selector.strip_prefix('#') {
            find_first(&self.dom.document, &|node| attr(node, "id").as_deref() == Some(id))
        } else if let Some(class) = selector.strip_prefix('.') {
            find_first(&self.dom.document, &|node| {
                attr(node, "class").is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
            })
        } else if !selector.is_empty() {
            let tag = selector.to_ascii_lowercase();
            find_first(&self.dom.document, &|node| tag_name(node).as_deref() == Some(tag.as_str()))
        } else {
            None
        }
    }
}

fn find_first(node: &Handle, pred: &dyn Fn(&Handle) -> bool) -> Option<Handle> {
    for child in node.children.borrow().iter() {
        if matches!(child.data, NodeData::Element { .. }) && pred(child) {
            return Some(child.clone());
        }
        if let Some(found) = find_first(child, pred) {
            return Some(found);
        }
    }
    None
}

pub fn tag_name(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.to_string()),
        _ => None,
    }
}

pub fn attr(node: &Handle, name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| &*a.name.local == name)
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

/// `<html>` and `<body>` must never be replaced by a mount.
pub fn is_document_root(node: &Handle) -> bool {
    matches!(tag_name(node).as_deref(), Some("html") | Some("body"))
}

pub fn outer_html(node: &Handle) -> String {
    serialize_node(node, TraversalScope::IncludeNode)
}

pub fn inner_html(node: &Handle) -> String {
    serialize_node(node, TraversalScope::ChildrenOnly(None))
}

pub fn text_content(node: &Handle) -> String {
    match &node.data {
        NodeData::Text { contents } => contents.borrow().to_string(),
        _ => node.children.borrow().iter().map(text_content).collect(),
    }
}

fn serialize_node(node: &Handle, traversal_scope: TraversalScope) -> String {
    let mut bytes = Vec::new();
    let handle: SerializableHandle = node.clone().into();
    let opts = SerializeOpts {
        traversal_scope,
        ..Default::default()
    };
    if let Err(err) = serialize(&mut bytes, &handle, opts) {
        log::error!("failed to serialize node: {}", err);
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

pub fn parent_of(node: &Handle) -> Option<Handle> {
    let weak = node.parent.take();
    let parent = weak.as_ref().and_then(|weak| weak.upgrade());
    node.parent.set(weak);
    parent
}

/// Parses `markup` into detached body-level nodes.
pub fn parse_nodes(markup: &str) -> Result<Vec<Handle>, CompileError> {
    let doc = Document::parse(markup)?;
    let Some(body) = doc.body() else {
        return Ok(Vec::new());
    };
    let nodes: Vec<Handle> = body.children.borrow_mut().drain(..).collect();
    for node in &nodes {
        node.parent.set(None);
    }
    Ok(nodes)
}

/// Puts `replacements` where `old` sits in its parent. Returns `false` when
/// `old` is detached.
pub fn replace_node(old: &Handle, replacements: Vec<Handle>) -> bool {
    let Some(parent) = parent_of(old) else {
        return false;
    };
    let mut children = parent.children.borrow_mut();
    let Some(index) = children.iter().position(|child| Rc::ptr_eq(child, old)) else {
        return false;
    };
    for node in &replacements {
        node.parent.set(Some(Rc::downgrade(&parent)));
    }
    children.splice(index..=index, replacements);
    old.parent.set(None);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html><html><head></head><body><div id="app" class="shell main"><p>Hello</p></div><section>tail</section></body></html>"#;

    #[test]
    fn test_query_forms() {
        let doc = Document::parse(PAGE).unwrap();
        let by_id = doc.query("#app").unwrap();
        assert_eq!(tag_name(&by_id).as_deref(), Some("div"));
        assert!(Rc::ptr_eq(&doc.query(".main").unwrap(), &by_id));
        assert_eq!(text_content(&doc.query("section").unwrap()), "tail");
        assert!(doc.query("#missing").is_none());
    }

    #[test]
    fn test_inner_and_outer_html() {
        let doc = Document::parse(PAGE).unwrap();
        let app = doc.query("#app").unwrap();
        assert_eq!(inner_html(&app), "<p>Hello</p>");
        assert_eq!(outer_html(&app), r#"<div id="app" class="shell main"><p>Hello</p></div>"#);
    }

    #[test]
    fn test_document_roots() {
        let doc = Document::parse(PAGE).unwrap();
        assert!(is_document_root(&doc.document_element().unwrap()));
        assert!(is_document_root(&doc.body().unwrap()));
        assert!(!is_document_root(&doc.query("#app").unwrap()));
    }

    #[test]
    fn test_replace_node_keeps_siblings() {
        let doc = Document::parse(PAGE).unwrap();
        let app = doc.query("#app").unwrap();
        let nodes = parse_nodes("<main>new</main>").unwrap();
        assert!(replace_node(&app, nodes));
        let body = doc.body().unwrap();
        assert_eq!(inner_html(&body), "<main>new</main><section>tail</section>");
        assert!(parent_of(&app).is_none());
    }
}
