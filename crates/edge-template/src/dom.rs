//! Template markup parsed into an `RcDom` tree.
//!
//! Base templates rendered as documents go through the full HTML tree
//! builder, so `<html>`, `<head>` and `<body>` always exist. Child templates
//! and fragment-mode templates are parsed as the content of a `<body>`.

use html5ever::tendril::TendrilSink;
use html5ever::{LocalName, Namespace, ParseOpts, QualName};
use markup5ever_rcdom::{Handle, NodeData, RcDom};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Elements that never have children or an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Parse a full document and return its document node.
pub fn parse_document(markup: &str) -> Handle {
    html5ever::parse_document(RcDom::default(), ParseOpts::default())
        .one(markup)
        .document
}

/// Parse markup as `<body>` content and return the top-level nodes.
pub fn parse_fragment(markup: &str) -> Vec<Handle> {
    let context = QualName::new(
        None,
        Namespace::from(HTML_NAMESPACE),
        LocalName::from("body"),
    );
    let dom = html5ever::parse_fragment(RcDom::default(), ParseOpts::default(), context, Vec::new())
        .one(markup);

    // The fragment's nodes hang off a synthetic <html> root.
    let root = dom.document.children.borrow().first().cloned();
    let Some(html) = root else {
        return Vec::new();
    };
    let nodes = html.children.borrow().clone();
    nodes
}

/// Local name of an element node.
pub fn element_name(node: &Handle) -> Option<&str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(&*name.local),
        _ => None,
    }
}

/// Value of an element attribute. Boolean attributes yield `Some("")`.
pub fn attribute(node: &Handle, name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| &*attr.name.local == name)
            .map(|attr| String::from(&*attr.value)),
        _ => None,
    }
}

/// Child nodes of an element, reading through `<template>` contents.
pub fn children(node: &Handle) -> Vec<Handle> {
    if let NodeData::Element {
        template_contents, ..
    } = &node.data
    {
        if let Some(contents) = template_contents.borrow().as_ref() {
            return contents.children.borrow().clone();
        }
    }
    node.children.borrow().clone()
}

/// Check if an element can never have content.
pub fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(nodes: &[Handle]) -> Vec<String> {
        nodes
            .iter()
            .map(|n| element_name(n).unwrap_or("#text").to_string())
            .collect()
    }

    #[test]
    fn test_document_gets_html_head_and_body() {
        let document = parse_document("<p>x</p>");
        let roots = children(&document);
        assert_eq!(names(&roots), vec!["html"]);
        assert_eq!(names(&children(&roots[0])), vec!["head", "body"]);
    }

    #[test]
    fn test_fragment_top_level_nodes() {
        let nodes = parse_fragment(r#"intro<meta slot="head" charset="utf-8"><fragment src="a"></fragment>"#);
        assert_eq!(names(&nodes), vec!["#text", "meta", "fragment"]);
        assert_eq!(attribute(&nodes[1], "slot").as_deref(), Some("head"));
        assert_eq!(attribute(&nodes[2], "async"), None);
    }

    #[test]
    fn test_attribute_values_are_decoded() {
        let nodes = parse_fragment(r#"<fragment src="http://a/?x=1&amp;y=2" primary></fragment>"#);
        assert_eq!(attribute(&nodes[0], "src").as_deref(), Some("http://a/?x=1&y=2"));
        assert_eq!(attribute(&nodes[0], "primary").as_deref(), Some(""));
    }

    #[test]
    fn test_template_contents_are_children() {
        let nodes = parse_fragment("<template><b>x</b></template>");
        assert_eq!(names(&children(&nodes[0])), vec!["b"]);
    }

    #[test]
    fn test_void_elements() {
        assert!(is_void("meta"));
        assert!(!is_void("fragment"));
    }
}
