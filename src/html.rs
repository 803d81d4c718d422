// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Arena-backed HTML tree.
//!
//! Nodes live in a flat `Vec` and refer to each other by index, so the
//! document grows without reallocation churn and ids resolve through a side
//! map instead of a tree search. Elements carrying an `id` attribute are
//! addressable via [`HtmlDocument::element_by_id`], which is what makes
//! repeated emission of the same component path a no-op instead of a
//! duplicate.

use std::collections::BTreeMap;
use std::fmt::Write;

/// Index of a node within its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum HtmlNode {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        children: Vec<NodeId>,
    },
    Text(String),
}

/// An HTML tree under construction.
#[derive(Debug, Clone)]
pub struct HtmlDocument {
    nodes: Vec<HtmlNode>,
    root: NodeId,
    ids: BTreeMap<String, NodeId>,
}

const VOID_TAGS: &[&str] = &["br", "hr", "img", "input", "meta"];

impl HtmlDocument {
    pub fn new(root_tag: &str, attrs: &[(&str, &str)]) -> Self {
        let mut doc = Self {
            nodes: vec![],
            root: NodeId(0),
            ids: BTreeMap::new(),
        };
        doc.root = doc.element(root_tag, attrs);
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Creates a detached element. An `id` attribute registers the node for
    /// [`Self::element_by_id`]; the first registration of an id wins.
    pub fn element(&mut self, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let id = NodeId(self.nodes.len());
        for (k, v) in attrs {
            if *k == "id" {
                self.ids.entry((*v).to_string()).or_insert(id);
            }
        }
        self.nodes.push(HtmlNode::Element {
            tag: tag.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            children: vec![],
        });
        id
    }

    /// Creates a detached text node. Content is entity-escaped when the
    /// document is serialized, not on insertion.
    pub fn text(&mut self, content: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(HtmlNode::Text(content.to_string()));
        id
    }

    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        if let HtmlNode::Element { children, .. } = &mut self.nodes[parent.0] {
            children.push(child);
        }
    }

    /// Inserts `child` as the first child of `parent` (header rows).
    pub fn prepend(&mut self, parent: NodeId, child: NodeId) {
        if let HtmlNode::Element { children, .. } = &mut self.nodes[parent.0] {
            children.insert(0, child);
        }
    }

    pub fn append_element(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let child = self.element(tag, attrs);
        self.append(parent, child);
        child
    }

    pub fn append_text(&mut self, parent: NodeId, content: &str) {
        let child = self.text(content);
        self.append(parent, child);
    }

    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.ids.get(id).copied()
    }

    pub fn child_count(&self, node: NodeId) -> usize {
        match &self.nodes[node.0] {
            HtmlNode::Element { children, .. } => children.len(),
            HtmlNode::Text(_) => 0,
        }
    }

    pub fn to_html_string(&self) -> String {
        let mut out = String::new();
        self.write_node(self.root, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0] {
            HtmlNode::Text(content) => out.push_str(&escape_html(content)),
            HtmlNode::Element {
                tag,
                attrs,
                children,
            } => {
                let _ = write!(out, "<{tag}");
                for (k, v) in attrs {
                    let _ = write!(out, " {k}=\"{}\"", escape_html(v));
                }
                if children.is_empty() && VOID_TAGS.contains(&tag.as_str()) {
                    out.push_str(" />");
                    return;
                }
                out.push('>');
                for child in children {
                    self.write_node(*child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }
}

/// Escapes the five HTML-significant characters.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Reverses [`escape_html`]. `&amp;` is handled last so doubly-escaped
/// sequences unescape by exactly one level.
pub fn unescape_html(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_and_serialize() {
        let mut doc = HtmlDocument::new("table", &[("border", "1")]);
        let tr = doc.append_element(doc.root(), "tr", &[("id", "row-a")]);
        let td = doc.append_element(tr, "td", &[]);
        doc.append_text(td, "x < y");
        assert_eq!(
            doc.to_html_string(),
            "<table border=\"1\"><tr id=\"row-a\"><td>x &lt; y</td></tr></table>"
        );
    }

    #[test]
    fn test_element_by_id_first_registration_wins() {
        let mut doc = HtmlDocument::new("div", &[]);
        let first = doc.append_element(doc.root(), "p", &[("id", "p1")]);
        let second = doc.append_element(doc.root(), "p", &[("id", "p1")]);
        assert_ne!(first, second);
        assert_eq!(doc.element_by_id("p1"), Some(first));
        assert_eq!(doc.element_by_id("p2"), None);
    }

    #[test]
    fn test_prepend_orders_header_first() {
        let mut doc = HtmlDocument::new("table", &[]);
        let body = doc.element("tr", &[]);
        doc.append(doc.root(), body);
        let header = doc.element("tr", &[("id", "h")]);
        doc.prepend(doc.root(), header);
        assert!(doc
            .to_html_string()
            .starts_with("<table><tr id=\"h\"></tr><tr>"));
    }

    #[test]
    fn test_escape_round_trip() {
        let original = r#"<a href="x">&'quoted'</a>"#;
        assert_eq!(unescape_html(&escape_html(original)), original);
    }

    #[test]
    fn test_unescape_single_level() {
        assert_eq!(unescape_html("&amp;lt;"), "&lt;");
    }

    #[test]
    fn test_void_tags_self_close() {
        let mut doc = HtmlDocument::new("div", &[]);
        doc.append_element(doc.root(), "br", &[]);
        assert_eq!(doc.to_html_string(), "<div><br /></div>");
    }
}
