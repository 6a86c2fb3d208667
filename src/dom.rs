//! Structured element construction.
//!
//! Markup is never assembled by string interpolation. Records are turned into
//! a small [`Node`] tree and serialised with explicit escaping, so untrusted
//! text from the API (descriptions, comments, usernames) can only ever end up
//! as text or as a quoted attribute value.

use std::fmt::Write as _;

const VOID_ELEMENTS: &[&str] = &["area", "br", "hr", "img", "input", "link", "meta"];
const URL_ATTRIBUTES: &[&str] = &["href", "src"];

/// A node in a rendered tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Node {
    pub fn text(s: impl Into<String>) -> Self {
        Node::Text(s.into())
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        }
    }

    pub fn write_html(&self, out: &mut String) {
        match self {
            Node::Element(e) => e.write_html(out),
            Node::Text(t) => out.push_str(&escape_text(t)),
        }
    }

    pub fn text_content(&self) -> String {
        match self {
            Node::Element(e) => e.text_content(),
            Node::Text(t) => t.clone(),
        }
    }
}

impl From<Element> for Node {
    fn from(e: Element) -> Self {
        Node::Element(e)
    }
}

/// An element with attributes and children
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self { tag: tag.to_string(), attrs: Vec::new(), children: Vec::new() }
    }

    pub fn class(self, class: &str) -> Self {
        self.attr("class", class)
    }

    /// Set an attribute; `href`/`src` values are filtered through [`safe_url`]
    pub fn attr(mut self, name: &str, value: &str) -> Self {
        let value = if URL_ATTRIBUTES.contains(&name) {
            safe_url(value, name == "src")
        } else {
            value.to_string()
        };
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name.to_string(), value)),
        }
        self
    }

    pub fn child(mut self, node: impl Into<Node>) -> Self {
        self.children.push(node.into());
        self
    }

    pub fn children(mut self, nodes: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(nodes);
        self
    }

    pub fn text(self, s: impl Into<String>) -> Self {
        self.child(Node::Text(s.into()))
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.get_attr("class")
            .map(|c| c.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    /// Depth-first search for descendants (self included) matching `pred`
    pub fn find_all<'a>(&'a self, pred: &dyn Fn(&Element) -> bool) -> Vec<&'a Element> {
        let mut found = Vec::new();
        self.collect(pred, &mut found);
        found
    }

    fn collect<'a>(&'a self, pred: &dyn Fn(&Element) -> bool, found: &mut Vec<&'a Element>) {
        if pred(self) {
            found.push(self);
        }
        for child in &self.children {
            if let Node::Element(e) = child {
                e.collect(pred, found);
            }
        }
    }

    pub fn text_content(&self) -> String {
        self.children.iter().map(Node::text_content).collect()
    }

    pub fn write_html(&self, out: &mut String) {
        let _ = write!(out, "<{}", self.tag);
        for (k, v) in &self.attrs {
            let _ = write!(out, " {}=\"{}\"", k, escape_attr(v));
        }
        out.push('>');
        if VOID_ELEMENTS.contains(&self.tag.as_str()) {
            return;
        }
        for child in &self.children {
            child.write_html(out);
        }
        let _ = write!(out, "</{}>", self.tag);
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }
}

/// Root element that a page renders into
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    id: String,
    children: Vec<Node>,
}

impl Container {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string(), children: Vec::new() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Drop every existing child and install `nodes` in order
    pub fn replace_children(&mut self, nodes: impl IntoIterator<Item = Node>) {
        self.children.clear();
        self.children.extend(nodes);
    }

    pub fn append(&mut self, node: impl Into<Node>) {
        self.children.push(node.into());
    }

    pub fn text_content(&self) -> String {
        self.children.iter().map(Node::text_content).collect()
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        let _ = write!(out, "<div id=\"{}\">", escape_attr(&self.id));
        for child in &self.children {
            child.write_html(&mut out);
        }
        out.push_str("</div>");
        out
    }
}

/// Escape text for use between tags
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape text for use inside a double-quoted attribute value
pub fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Neutralise script-bearing URL schemes.
///
/// `javascript:` and `vbscript:` never survive. `data:` is only kept for
/// image sources. Rejected links become `#`, rejected sources become empty.
pub fn safe_url(url: &str, is_source: bool) -> String {
    let normalized: String = url
        .trim()
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();

    let rejected = normalized.starts_with("javascript:")
        || normalized.starts_with("vbscript:")
        || (normalized.starts_with("data:") && !(is_source && normalized.starts_with("data:image/")));

    if rejected {
        log::warn!("dropping unsafe URL in rendered markup");
        if is_source { String::new() } else { "#".to_string() }
    } else {
        url.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_and_attributes_are_escaped() {
        let el = Element::new("p")
            .attr("title", "\"quoted\" & 'single'")
            .text("<script>alert(1)</script>");
        assert_eq!(
            el.to_html(),
            "<p title=\"&quot;quoted&quot; &amp; &#39;single&#39;\">&lt;script&gt;alert(1)&lt;/script&gt;</p>"
        );
    }

    #[test]
    fn void_elements_have_no_closing_tag() {
        let img = Element::new("img").attr("src", "/a.png").attr("alt", "x");
        assert_eq!(img.to_html(), "<img src=\"/a.png\" alt=\"x\">");
    }

    #[test]
    fn unsafe_schemes_are_dropped() {
        assert_eq!(safe_url("javascript:alert(1)", false), "#");
        assert_eq!(safe_url("  JaVa\tScript:alert(1)", false), "#");
        assert_eq!(safe_url("data:text/html,<b>", true), "");
        assert_eq!(safe_url("data:image/png;base64,AAAA", true), "data:image/png;base64,AAAA");
        assert_eq!(safe_url("/user.html?username=a", false), "/user.html?username=a");
    }

    #[test]
    fn replace_children_clears_previous_content() {
        let mut c = Container::new("content");
        c.append(Element::new("div").text("old"));
        c.append(Element::new("div").text("older"));
        c.replace_children(vec![Node::from(Element::new("div").text("new"))]);
        assert_eq!(c.len(), 1);
        assert_eq!(c.text_content(), "new");
        assert_eq!(c.to_html(), "<div id=\"content\"><div>new</div></div>");
    }

    #[test]
    fn attr_overwrites_existing_value() {
        let el = Element::new("a").class("x").class("y");
        assert_eq!(el.attrs.len(), 1);
        assert!(el.has_class("y"));
        assert!(!el.has_class("x"));
    }
}
