//! Owned element tree for the xml based dialects (XACML and GACL).
//!
//! Documents are read once with `quick-xml` and kept as plain owned
//! nodes, so policies never walk a generic document while evaluating.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::{Error, Result};

/// Deepest element nesting accepted; consumers walk the tree recursively.
const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Node {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Node>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Reads a whole document and returns its root element.
    ///
    /// Namespace prefixes are dropped from element and attribute names,
    /// namespace declarations are skipped.
    pub fn parse(document: &str) -> Result<Node> {
        let mut reader = Reader::from_str(document);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Node> = Vec::new();
        let mut root = None;
        loop {
            match reader.read_event()? {
                Event::Start(start) => {
                    if stack.len() >= MAX_DEPTH {
                        return Err(Error::Xml(format!("elements nest deeper than {}", MAX_DEPTH)));
                    }
                    stack.push(Node::from_start(&start)?);
                }
                Event::Empty(start) => {
                    let node = Node::from_start(&start)?;
                    attach(&mut stack, &mut root, node)?;
                }
                Event::End(_) => {
                    let node = stack
                        .pop()
                        .ok_or_else(|| Error::Xml("unexpected closing tag".into()))?;
                    attach(&mut stack, &mut root, node)?;
                }
                Event::Text(text) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&text.unescape()?);
                    }
                }
                Event::CData(data) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(&data));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(Error::Xml(format!("element '{}' is not closed", open.name)));
        }
        root.ok_or_else(|| Error::Xml("document has no root element".into()))
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Node> {
        let mut node = Node::new(String::from_utf8_lossy(start.local_name().as_ref()));
        for attribute in start.attributes() {
            let attribute = attribute?;
            if attribute.key.as_namespace_binding().is_some() {
                continue;
            }
            let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
            let value = attribute.unescape_value()?.into_owned();
            node.attributes.push((key, value));
        }
        Ok(node)
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn push_child(&mut self, child: Node) {
        self.children.push(child);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        self.text.trim()
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Attribute value, treating empty strings as absent.
    pub fn non_empty_attribute(&self, name: &str) -> Option<&str> {
        self.attribute(name).filter(|value| !value.is_empty())
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Structural containment: every child of `other` is contained in some
    /// child of `self`, recursively, and non-empty text must be equal.
    pub fn contains(&self, other: &Node) -> bool {
        if self.name != other.name {
            return false;
        }
        if !other.text().is_empty() && other.text() != self.text() {
            return false;
        }
        other
            .children
            .iter()
            .all(|wanted| self.children.iter().any(|child| child.contains(wanted)))
    }

    /// Evaluates a small path expression against this node taken as the
    /// document root.
    ///
    /// Supported steps: element names (prefixes ignored), `*`, `//` for
    /// descendants, and a trailing `@attribute` or `text()`.
    pub fn select(&self, path: &str) -> Vec<String> {
        let mut steps = Vec::new();
        let mut descendant = false;
        for (index, step) in path.trim().split('/').enumerate() {
            if step.is_empty() {
                // leading "/" is the root, any later empty step comes from "//".
                if index > 0 {
                    descendant = true;
                }
                continue;
            }
            steps.push((descendant, step));
            descendant = false;
        }

        let (last_descendant, last) = match steps.last() {
            Some(last) => *last,
            None => return Vec::new(),
        };
        let terminal = last.starts_with('@') || last == "text()";
        let element_steps = if terminal {
            &steps[..steps.len() - 1]
        } else {
            &steps[..]
        };

        let mut current: Vec<&Node> = Vec::new();
        for (position, (descendant, step)) in element_steps.iter().enumerate() {
            let name = local(step);
            if position == 0 {
                if *descendant {
                    self.collect_descendants(name, true, &mut current);
                } else if matches_step(self, name) {
                    current.push(self);
                }
                continue;
            }
            let mut next = Vec::new();
            for node in current {
                if *descendant {
                    node.collect_descendants(name, false, &mut next);
                } else {
                    next.extend(node.children.iter().filter(|child| matches_step(child, name)));
                }
            }
            current = next;
        }

        if let Some(attribute) = last.strip_prefix('@') {
            if element_steps.is_empty() {
                return Vec::new();
            }
            let attribute = local(attribute);
            // "//@attr" selects the attribute on every element.
            if last_descendant {
                let mut all = Vec::new();
                for node in current {
                    node.collect_descendants("*", true, &mut all);
                }
                current = all;
            }
            return current
                .into_iter()
                .filter_map(|node| node.attribute(attribute))
                .map(str::to_string)
                .collect();
        }

        current
            .into_iter()
            .map(|node| node.text().to_string())
            .collect()
    }

    fn collect_descendants<'a>(&'a self, name: &str, include_self: bool, out: &mut Vec<&'a Node>) {
        if include_self && matches_step(self, name) {
            out.push(self);
        }
        for child in &self.children {
            child.collect_descendants(name, true, out);
        }
    }

    /// Serializes the tree back into an xml string.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_xml(&mut out);
        out
    }

    fn write_xml(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape(value));
            out.push('"');
        }
        if self.children.is_empty() && self.text.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        out.push_str(&escape(&self.text));
        for child in &self.children {
            child.write_xml(out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

fn attach(stack: &mut Vec<Node>, root: &mut Option<Node>, node: Node) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None if root.is_none() => *root = Some(node),
        None => return Err(Error::Xml("document has more than one root element".into())),
    }
    Ok(())
}

fn matches_step(node: &Node, name: &str) -> bool {
    name == "*" || node.name == name
}

fn local(step: &str) -> &str {
    step.rsplit(':').next().unwrap_or(step)
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
