//! Parsed XML document tree
//!
//! Elements live in an arena indexed by [`NodeId`] in document order. Node 0
//! is the document node; its single child is the root element.

use crate::error::{Error, Result};
use crate::query::{Match, Query};
use once_cell::sync::Lazy;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::bytes::Regex;
use std::collections::BTreeMap;

/// Namespace prefix to URI bindings used when evaluating queries.
pub type Namespaces = BTreeMap<String, String>;

pub type NodeId = usize;

/// The document node.
pub const DOCUMENT: NodeId = 0;

static DECLARED_ENCODING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*<\?xml[^>]*?encoding\s*=\s*["']([A-Za-z0-9._\-]+)["']"#)
        .expect("xml declaration regex")
});

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub prefix: Option<String>,
    pub local_name: String,
    pub namespace: Option<String>,
    pub value: String,
}

impl Attribute {
    pub fn name(&self) -> String {
        qualified(self.prefix.as_deref(), &self.local_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeKind {
    #[default]
    Document,
    Element,
    Text,
}

/// Arena node. Text runs are nodes of their own, interleaved with element
/// children in document order.
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub kind: NodeKind,
    pub prefix: Option<String>,
    pub local_name: String,
    pub namespace: Option<String>,
    pub attributes: Vec<Attribute>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Character data; only set on text nodes.
    pub text: String,
}

impl Node {
    pub fn is_element(&self) -> bool {
        self.kind == NodeKind::Element
    }

    pub fn is_text(&self) -> bool {
        self.kind == NodeKind::Text
    }

    pub fn name(&self) -> String {
        qualified(self.prefix.as_deref(), &self.local_name)
    }

    /// Value of the unprefixed attribute `name`.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.prefix.is_none() && a.local_name == name)
            .map(|a| a.value.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    /// Parse `bytes` as XML.
    ///
    /// `encoding_hint` is the charset from the Content-Type header; without
    /// it the encoding declared in the XML prolog (or a BOM) is used, and
    /// UTF-8 otherwise.
    pub fn parse(bytes: &[u8], encoding_hint: Option<&str>) -> Result<Self> {
        let label = encoding_hint
            .map(str::to_string)
            .or_else(|| declared_encoding(bytes));
        let text = decode_bytes(bytes, label.as_deref());
        Self::parse_str(&text)
    }

    pub fn parse_str(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().check_end_names = true;

        let mut nodes = vec![Node::default()];
        let mut stack: Vec<NodeId> = vec![DOCUMENT];
        let mut scopes: Vec<Namespaces> = vec![Namespaces::new()];

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let id = open_element(&mut nodes, &stack, &mut scopes, &e)?;
                    stack.push(id);
                }
                Ok(Event::Empty(e)) => {
                    open_element(&mut nodes, &stack, &mut scopes, &e)?;
                    scopes.pop();
                }
                Ok(Event::End(_)) => {
                    if stack.len() > 1 {
                        stack.pop();
                        scopes.pop();
                    }
                }
                Ok(Event::Text(e)) => {
                    let text = e
                        .unescape()
                        .map_err(|err| Error::Parse(err.to_string()))?;
                    append_text(&mut nodes, &stack, &text)?;
                }
                Ok(Event::CData(e)) => {
                    append_text(&mut nodes, &stack, &String::from_utf8_lossy(&e))?;
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::Parse(format!(
                        "at position {}: {e}",
                        reader.error_position()
                    )))
                }
                _ => {}
            }
        }

        if stack.len() > 1 {
            return Err(Error::Parse("unexpected end of document".into()));
        }
        if nodes[DOCUMENT].children.is_empty() {
            return Err(Error::Parse("no root element".into()));
        }

        Ok(Document { nodes })
    }

    pub fn root_element(&self) -> NodeId {
        self.nodes[DOCUMENT].children[0]
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Element children of `id`, skipping text.
    pub fn child_elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[id]
            .children
            .iter()
            .copied()
            .filter(|&c| self.nodes[c].is_element())
    }

    /// `id` followed by all its descendants, in document order.
    pub fn descendants_or_self(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            out.push(next);
            pending.extend(self.nodes[next].children.iter().rev());
        }
        out
    }

    /// Concatenated text of `id` and all its descendants, in document order.
    pub fn string_value(&self, id: NodeId) -> String {
        self.descendants_or_self(id)
            .into_iter()
            .map(|n| self.nodes[n].text.as_str())
            .collect()
    }

    /// Evaluate `expr` from the document node.
    pub fn query(&self, expr: &str, namespaces: &Namespaces) -> Result<Vec<Match>> {
        Query::parse(expr)?.evaluate(self, DOCUMENT, namespaces)
    }
}

/// Add character data under the innermost open element, extending the
/// previous text node when the two are adjacent.
fn append_text(nodes: &mut Vec<Node>, stack: &[NodeId], text: &str) -> Result<()> {
    let parent = *stack.last().unwrap_or(&DOCUMENT);
    if parent == DOCUMENT {
        if text.trim().is_empty() {
            return Ok(());
        }
        return Err(Error::Parse(format!(
            "text outside the root element: '{}'",
            text.trim()
        )));
    }
    if text.is_empty() {
        return Ok(());
    }

    if let Some(&last) = nodes[parent].children.last() {
        if nodes[last].is_text() {
            nodes[last].text.push_str(text);
            return Ok(());
        }
    }

    let id = nodes.len();
    nodes.push(Node {
        kind: NodeKind::Text,
        parent: Some(parent),
        text: text.to_string(),
        ..Node::default()
    });
    nodes[parent].children.push(id);
    Ok(())
}

fn open_element(
    nodes: &mut Vec<Node>,
    stack: &[NodeId],
    scopes: &mut Vec<Namespaces>,
    start: &BytesStart<'_>,
) -> Result<NodeId> {
    let parent = *stack.last().unwrap_or(&DOCUMENT);
    if parent == DOCUMENT && !nodes[DOCUMENT].children.is_empty() {
        return Err(Error::Parse("multiple root elements".into()));
    }

    let mut scope = scopes.last().cloned().unwrap_or_default();
    let mut raw_attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::Parse(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| Error::Parse(e.to_string()))?
            .into_owned();
        if key == "xmlns" {
            scope.insert(String::new(), value);
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            scope.insert(prefix.to_string(), value);
        } else {
            raw_attributes.push((key, value));
        }
    }

    let (prefix, local_name) = split_name(&String::from_utf8_lossy(start.name().as_ref()));
    let namespace = scope
        .get(prefix.as_deref().unwrap_or(""))
        .filter(|uri| !uri.is_empty())
        .cloned();

    let attributes = raw_attributes
        .into_iter()
        .map(|(key, value)| {
            let (prefix, local_name) = split_name(&key);
            // unprefixed attributes are in no namespace
            let namespace = prefix.as_ref().and_then(|p| scope.get(p).cloned());
            Attribute {
                prefix,
                local_name,
                namespace,
                value,
            }
        })
        .collect();

    let id = nodes.len();
    nodes.push(Node {
        kind: NodeKind::Element,
        prefix,
        local_name,
        namespace,
        attributes,
        parent: Some(parent),
        children: Vec::new(),
        text: String::new(),
    });
    nodes[parent].children.push(id);
    scopes.push(scope);
    Ok(id)
}

fn split_name(name: &str) -> (Option<String>, String) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix.to_string()), local.to_string()),
        None => (None, name.to_string()),
    }
}

fn qualified(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(p) => format!("{p}:{local}"),
        None => local.to_string(),
    }
}

/// Encoding named in the `<?xml ... encoding="..."?>` prolog.
pub(crate) fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(256)];
    DECLARED_ENCODING_RE
        .captures(head)
        .map(|cap| String::from_utf8_lossy(&cap[1]).into_owned())
}

/// Decode `bytes` using the charset `label`, falling back to UTF-8.
///
/// A byte order mark takes precedence over the label.
pub(crate) fn decode_bytes(bytes: &[u8], label: Option<&str>) -> String {
    let encoding = label
        .and_then(|l| encoding_rs::Encoding::for_label(l.trim().as_bytes()))
        .unwrap_or(encoding_rs::UTF_8);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}
