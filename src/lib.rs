/*!
A non-validating, dependency-free [XML 1.0](https://www.w3.org/TR/xml/)
tree parser.

The entry point is [`Document::parse`]. The resulting tree is read-only: its
nodes are arena-indexed, parent links are non-owning back-references, and
there is no mutation or serialization API beyond the JSON projection
([`Node::to_json`]).

This crate does not process DTD internal/external subsets, does not expand
declared entities, does not validate against a schema, and only accepts
UTF-8 input. See [`ParsingOptions`] for the knobs it does expose.
*/

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::fmt;
use std::ops::Range;

mod chars;
mod entity;
mod error;
mod parser;
mod scanner;

pub use error::{Error, ErrorKind};
pub use scanner::TextPos;

/// Options recognized by [`Document::parse`]. All fields are optional in
/// effect (each has a documented default via [`Default`]).
#[derive(Clone, Copy)]
pub struct ParsingOptions {
    /// When `true`, an unknown `&name;` reference is preserved verbatim in
    /// the output text instead of raising [`ErrorKind::UndefinedEntity`].
    /// Default `false`.
    pub ignore_undefined_entities: bool,
    /// When `true`, CDATA sections produce a distinct [`NodeType::Cdata`]
    /// node and are not coalesced with adjacent text. Default `false`
    /// (CDATA becomes indistinguishable [`NodeType::Text`]).
    pub preserve_cdata: bool,
    /// When `false`, comments are not emitted as nodes at all. Default
    /// `true`.
    pub preserve_comments: bool,
    /// Reserved: the doctype's internal/external subset is always
    /// discarded regardless of this flag in the current design. Default
    /// `false`.
    pub preserve_document_type: bool,
    /// Consulted before raising [`ErrorKind::UndefinedEntity`]: returning
    /// `Some(replacement)` expands the reference to `replacement`;
    /// returning `None` falls back to `ignore_undefined_entities` or the
    /// error. A plain function pointer rather than a boxed closure, so
    /// `ParsingOptions` stays `Copy`.
    pub resolve_undefined_entity: Option<fn(&str) -> Option<String>>,
}

impl Default for ParsingOptions {
    fn default() -> Self {
        ParsingOptions {
            ignore_undefined_entities: false,
            preserve_cdata: false,
            preserve_comments: true,
            preserve_document_type: false,
            resolve_undefined_entity: None,
        }
    }
}

/// List of node kinds a [`Node`] can report via [`Node::node_type`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NodeType {
    /// The synthetic root of the [`Document`]; never the XML root element
    /// itself (see [`Document::root`] vs. [`Document::root_element`]).
    Document,
    /// An element node. Only elements carry a name and attributes.
    Element,
    /// A text node, including coalesced CDATA when `preserve_cdata` is
    /// off.
    Text,
    /// A CDATA section, kept distinct from `Text` only when
    /// `preserve_cdata` is on.
    Cdata,
    /// A comment node.
    Comment,
    /// A processing instruction.
    Pi,
}

/// A processing instruction's target and optional content.
#[derive(Clone, Debug)]
pub struct Pi {
    target: String,
    value: Option<String>,
}

impl Pi {
    /// The PI target name (never `xml`, case-insensitively).
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The PI's content, if any followed the target.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct NodeId(usize);

#[derive(Debug)]
enum NodeKind {
    Document,
    Element {
        name: String,
        attributes: Range<usize>,
        is_root: bool,
    },
    Text(String),
    Cdata(String),
    Comment(String),
    Pi(Pi),
}

#[derive(Debug)]
struct NodeData {
    parent: Option<NodeId>,
    prev_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
    children: Option<(NodeId, NodeId)>,
    kind: NodeKind,
    orig_pos: usize,
}

/// A single parsed attribute: name, normalized value, and the byte
/// positions of both in the source (see [`Node::attribute_pos`]).
#[derive(Clone)]
pub struct Attribute {
    name: String,
    value: String,
    attr_pos: usize,
    value_pos: usize,
}

impl Attribute {
    /// The attribute's name, exactly as written (colon permitted, not
    /// split into prefix/local parts).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The attribute's value after reference expansion and whitespace
    /// normalization.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Byte offset of the attribute name in the source document.
    pub fn pos(&self) -> usize {
        self.attr_pos
    }

    /// Byte offset of the attribute value's opening quote content in the
    /// source document.
    pub fn value_pos(&self) -> usize {
        self.value_pos
    }
}

/// An XML tree, produced by [`Document::parse`].
///
/// There are no separate Rust types for each node kind; every node is a
/// [`Node`], and [`Node::node_type`] tells you which of the closed set of
/// kinds you have.
pub struct Document<'d> {
    text: &'d str,
    nodes: Vec<NodeData>,
    attrs: Vec<Attribute>,
}

impl<'d> Document<'d> {
    /// Parses a complete XML 1.0 document from `text`.
    ///
    /// A leading U+FEFF byte-order mark is accepted and discarded. On any
    /// well-formedness violation, returns the single fatal [`Error`]; there
    /// is no partial-tree recovery.
    pub fn parse(text: &'d str, options: ParsingOptions) -> Result<Self, Error> {
        parser::parse(text, options)
    }

    /// Returns the synthetic document node. Its children are the root
    /// element plus any top-level comments/processing instructions.
    pub fn root<'a>(&'a self) -> Node<'a, 'd> {
        Node { id: NodeId(0), doc: self }
    }

    /// Returns the document's unique root element.
    ///
    /// Unlike [`Document::root`], this always returns an `Element` node;
    /// every successfully parsed document has exactly one.
    pub fn root_element<'a>(&'a self) -> Node<'a, 'd> {
        self.root()
            .children()
            .find(|n| n.is_element())
            .expect("a parsed document always has exactly one root element")
    }

    /// An iterator over every descendant of the document node, i.e. every
    /// node in the tree.
    pub fn descendants<'a>(&'a self) -> Descendants<'a, 'd> {
        self.root().descendants()
    }

    /// Computes the 1-based [`TextPos`] for a byte offset into the
    /// original source text.
    ///
    /// This walks the source from the start, so it is not cheap; reserved
    /// for diagnostics and tooling, not hot-path use.
    pub fn text_pos_from(&self, byte_pos: usize) -> TextPos {
        scanner::text_pos_from_str(self.text, byte_pos)
    }

    /// Serializes the whole document as a [`Json`] value, in the shape
    /// described by the data model: `Document` with a `children` array,
    /// parent links omitted.
    pub fn to_json(&self) -> Json {
        self.root().to_json()
    }
}

impl<'d> fmt::Debug for Document<'d> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fn write_children(node: Node, depth: usize, f: &mut fmt::Formatter) -> fmt::Result {
            for child in node.children() {
                for _ in 0..depth {
                    write!(f, "    ")?;
                }
                writeln!(f, "{:?}", child)?;
                if child.has_children() {
                    write_children(child, depth + 1, f)?;
                }
            }
            Ok(())
        }

        writeln!(f, "Document [")?;
        write_children(self.root(), 1, f)?;
        write!(f, "]")
    }
}

/// A handle to one node in a [`Document`].
///
/// Cheap to copy: it is a document reference plus an arena index, not an
/// owned subtree.
pub struct Node<'a, 'd: 'a> {
    id: NodeId,
    doc: &'a Document<'d>,
}

impl<'a, 'd> Copy for Node<'a, 'd> {}

impl<'a, 'd> Clone for Node<'a, 'd> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, 'd> PartialEq for Node<'a, 'd> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && std::ptr::eq(self.doc, other.doc)
    }
}

impl<'a, 'd> Eq for Node<'a, 'd> {}

impl<'a, 'd> Node<'a, 'd> {
    fn data(&self) -> &'a NodeData {
        &self.doc.nodes[self.id.0]
    }

    fn gen_node(&self, id: NodeId) -> Node<'a, 'd> {
        Node { id, doc: self.doc }
    }

    /// This node's kind.
    pub fn node_type(&self) -> NodeType {
        match self.data().kind {
            NodeKind::Document => NodeType::Document,
            NodeKind::Element { .. } => NodeType::Element,
            NodeKind::Text(_) => NodeType::Text,
            NodeKind::Cdata(_) => NodeType::Cdata,
            NodeKind::Comment(_) => NodeType::Comment,
            NodeKind::Pi(_) => NodeType::Pi,
        }
    }

    /// Returns `true` if this is the document's synthetic root.
    pub fn is_document(&self) -> bool {
        self.node_type() == NodeType::Document
    }

    /// Returns `true` if this is an element node.
    pub fn is_element(&self) -> bool {
        self.node_type() == NodeType::Element
    }

    /// Returns `true` if this is a text or (when not preserved) CDATA
    /// node.
    pub fn is_text(&self) -> bool {
        self.node_type() == NodeType::Text
    }

    /// Returns `true` if this is a preserved CDATA node.
    pub fn is_cdata(&self) -> bool {
        self.node_type() == NodeType::Cdata
    }

    /// Returns `true` if this is a comment node.
    pub fn is_comment(&self) -> bool {
        self.node_type() == NodeType::Comment
    }

    /// Returns `true` if this is a processing instruction node.
    pub fn is_pi(&self) -> bool {
        self.node_type() == NodeType::Pi
    }

    /// Returns `true` for the unique root element, `false` for every
    /// other node (including the document node itself).
    pub fn is_root_element(&self) -> bool {
        matches!(self.data().kind, NodeKind::Element { is_root: true, .. })
    }

    /// The document that owns this node.
    pub fn document(&self) -> &'a Document<'d> {
        self.doc
    }

    /// The element's qualified name (colon permitted, never split into
    /// prefix/local parts). Empty for non-element nodes.
    pub fn tag_name(&self) -> &'a str {
        match &self.data().kind {
            NodeKind::Element { name, .. } => name,
            _ => "",
        }
    }

    /// Returns `true` if this is an element with the given tag name.
    pub fn has_tag_name(&self, name: &str) -> bool {
        match &self.data().kind {
            NodeKind::Element { name: tag, .. } => tag == name,
            _ => false,
        }
    }

    /// The element's attributes, in source order. Empty for non-element
    /// nodes.
    pub fn attributes(&self) -> &'a [Attribute] {
        match &self.data().kind {
            NodeKind::Element { attributes, .. } => &self.doc.attrs[attributes.clone()],
            _ => &[],
        }
    }

    /// Looks up an attribute value by name.
    pub fn attribute(&self, name: &str) -> Option<&'a str> {
        self.attributes().iter().find(|a| a.name == name).map(|a| a.value.as_str())
    }

    /// Returns `true` if the element carries the named attribute.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes().iter().any(|a| a.name == name)
    }

    /// Computes the text position of a named attribute.
    pub fn attribute_pos(&self, name: &str) -> Option<TextPos> {
        self.attributes()
            .iter()
            .find(|a| a.name == name)
            .map(|a| self.doc.text_pos_from(a.attr_pos))
    }

    /// Computes the text position of a named attribute's value.
    pub fn attribute_value_pos(&self, name: &str) -> Option<TextPos> {
        self.attributes()
            .iter()
            .find(|a| a.name == name)
            .map(|a| self.doc.text_pos_from(a.value_pos))
    }

    /// This node's processing-instruction data, if it is one.
    pub fn pi(&self) -> Option<&'a Pi> {
        match &self.data().kind {
            NodeKind::Pi(pi) => Some(pi),
            _ => None,
        }
    }

    /// This node's text, the way a reader of mixed content usually wants
    /// it:
    ///
    /// - for an element, the first text child's string, if any;
    /// - for a text, CDATA, or comment node, its own string.
    pub fn text(&self) -> Option<&'a str> {
        match &self.data().kind {
            NodeKind::Element { .. } => match self.first_child() {
                Some(child) => match &child.data().kind {
                    NodeKind::Text(t) | NodeKind::Cdata(t) => Some(t),
                    _ => None,
                },
                None => None,
            },
            NodeKind::Text(t) | NodeKind::Cdata(t) => Some(t),
            NodeKind::Comment(t) => Some(t),
            _ => None,
        }
    }

    /// For an element, the text of its immediately following sibling text
    /// node, if any.
    pub fn tail(&self) -> Option<&'a str> {
        if !self.is_element() {
            return None;
        }

        match self.next_sibling() {
            Some(sib) => match &sib.data().kind {
                NodeKind::Text(t) | NodeKind::Cdata(t) => Some(t),
                _ => None,
            },
            None => None,
        }
    }

    /// This node's parent, or `None` for the document node.
    pub fn parent(&self) -> Option<Self> {
        self.data().parent.map(|id| self.gen_node(id))
    }

    /// This node's nearest element ancestor.
    pub fn parent_element(&self) -> Option<Self> {
        self.ancestors().find(|n| n.is_element())
    }

    /// The previous sibling, in document order.
    pub fn prev_sibling(&self) -> Option<Self> {
        self.data().prev_sibling.map(|id| self.gen_node(id))
    }

    /// The next sibling, in document order.
    pub fn next_sibling(&self) -> Option<Self> {
        self.data().next_sibling.map(|id| self.gen_node(id))
    }

    /// The first child, if any.
    pub fn first_child(&self) -> Option<Self> {
        self.data().children.map(|(first, _)| self.gen_node(first))
    }

    /// The first element child, if any.
    pub fn first_element_child(&self) -> Option<Self> {
        self.children().find(|n| n.is_element())
    }

    /// The last child, if any.
    pub fn last_child(&self) -> Option<Self> {
        self.data().children.map(|(_, last)| self.gen_node(last))
    }

    /// The last element child, if any.
    pub fn last_element_child(&self) -> Option<Self> {
        self.children().filter(|n| n.is_element()).last()
    }

    /// `true` if this node has a previous or next sibling.
    pub fn has_siblings(&self) -> bool {
        self.data().prev_sibling.is_some() || self.data().next_sibling.is_some()
    }

    /// `true` if this node has at least one child.
    pub fn has_children(&self) -> bool {
        self.data().children.is_some()
    }

    /// An iterator over this node's ancestors, nearest first.
    pub fn ancestors(&self) -> Ancestors<'a, 'd> {
        Ancestors(self.parent())
    }

    /// An iterator over this node's children, in document order.
    pub fn children(&self) -> Children<'a, 'd> {
        Children { front: self.first_child(), back: self.last_child() }
    }

    /// An iterator that walks this node's subtree as open/close [`Edge`]s.
    pub fn traverse(&self) -> Traverse<'a, 'd> {
        Traverse { root: *self, edge: None }
    }

    /// An iterator over this node and all its descendants, in document
    /// order.
    pub fn descendants(&self) -> Descendants<'a, 'd> {
        Descendants(self.traverse())
    }

    /// This node's byte offset in the original source.
    pub fn pos(&self) -> usize {
        self.data().orig_pos
    }

    /// Computes this node's [`TextPos`] in the original source. Expensive;
    /// see [`Document::text_pos_from`].
    pub fn text_pos(&self) -> TextPos {
        self.doc.text_pos_from(self.data().orig_pos)
    }

    /// Renders this node (and, for elements, its subtree) as a [`Json`]
    /// value matching the data model's field order: `type` first, then
    /// kind-specific fields in a stable order.
    pub fn to_json(&self) -> Json {
        match &self.data().kind {
            NodeKind::Document => Json::Object(vec![
                ("type".into(), Json::String("Document".into())),
                ("children".into(), Json::Array(self.children().map(|c| c.to_json()).collect())),
            ]),
            NodeKind::Element { name, is_root, .. } => Json::Object(vec![
                ("type".into(), Json::String("Element".into())),
                ("name".into(), Json::String(name.clone())),
                (
                    "attributes".into(),
                    Json::Object(
                        self.attributes()
                            .iter()
                            .map(|a| (a.name.clone(), Json::String(a.value.clone())))
                            .collect(),
                    ),
                ),
                ("children".into(), Json::Array(self.children().map(|c| c.to_json()).collect())),
                ("isRootNode".into(), Json::Bool(*is_root)),
            ]),
            NodeKind::Text(text) => Json::Object(vec![
                ("type".into(), Json::String("Text".into())),
                ("text".into(), Json::String(text.clone())),
            ]),
            NodeKind::Cdata(text) => Json::Object(vec![
                ("type".into(), Json::String("CDATA".into())),
                ("text".into(), Json::String(text.clone())),
            ]),
            NodeKind::Comment(content) => Json::Object(vec![
                ("type".into(), Json::String("Comment".into())),
                ("content".into(), Json::String(content.clone())),
            ]),
            NodeKind::Pi(pi) => Json::Object(vec![
                ("type".into(), Json::String("ProcessingInstruction".into())),
                ("name".into(), Json::String(pi.target.clone())),
                ("content".into(), Json::String(pi.value.clone().unwrap_or_default())),
            ]),
        }
    }
}

impl<'a, 'd> fmt::Debug for Node<'a, 'd> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.data().kind {
            NodeKind::Document => write!(f, "Document"),
            NodeKind::Element { name, is_root, .. } => {
                write!(f, "Element {{ name: {:?}, attributes: {:?}, is_root: {} }}", name, self.attributes(), is_root)
            }
            NodeKind::Text(t) => write!(f, "Text({:?})", t),
            NodeKind::Cdata(t) => write!(f, "Cdata({:?})", t),
            NodeKind::Comment(t) => write!(f, "Comment({:?})", t),
            NodeKind::Pi(pi) => write!(f, "Pi {{ target: {:?}, value: {:?} }}", pi.target, pi.value),
        }
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Attribute {{ name: {:?}, value: {:?} }}", self.name, self.value)
    }
}

macro_rules! axis_iterator {
    ($(#[$m:meta])* $name:ident($step:path)) => {
        $(#[$m])*
        pub struct $name<'a, 'd: 'a>(Option<Node<'a, 'd>>);

        impl<'a, 'd: 'a> Clone for $name<'a, 'd> {
            fn clone(&self) -> Self {
                $name(self.0)
            }
        }

        impl<'a, 'd: 'a> Iterator for $name<'a, 'd> {
            type Item = Node<'a, 'd>;

            fn next(&mut self) -> Option<Self::Item> {
                let node = self.0.take();
                self.0 = node.as_ref().and_then($step);
                node
            }
        }
    };
}

axis_iterator!(
    /// Iterator over ancestors, nearest first.
    Ancestors(Node::parent)
);

/// Iterator over children, in document order.
pub struct Children<'a, 'd: 'a> {
    front: Option<Node<'a, 'd>>,
    back: Option<Node<'a, 'd>>,
}

impl<'a, 'd: 'a> Clone for Children<'a, 'd> {
    fn clone(&self) -> Self {
        Children { front: self.front, back: self.back }
    }
}

impl<'a, 'd: 'a> Iterator for Children<'a, 'd> {
    type Item = Node<'a, 'd>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front == self.back {
            let node = self.front.take();
            self.back = None;
            node
        } else {
            let node = self.front.take();
            self.front = node.as_ref().and_then(Node::next_sibling);
            node
        }
    }
}

impl<'a, 'd: 'a> DoubleEndedIterator for Children<'a, 'd> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.back == self.front {
            let node = self.back.take();
            self.front = None;
            node
        } else {
            let node = self.back.take();
            self.back = node.as_ref().and_then(Node::prev_sibling);
            node
        }
    }
}

/// One side of a subtree walk: entering or leaving a node.
#[derive(Debug)]
pub enum Edge<'a, 'd: 'a> {
    /// The node is being entered.
    Open(Node<'a, 'd>),
    /// The node (and all its children) has been fully visited.
    Close(Node<'a, 'd>),
}

impl<'a, 'd: 'a> Copy for Edge<'a, 'd> {}

impl<'a, 'd: 'a> Clone for Edge<'a, 'd> {
    fn clone(&self) -> Self {
        *self
    }
}

/// Iterator over the open/close edges of a node's subtree, including the
/// root itself.
pub struct Traverse<'a, 'd: 'a> {
    root: Node<'a, 'd>,
    edge: Option<Edge<'a, 'd>>,
}

impl<'a, 'd: 'a> Clone for Traverse<'a, 'd> {
    fn clone(&self) -> Self {
        Traverse { root: self.root, edge: self.edge }
    }
}

impl<'a, 'd: 'a> Iterator for Traverse<'a, 'd> {
    type Item = Edge<'a, 'd>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.edge {
            Some(Edge::Open(node)) => {
                self.edge = Some(match node.first_child() {
                    Some(first) => Edge::Open(first),
                    None => Edge::Close(node),
                });
            }
            Some(Edge::Close(node)) => {
                if node == self.root {
                    self.edge = None;
                } else if let Some(next) = node.next_sibling() {
                    self.edge = Some(Edge::Open(next));
                } else {
                    self.edge = node.parent().map(Edge::Close);
                }
            }
            None => {
                self.edge = Some(Edge::Open(self.root));
            }
        }

        self.edge
    }
}

/// Iterator over a node and its descendants, in document order.
pub struct Descendants<'a, 'd: 'a>(Traverse<'a, 'd>);

impl<'a, 'd: 'a> Clone for Descendants<'a, 'd> {
    fn clone(&self) -> Self {
        Descendants(self.0.clone())
    }
}

impl<'a, 'd: 'a> Iterator for Descendants<'a, 'd> {
    type Item = Node<'a, 'd>;

    fn next(&mut self) -> Option<Self::Item> {
        for edge in &mut self.0 {
            if let Edge::Open(node) = edge {
                return Some(node);
            }
        }
        None
    }
}

/// A hand-rolled JSON value, used only for the crate's JSON projection
/// (there is no `serde` dependency).
#[derive(Clone, Debug, PartialEq)]
pub enum Json {
    /// `null`.
    Null,
    /// `true` or `false`.
    Bool(bool),
    /// A JSON string.
    String(String),
    /// A JSON array, in order.
    Array(Vec<Json>),
    /// A JSON object, in insertion order (this crate never needs key
    /// lookup on a `Json::Object`, only stable serialization, so a `Vec`
    /// of pairs is simpler than reaching for an order-preserving map).
    Object(Vec<(String, Json)>),
}

impl Json {
    /// Serializes this value to a compact JSON string.
    pub fn to_json_string(&self) -> String {
        let mut out = String::new();
        self.write(&mut out);
        out
    }

    fn write(&self, out: &mut String) {
        match self {
            Json::Null => out.push_str("null"),
            Json::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Json::String(s) => write_json_string(s, out),
            Json::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.write(out);
                }
                out.push(']');
            }
            Json::Object(fields) => {
                out.push('{');
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    write_json_string(key, out);
                    out.push(':');
                    value.write(out);
                }
                out.push('}');
            }
        }
    }
}

impl fmt::Display for Json {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_json_string())
    }
}

fn write_json_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}
