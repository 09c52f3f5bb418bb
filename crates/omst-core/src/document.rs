//! # Document Tree: Arena-Backed Mutable Scenario Tree
//!
//! A [`Document`] owns every node it has ever created in a flat arena.
//! Callers address nodes through [`NodeId`] handles, which are `Copy` and
//! stay valid for the lifetime of the document, including after the node
//! has been detached from the tree.
//!
//! ## Queries
//!
//! Every query returning several nodes materializes a `Vec<NodeId>`. The
//! vector is a snapshot: structural edits made while iterating it cannot
//! shift or hide entries, which keeps removal loops simple:
//!
//! ```
//! use omst_core::Document;
//!
//! let mut doc = Document::new("scenario");
//! let root = doc.root();
//! for _ in 0..3 {
//!     let s = doc.create_element("source");
//!     doc.append_child(root, s).unwrap();
//! }
//! for s in doc.descendants_named(root, "source") {
//!     doc.detach(s);
//! }
//! assert!(doc.children_named(root, "source").is_empty());
//! ```
//!
//! ## Uniqueness
//!
//! The scenario format guarantees at most one occurrence of most
//! substructures. [`Document::child`] enforces that and reports
//! [`DocumentError::DuplicateChild`] otherwise; genuinely repeated
//! collections are read with [`Document::children_named`].

use std::str::FromStr;

use crate::error::DocumentError;
use crate::names;
use crate::version::SchemaVersion;

/// Handle to a node inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Arena index of this node.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Kind of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    Comment,
    CData,
}

/// Where [`Document::move_node`] places a node among its new siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Before all existing children.
    First,
    /// After all existing children.
    Last,
    /// Immediately before the given sibling.
    Before(NodeId),
    /// Immediately after the given sibling.
    After(NodeId),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    /// Element name; empty for non-element nodes.
    name: String,
    /// Character data for text, comment and CDATA nodes.
    value: String,
    attrs: Vec<(String, String)>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl NodeData {
    fn new(kind: NodeKind, name: String, value: String) -> Self {
        Self {
            kind,
            name,
            value,
            attrs: Vec::new(),
            children: Vec::new(),
            parent: None,
        }
    }
}

/// Mutable, ordered tree of elements, text, comments and CDATA sections.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    root: NodeId,
    prolog: Vec<String>,
    epilog: Vec<String>,
}

impl Document {
    /// Create a document consisting of a single empty root element.
    pub fn new(root_name: &str) -> Self {
        Self {
            nodes: vec![NodeData::new(
                NodeKind::Element,
                root_name.to_string(),
                String::new(),
            )],
            root: NodeId(0),
            prolog: Vec::new(),
            epilog: Vec::new(),
        }
    }

    /// The root element.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Comments appearing before the root element.
    pub fn prolog(&self) -> &[String] {
        &self.prolog
    }

    pub(crate) fn push_prolog_comment(&mut self, comment: String) {
        self.prolog.push(comment);
    }

    /// Comments appearing after the root element.
    pub fn epilog(&self) -> &[String] {
        &self.epilog
    }

    pub(crate) fn push_epilog_comment(&mut self, comment: String) {
        self.epilog.push(comment);
    }

    fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    fn data_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0]
    }

    // ── Identity ─────────────────────────────────────────────────────

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.data(id).kind
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.data(id).kind == NodeKind::Element
    }

    /// Element name. Empty for non-element nodes.
    pub fn name(&self, id: NodeId) -> &str {
        &self.data(id).name
    }

    /// Rename an element in place, keeping attributes and children.
    pub fn rename(&mut self, id: NodeId, name: &str) {
        self.data_mut(id).name = name.to_string();
    }

    /// Raw character data of a text, comment or CDATA node.
    pub fn value(&self, id: NodeId) -> &str {
        &self.data(id).value
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).parent
    }

    // ── Attributes ───────────────────────────────────────────────────

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.data(id)
            .attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    /// All attributes in document order.
    pub fn attrs(&self, id: NodeId) -> &[(String, String)] {
        &self.data(id).attrs
    }

    /// Set an attribute. An existing attribute keeps its position; a new
    /// one is appended.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        let value = value.into();
        let attrs = &mut self.data_mut(id).attrs;
        match attrs.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value,
            None => attrs.push((name.to_string(), value)),
        }
    }

    /// Remove an attribute, returning its former value.
    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Option<String> {
        let attrs = &mut self.data_mut(id).attrs;
        let pos = attrs.iter().position(|(k, _)| k == name)?;
        Some(attrs.remove(pos).1)
    }

    /// Rename an attribute in place, keeping its position and value.
    /// Returns `false` if the attribute did not exist.
    pub fn rename_attr(&mut self, id: NodeId, from: &str, to: &str) -> bool {
        if self.has_attr(id, to) {
            self.remove_attr(id, to);
        }
        match self.data_mut(id).attrs.iter_mut().find(|(k, _)| k == from) {
            Some(slot) => {
                slot.0 = to.to_string();
                true
            }
            None => false,
        }
    }

    /// Read an attribute that must be present.
    pub fn require_attr(&self, id: NodeId, name: &str) -> Result<&str, DocumentError> {
        self.attr(id, name)
            .ok_or_else(|| DocumentError::MissingAttribute {
                element: self.name(id).to_string(),
                name: name.to_string(),
            })
    }

    /// Parse an optional attribute.
    pub fn attr_parse<T>(&self, id: NodeId, name: &str) -> Result<Option<T>, DocumentError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.attr(id, name) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| self.invalid(id, name, raw, e.to_string())),
        }
    }

    /// Parse a required attribute.
    pub fn require_attr_parse<T>(&self, id: NodeId, name: &str) -> Result<T, DocumentError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.require_attr(id, name)?;
        raw.trim()
            .parse::<T>()
            .map_err(|e| self.invalid(id, name, raw, e.to_string()))
    }

    pub fn attr_i64(&self, id: NodeId, name: &str) -> Result<Option<i64>, DocumentError> {
        self.attr_parse(id, name)
    }

    pub fn attr_f64(&self, id: NodeId, name: &str) -> Result<Option<f64>, DocumentError> {
        self.attr_parse(id, name)
    }

    /// Build an [`DocumentError::InvalidValue`] for a field of `id`.
    pub fn invalid(
        &self,
        id: NodeId,
        field: &str,
        value: &str,
        reason: impl Into<String>,
    ) -> DocumentError {
        DocumentError::InvalidValue {
            element: self.name(id).to_string(),
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    // ── Text ─────────────────────────────────────────────────────────

    /// Concatenated text and CDATA content of the direct children of an
    /// element, or the value of a character node.
    pub fn text(&self, id: NodeId) -> String {
        let data = self.data(id);
        if data.kind != NodeKind::Element {
            return data.value.clone();
        }
        data.children
            .iter()
            .filter(|c| matches!(self.data(**c).kind, NodeKind::Text | NodeKind::CData))
            .map(|c| self.data(*c).value.as_str())
            .collect()
    }

    /// Parse the trimmed text content of an element.
    pub fn text_parse<T>(&self, id: NodeId) -> Result<T, DocumentError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.text(id);
        raw.trim()
            .parse::<T>()
            .map_err(|e| self.invalid(id, "#text", &raw, e.to_string()))
    }

    /// Replace all text and CDATA children of an element with a single text
    /// node, or set the value of a character node. Element children are
    /// kept.
    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        let text = text.into();
        if !self.is_element(id) {
            self.data_mut(id).value = text;
            return;
        }
        for c in self.children(id) {
            if matches!(self.kind(c), NodeKind::Text | NodeKind::CData) {
                self.detach(c);
            }
        }
        if !text.is_empty() {
            let t = self.create_text(&text);
            self.link(id, t, 0);
        }
    }

    // ── Navigation ───────────────────────────────────────────────────

    /// All direct children, any kind.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.data(id).children.clone()
    }

    /// Direct element children.
    pub fn child_elements(&self, id: NodeId) -> Vec<NodeId> {
        self.data(id)
            .children
            .iter()
            .copied()
            .filter(|c| self.is_element(*c))
            .collect()
    }

    /// Direct element children with the given name.
    pub fn children_named(&self, id: NodeId, name: &str) -> Vec<NodeId> {
        self.data(id)
            .children
            .iter()
            .copied()
            .filter(|c| self.is_element(*c) && self.data(*c).name == name)
            .collect()
    }

    /// The unique direct child element with the given name.
    ///
    /// Returns `Ok(None)` if absent and an error if there are several.
    pub fn child(&self, id: NodeId, name: &str) -> Result<Option<NodeId>, DocumentError> {
        let found = self.children_named(id, name);
        match found.len() {
            0 => Ok(None),
            1 => Ok(Some(found[0])),
            count => Err(DocumentError::DuplicateChild {
                parent: self.name(id).to_string(),
                name: name.to_string(),
                count,
            }),
        }
    }

    /// The unique direct child element with the given name, which must exist.
    pub fn require_child(&self, id: NodeId, name: &str) -> Result<NodeId, DocumentError> {
        self.child(id, name)?
            .ok_or_else(|| DocumentError::MissingElement {
                parent: self.name(id).to_string(),
                name: name.to_string(),
            })
    }

    /// Follow a path of unique children, e.g. `["model", "human"]`.
    pub fn require_path(&self, id: NodeId, path: &[&str]) -> Result<NodeId, DocumentError> {
        path.iter()
            .try_fold(id, |node, name| self.require_child(node, name))
    }

    /// Follow a path of unique children, stopping at the first absent one.
    pub fn path(&self, id: NodeId, path: &[&str]) -> Result<Option<NodeId>, DocumentError> {
        let mut node = id;
        for name in path {
            match self.child(node, name)? {
                Some(next) => node = next,
                None => return Ok(None),
            }
        }
        Ok(Some(node))
    }

    /// All descendant elements with the given name, in document order,
    /// excluding `id` itself.
    pub fn descendants_named(&self, id: NodeId, name: &str) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_descendants(id, &mut |n| self.data(n).name == name, &mut out);
        out
    }

    /// All descendant elements, in document order, excluding `id` itself.
    pub fn descendant_elements(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_descendants(id, &mut |_| true, &mut out);
        out
    }

    fn collect_descendants(
        &self,
        id: NodeId,
        pred: &mut dyn FnMut(NodeId) -> bool,
        out: &mut Vec<NodeId>,
    ) {
        for &c in &self.data(id).children {
            if self.is_element(c) {
                if pred(c) {
                    out.push(c);
                }
                self.collect_descendants(c, pred, out);
            }
        }
    }

    /// First descendant element with the given name, in document order.
    pub fn first_descendant(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.descendants_named(id, name).into_iter().next()
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut cur = Some(id);
        while let Some(n) = cur {
            if n == ancestor {
                return true;
            }
            cur = self.parent(n);
        }
        false
    }

    // ── Construction ─────────────────────────────────────────────────

    /// Create a detached element.
    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.alloc(NodeData::new(NodeKind::Element, name.to_string(), String::new()))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeData::new(NodeKind::Text, String::new(), text.to_string()))
    }

    /// Create a detached comment node.
    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.alloc(NodeData::new(NodeKind::Comment, String::new(), text.to_string()))
    }

    /// Create a detached CDATA node.
    pub fn create_cdata(&mut self, text: &str) -> NodeId {
        self.alloc(NodeData::new(NodeKind::CData, String::new(), text.to_string()))
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        self.nodes.push(data);
        NodeId(self.nodes.len() - 1)
    }

    /// Create an element and append it to `parent`.
    pub fn append_element(&mut self, parent: NodeId, name: &str) -> NodeId {
        let id = self.create_element(name);
        let at = self.data(parent).children.len();
        self.link(parent, id, at);
        id
    }

    /// Create an element with the given text and append it to `parent`.
    pub fn append_text_element(&mut self, parent: NodeId, name: &str, text: &str) -> NodeId {
        let id = self.append_element(parent, name);
        self.set_text(id, text);
        id
    }

    /// Return the unique child named `name`, creating it at `position` when
    /// absent.
    pub fn get_or_create_child(
        &mut self,
        parent: NodeId,
        name: &str,
        position: Position,
    ) -> Result<NodeId, DocumentError> {
        if let Some(existing) = self.child(parent, name)? {
            return Ok(existing);
        }
        let id = self.create_element(name);
        self.move_node(id, parent, position)?;
        Ok(id)
    }

    /// Deep-copy a subtree. The copy is detached.
    pub fn deep_clone(&mut self, id: NodeId) -> NodeId {
        let mut data = self.data(id).clone();
        let children = std::mem::take(&mut data.children);
        data.parent = None;
        let copy = self.alloc(data);
        for c in children {
            let cc = self.deep_clone(c);
            let at = self.data(copy).children.len();
            self.link(copy, cc, at);
        }
        copy
    }

    // ── Structural edits ─────────────────────────────────────────────

    /// Append `node` as the last child of `parent`, detaching it from any
    /// previous parent.
    pub fn append_child(&mut self, parent: NodeId, node: NodeId) -> Result<(), DocumentError> {
        self.move_node(node, parent, Position::Last)
    }

    /// Insert `node` immediately before `reference`, which must be a child of
    /// `parent`.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        node: NodeId,
        reference: NodeId,
    ) -> Result<(), DocumentError> {
        self.move_node(node, parent, Position::Before(reference))
    }

    /// Relocate `node` (with its subtree) under `parent` at `position`.
    pub fn move_node(
        &mut self,
        node: NodeId,
        parent: NodeId,
        position: Position,
    ) -> Result<(), DocumentError> {
        if self.is_ancestor_or_self(node, parent) {
            return Err(DocumentError::CyclicMove {
                node: self.name(node).to_string(),
            });
        }
        if !self.is_element(parent) {
            return Err(DocumentError::NotAnElement(parent.0));
        }
        if let Position::Before(r) | Position::After(r) = position {
            if r == node {
                return Ok(());
            }
            if self.parent(r) != Some(parent) {
                return Err(DocumentError::NotAChild {
                    parent: self.name(parent).to_string(),
                    reference: self.name(r).to_string(),
                });
            }
        }
        self.detach(node);
        let siblings = &self.data(parent).children;
        let at = match position {
            Position::First => 0,
            Position::Last => siblings.len(),
            Position::Before(r) => siblings.iter().position(|c| *c == r).unwrap_or(0),
            Position::After(r) => siblings
                .iter()
                .position(|c| *c == r)
                .map_or(siblings.len(), |i| i + 1),
        };
        self.link(parent, node, at);
        Ok(())
    }

    /// Replace `old` with `new` in `old`'s parent. `old` becomes detached.
    pub fn replace_child(&mut self, old: NodeId, new: NodeId) -> Result<(), DocumentError> {
        let parent = self.parent(old).ok_or_else(|| DocumentError::NotAChild {
            parent: String::from("(none)"),
            reference: self.name(old).to_string(),
        })?;
        self.move_node(new, parent, Position::Before(old))?;
        self.detach(old);
        Ok(())
    }

    /// Remove `node` from its parent. The node and its subtree remain in the
    /// arena and can be re-attached.
    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.data(node).parent {
            self.data_mut(parent).children.retain(|c| *c != node);
            self.data_mut(node).parent = None;
        }
    }

    /// Remove the unique child named `name`, if present.
    pub fn remove_child_named(
        &mut self,
        parent: NodeId,
        name: &str,
    ) -> Result<Option<NodeId>, DocumentError> {
        let found = self.child(parent, name)?;
        if let Some(c) = found {
            self.detach(c);
        }
        Ok(found)
    }

    fn link(&mut self, parent: NodeId, node: NodeId, at: usize) {
        let children = &mut self.data_mut(parent).children;
        let at = at.min(children.len());
        children.insert(at, node);
        self.data_mut(node).parent = Some(parent);
    }

    // ── Versioning ───────────────────────────────────────────────────

    /// Declared schema version of the document; 0 when undeclared.
    pub fn version(&self) -> Result<SchemaVersion, DocumentError> {
        Ok(self
            .attr_parse::<u32>(self.root, names::SCHEMA_VERSION)?
            .map_or(SchemaVersion::UNVERSIONED, SchemaVersion))
    }

    /// Overwrite the root `schemaVersion` attribute.
    pub fn set_version(&mut self, version: SchemaVersion) {
        let root = self.root;
        self.set_attr(root, names::SCHEMA_VERSION, version.to_string());
    }
}
