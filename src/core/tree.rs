//! core::tree
//!
//! Arena-backed element tree.
//!
//! # Architecture
//!
//! Nodes live in a generational [`Arena`] owned by [`ElementTree`] and are
//! addressed by [`NodeId`]. Children are owned through their parent's
//! ordered child list; the parent link is an id used for lookup only.
//! Removing a subtree frees its slots for reuse; a stale `NodeId` resolves
//! to nothing instead of to the slot's new node.
//!
//! # Lifecycle
//!
//! - A unit node is *open* while it holds a [`Buffer`]
//! - A unit node is *consistent* while its parsed children match what its
//!   buffer would produce
//! - [`ElementTree::make_consistent`] re-parses the buffer and swaps the
//!   parsed children in one step, so structure and buffer move together

use std::fmt;

use crate::core::arena::{Arena, ArenaKey};
use crate::core::buffer::Buffer;
use crate::core::outline::{Outline, ParsedElement, StructureParser};
use crate::core::types::{ElementKind, ElementPath, ResourcePath};

/// Index of a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(ArenaKey);

impl NodeId {
    pub fn index(self) -> usize {
        self.0.index()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0.index())
    }
}

/// A node of the element tree.
#[derive(Debug, Clone)]
pub struct Node {
    name: String,
    kind: ElementKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    open: bool,
    consistent: bool,
    content: Option<String>,
    buffer: Option<Buffer>,
    resource: Option<ResourcePath>,
}

impl Node {
    fn new(kind: ElementKind, name: String, parent: Option<NodeId>) -> Self {
        Self {
            name,
            kind,
            parent,
            children: Vec::new(),
            open: false,
            consistent: false,
            content: None,
            buffer: None,
            resource: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_consistent(&self) -> bool {
        self.consistent
    }

    /// Content fingerprint, for nodes that have one.
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn buffer(&self) -> Option<&Buffer> {
        self.buffer.as_ref()
    }

    /// Persisted resource, for unit nodes.
    pub fn resource(&self) -> Option<&ResourcePath> {
        self.resource.as_ref()
    }
}

/// The canonical element tree.
#[derive(Debug, Clone)]
pub struct ElementTree {
    nodes: Arena<Node>,
    root: NodeId,
}

impl Default for ElementTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementTree {
    /// A tree holding only the open model root.
    pub fn new() -> Self {
        let mut root = Node::new(ElementKind::Model, String::new(), None);
        root.open = true;
        root.consistent = true;
        let mut nodes = Arena::new();
        let root = NodeId(nodes.insert(root));
        Self { nodes, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    /// Whether `id` still names a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of arena slots, live or free.
    pub fn slot_count(&self) -> usize {
        self.nodes.capacity()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(Node::children).unwrap_or(&[])
    }

    /// Append a child. Returns `None` if `parent` is gone.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        kind: ElementKind,
        name: impl Into<String>,
    ) -> Option<NodeId> {
        if !self.contains(parent) {
            return None;
        }
        let id = NodeId(self.nodes.insert(Node::new(kind, name.into(), Some(parent))));
        self.get_mut(parent)?.children.push(id);
        Some(id)
    }

    /// Append a unit child bound to `resource`.
    pub fn add_unit(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        resource: ResourcePath,
    ) -> Option<NodeId> {
        let id = self.add_child(parent, ElementKind::Unit, name)?;
        self.get_mut(id)?.resource = Some(resource);
        Some(id)
    }

    /// First child with the given kind and name.
    pub fn find_child(&self, parent: NodeId, kind: ElementKind, name: &str) -> Option<NodeId> {
        self.children(parent).iter().copied().find(|&c| {
            self.get(c)
                .is_some_and(|n| n.kind == kind && n.name == name)
        })
    }

    /// Child with the given kind and name, appended if missing.
    pub fn ensure_child(&mut self, parent: NodeId, kind: ElementKind, name: &str) -> Option<NodeId> {
        match self.find_child(parent, kind, name) {
            Some(id) => Some(id),
            None => self.add_child(parent, kind, name),
        }
    }

    /// Identity path of a node.
    pub fn path(&self, id: NodeId) -> Option<ElementPath> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(cur) = current {
            let node = self.get(cur)?;
            if node.parent.is_some() {
                chain.push((node.kind, node.name.as_str()));
            }
            current = node.parent;
        }
        Some(
            chain
                .into_iter()
                .rev()
                .fold(ElementPath::root(), |path, (kind, name)| path.child(kind, name)),
        )
    }

    /// Nearest ancestor (or the node itself) of the given kind.
    pub fn ancestor(&self, id: NodeId, kind: ElementKind) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(cur) = current {
            let node = self.get(cur)?;
            if node.kind == kind {
                return Some(cur);
            }
            current = node.parent;
        }
        None
    }

    /// Delete a node and everything below it. The root cannot be removed.
    ///
    /// Returns false if the node was already gone or is the root.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if id == self.root {
            return false;
        }
        let Some(parent) = self.get(id).map(|n| n.parent) else {
            return false;
        };
        if let Some(parent) = parent.and_then(|p| self.get_mut(p)) {
            parent.children.retain(|&c| c != id);
        }
        self.drop_subtree(id);
        true
    }

    fn drop_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            if let Some(node) = self.nodes.remove(cur.0) {
                stack.extend(node.children);
            }
        }
    }

    /// Bind a buffer and mark the node open. Consistency is unchanged.
    pub fn attach_buffer(&mut self, id: NodeId, buffer: Buffer) -> bool {
        match self.get_mut(id) {
            Some(node) => {
                node.buffer = Some(buffer);
                node.open = true;
                true
            }
            None => false,
        }
    }

    pub fn buffer_mut(&mut self, id: NodeId) -> Option<&mut Buffer> {
        self.get_mut(id)?.buffer.as_mut()
    }

    /// Flag the node as no longer matching its buffer.
    pub fn mark_inconsistent(&mut self, id: NodeId) {
        if let Some(node) = self.get_mut(id) {
            node.consistent = false;
        }
    }

    /// Close a node: drop its buffer, parsed children and fingerprint.
    pub fn close(&mut self, id: NodeId) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.clear_parsed_children(id);
        if let Some(node) = self.get_mut(id) {
            node.buffer = None;
            node.content = None;
            node.open = false;
            node.consistent = false;
        }
        true
    }

    fn clear_parsed_children(&mut self, id: NodeId) {
        let parsed: Vec<NodeId> = self
            .children(id)
            .iter()
            .copied()
            .filter(|&c| self.get(c).is_some_and(|n| n.kind.is_parsed()))
            .collect();
        for child in parsed {
            self.remove(child);
        }
    }

    /// Re-derive structure from the bound buffer.
    ///
    /// Returns the outline applied, or `None` if the node has no buffer.
    pub fn make_consistent(&mut self, id: NodeId, parser: &dyn StructureParser) -> Option<Outline> {
        let outline = parser.parse(self.get(id)?.buffer.as_ref()?.contents());
        self.apply_outline(id, &outline);
        Some(outline)
    }

    /// Replace a node's parsed children with `outline` and mark it consistent.
    pub fn apply_outline(&mut self, id: NodeId, outline: &Outline) {
        if !self.contains(id) {
            return;
        }
        self.clear_parsed_children(id);
        self.insert_parsed(id, &outline.elements);
        if let Some(node) = self.get_mut(id) {
            node.content = Some(outline.content.clone());
            node.consistent = true;
        }
    }

    fn insert_parsed(&mut self, parent: NodeId, elements: &[ParsedElement]) {
        let mut pending: Vec<(NodeId, &ParsedElement)> =
            elements.iter().rev().map(|e| (parent, e)).collect();
        while let Some((parent, element)) = pending.pop() {
            let Some(id) = self.add_child(parent, element.kind, element.name.as_str()) else {
                continue;
            };
            if let Some(node) = self.get_mut(id) {
                node.content = Some(element.content.clone());
                node.consistent = true;
                node.open = true;
            }
            pending.extend(element.children.iter().rev().map(|c| (id, c)));
        }
    }
}
