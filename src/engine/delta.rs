//! engine::delta
//!
//! Structural deltas between two shapes of the same subtree.
//!
//! # Architecture
//!
//! A [`DeltaBuilder`] captures the [`ElementShape`] of a subtree before a
//! mutation and diffs it against the shape after. Children are matched by
//! `(kind, name)`; duplicates pair up in order of appearance, so the third
//! `fn f` before matches the third `fn f` after.
//!
//! # Record order
//!
//! For each parent: matched and added children in the new order, then
//! removed children in the old order. Given two fixed shapes the emitted
//! delta is fully determined.
//!
//! # Example
//!
//! ```
//! use workcopy::core::types::{ElementKind, ElementPath};
//! use workcopy::engine::delta::{diff, ChangeFlags, ElementShape};
//!
//! let before = ElementShape::leaf(ElementKind::Unit, "A.unit", "h1")
//!     .with_child(ElementShape::leaf(ElementKind::Type, "Old", "t"));
//! let after = ElementShape::leaf(ElementKind::Unit, "A.unit", "h1")
//!     .with_child(ElementShape::leaf(ElementKind::Type, "New", "t"));
//!
//! let path = ElementPath::root().child(ElementKind::Unit, "A.unit");
//! let delta = diff(&path, &before, &after).unwrap();
//! assert_eq!(delta.flags, ChangeFlags::CHILDREN);
//! assert_eq!(delta.children.len(), 2);
//! ```

use std::collections::HashMap;
use std::fmt;

use bitflags::bitflags;
use tracing::debug;

use crate::core::tree::{ElementTree, NodeId};
use crate::core::types::{ElementKind, ElementPath};

bitflags! {
    /// What changed on an element reported as [`DeltaKind::Changed`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ChangeFlags: u8 {
        /// The element's own content fingerprint differs.
        const CONTENT = 0b01;
        /// Records exist for elements below this one.
        const CHILDREN = 0b10;
    }
}

impl fmt::Display for ChangeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(ChangeFlags::CONTENT) {
            names.push("CONTENT");
        }
        if self.contains(ChangeFlags::CHILDREN) {
            names.push("CHILDREN");
        }
        write!(f, "{{{}}}", names.join(" | "))
    }
}

/// The kind of a delta record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeltaKind {
    Added,
    Removed,
    Changed,
}

impl fmt::Display for DeltaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeltaKind::Added => f.write_str("added"),
            DeltaKind::Removed => f.write_str("removed"),
            DeltaKind::Changed => f.write_str("changed"),
        }
    }
}

/// One record of a structural delta, with nested records below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementDelta {
    pub element: ElementPath,
    pub kind: DeltaKind,
    /// Empty for added and removed records.
    pub flags: ChangeFlags,
    pub children: Vec<ElementDelta>,
}

impl ElementDelta {
    fn leaf(element: ElementPath, kind: DeltaKind) -> Self {
        Self {
            element,
            kind,
            flags: ChangeFlags::empty(),
            children: Vec::new(),
        }
    }

    /// Nested record for the child named `name`, if any.
    pub fn child(&self, name: &str) -> Option<&ElementDelta> {
        self.children
            .iter()
            .find(|c| c.element.name() == Some(name))
    }

    /// Total number of records, this one included.
    pub fn record_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(ElementDelta::record_count)
            .sum::<usize>()
    }

    fn render(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        write!(f, "{:indent$}{} {}", "", self.element, self.kind, indent = depth * 2)?;
        if !self.flags.is_empty() {
            write!(f, " {}", self.flags)?;
        }
        writeln!(f)?;
        for child in &self.children {
            child.render(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for ElementDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, 0)
    }
}

/// Owned snapshot of a subtree: identities, order and content fingerprints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementShape {
    pub kind: ElementKind,
    pub name: String,
    pub content: Option<String>,
    pub children: Vec<ElementShape>,
}

impl ElementShape {
    /// A shape with no children.
    pub fn leaf(kind: ElementKind, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            content: Some(content.into()),
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: ElementShape) -> Self {
        self.children.push(child);
        self
    }

    /// Snapshot the subtree rooted at `id`. `None` if the node is gone.
    pub fn capture(tree: &ElementTree, id: NodeId) -> Option<Self> {
        let node = tree.get(id)?;
        Some(Self {
            kind: node.kind(),
            name: node.name().to_string(),
            content: node.content().map(str::to_string),
            children: node
                .children()
                .iter()
                .filter_map(|&c| Self::capture(tree, c))
                .collect(),
        })
    }
}

/// Diff two shapes of the element at `path`.
///
/// Returns `None` when nothing changed.
pub fn diff(path: &ElementPath, old: &ElementShape, new: &ElementShape) -> Option<ElementDelta> {
    let mut flags = ChangeFlags::empty();
    if old.content != new.content {
        flags |= ChangeFlags::CONTENT;
    }

    let children = diff_children(path, &old.children, &new.children);
    if !children.is_empty() {
        flags |= ChangeFlags::CHILDREN;
    }

    if flags.is_empty() {
        None
    } else {
        Some(ElementDelta {
            element: path.clone(),
            kind: DeltaKind::Changed,
            flags,
            children,
        })
    }
}

fn diff_children(path: &ElementPath, old: &[ElementShape], new: &[ElementShape]) -> Vec<ElementDelta> {
    let mut old_by_key: HashMap<(ElementKind, &str), Vec<usize>> = HashMap::new();
    for (i, child) in old.iter().enumerate() {
        old_by_key
            .entry((child.kind, child.name.as_str()))
            .or_default()
            .push(i);
    }

    let mut matched_old = vec![false; old.len()];
    let mut records = Vec::new();

    for child in new {
        let child_path = path.child(child.kind, &child.name);
        let candidate = old_by_key
            .get(&(child.kind, child.name.as_str()))
            .and_then(|indices| indices.iter().copied().find(|&i| !matched_old[i]));

        match candidate {
            Some(i) => {
                matched_old[i] = true;
                if let Some(record) = diff(&child_path, &old[i], child) {
                    records.push(record);
                }
            }
            None => records.push(ElementDelta::leaf(child_path, DeltaKind::Added)),
        }
    }

    for (i, child) in old.iter().enumerate() {
        if !matched_old[i] {
            records.push(ElementDelta::leaf(
                path.child(child.kind, &child.name),
                DeltaKind::Removed,
            ));
        }
    }

    records
}

/// Captures a subtree before a mutation and diffs it afterwards.
#[derive(Debug, Clone)]
pub struct DeltaBuilder {
    root: NodeId,
    path: ElementPath,
    before: ElementShape,
}

impl DeltaBuilder {
    /// Snapshot the subtree at `root`. `None` if the node is gone.
    pub fn new(tree: &ElementTree, root: NodeId) -> Option<Self> {
        Some(Self {
            root,
            path: tree.path(root)?,
            before: ElementShape::capture(tree, root)?,
        })
    }

    pub fn path(&self) -> &ElementPath {
        &self.path
    }

    /// Diff the snapshot against the current tree.
    ///
    /// A root that disappeared is reported as removed.
    pub fn build_deltas(self, tree: &ElementTree) -> Option<ElementDelta> {
        let delta = match ElementShape::capture(tree, self.root) {
            Some(after) => diff(&self.path, &self.before, &after),
            None => Some(ElementDelta::leaf(self.path, DeltaKind::Removed)),
        };
        match &delta {
            Some(d) => debug!(element = %d.element, records = d.record_count(), "delta built"),
            None => debug!("no structural change"),
        }
        delta
    }
}
