//! core::model
//!
//! The canonical source model and its working copies.
//!
//! # Architecture
//!
//! [`Model`] owns the element tree, the registry of working copies, the
//! persisted store and the pluggable collaborators (build membership,
//! encoding resolution, structure parser). All tree mutations go through
//! it; the commit operation in `engine::commit` is the only code that
//! writes a working copy back.
//!
//! # Working copies
//!
//! A [`WorkingCopy`] is either *detached* (an independent buffer cloned
//! from its primary unit) or *primary* (edits go straight into the primary
//! unit's own buffer). Each captures the store's modification marker at
//! creation and after every successful commit; a differing current marker
//! means the resource changed underneath it.
//!
//! # Example
//!
//! ```
//! use workcopy::core::config::{Config, SourceRootConfig};
//! use workcopy::core::model::Model;
//! use workcopy::core::types::ResourcePath;
//! use workcopy::store::MemoryStore;
//!
//! let store = MemoryStore::new();
//! let path = ResourcePath::new("src/Main.unit").unwrap();
//! store.insert(&path, b"type Main\n");
//!
//! let config = Config::default().with_source_root(SourceRootConfig::new("src"));
//! let mut model = Model::new(config, store).unwrap();
//! let unit = model.unit(&path).unwrap();
//! let copy = model.new_working_copy(unit).unwrap();
//! model.set_contents(copy, "type Main\n    fn run()\n").unwrap();
//! assert!(!model.is_consistent(copy).unwrap());
//! ```

use std::fmt;

use thiserror::Error;
use tracing::debug;

use crate::core::arena::{Arena, ArenaKey};
use crate::core::buffer::Buffer;
use crate::core::config::{Config, ConfigError};
use crate::core::encoding::{self, ConfiguredEncoding, EncodingError, EncodingResolver};
use crate::core::membership::{BuildMembership, ClasspathMembership};
use crate::core::outline::{Outline, OutlineParser, StructureParser};
use crate::core::tree::{ElementTree, NodeId};
use crate::core::types::{ElementKind, ElementPath, ModificationMarker, ResourcePath, TypeError};
use crate::store::{ResourceStore, StoreError};

/// Errors from model operations.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("element {0} does not exist")]
    NotPresent(NodeId),

    #[error("element {0} is not a unit")]
    NotAUnit(ElementPath),

    #[error("unknown working copy {0}")]
    UnknownWorkingCopy(WorkingCopyId),

    #[error("element {0} has no open buffer")]
    NoBuffer(NodeId),

    #[error("failed to read {resource}: {source}")]
    Read {
        resource: ResourcePath,
        source: StoreError,
    },

    #[error("failed to decode {resource}: {source}")]
    Decode {
        resource: ResourcePath,
        source: EncodingError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Handle to a registered working copy. Stale after discard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkingCopyId(ArenaKey);

impl fmt::Display for WorkingCopyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wc-{}", self.0.index())
    }
}

/// Anything an operation can be pointed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementHandle {
    /// A node of the canonical tree.
    Element(NodeId),
    /// A registered working copy.
    WorkingCopy(WorkingCopyId),
}

impl From<NodeId> for ElementHandle {
    fn from(id: NodeId) -> Self {
        ElementHandle::Element(id)
    }
}

impl From<WorkingCopyId> for ElementHandle {
    fn from(id: WorkingCopyId) -> Self {
        ElementHandle::WorkingCopy(id)
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementHandle::Element(id) => write!(f, "element {id}"),
            ElementHandle::WorkingCopy(id) => write!(f, "working copy {id}"),
        }
    }
}

/// An editable overlay of a primary unit.
#[derive(Debug, Clone)]
pub enum WorkingCopy {
    /// Independent buffer cloned from the primary.
    Detached {
        primary: NodeId,
        buffer: Buffer,
        marker: Option<ModificationMarker>,
        /// Last reconciled structure; `None` while edits are unreconciled.
        outline: Option<Outline>,
    },
    /// Edits the primary's own buffer in place.
    Primary {
        primary: NodeId,
        resource: ResourcePath,
        marker: Option<ModificationMarker>,
    },
}

impl WorkingCopy {
    pub fn primary(&self) -> NodeId {
        match self {
            WorkingCopy::Detached { primary, .. } | WorkingCopy::Primary { primary, .. } => {
                *primary
            }
        }
    }

    pub fn resource(&self) -> &ResourcePath {
        match self {
            WorkingCopy::Detached { buffer, .. } => buffer.resource(),
            WorkingCopy::Primary { resource, .. } => resource,
        }
    }

    /// Marker captured at creation or at the last commit.
    pub fn marker(&self) -> Option<&ModificationMarker> {
        match self {
            WorkingCopy::Detached { marker, .. } | WorkingCopy::Primary { marker, .. } => {
                marker.as_ref()
            }
        }
    }

    pub fn is_primary(&self) -> bool {
        matches!(self, WorkingCopy::Primary { .. })
    }
}

/// The canonical source model.
pub struct Model {
    pub(crate) tree: ElementTree,
    pub(crate) working_copies: Arena<WorkingCopy>,
    pub(crate) store: Box<dyn ResourceStore>,
    pub(crate) membership: Box<dyn BuildMembership>,
    pub(crate) encodings: Box<dyn EncodingResolver>,
    pub(crate) parser: Box<dyn StructureParser>,
    pub(crate) config: Config,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("nodes", &self.tree.len())
            .field("working_copies", &self.working_copies.len())
            .finish_non_exhaustive()
    }
}

impl Model {
    /// A model over `store` using the configured source roots and encodings.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::Config` if a membership pattern does not compile.
    pub fn new(config: Config, store: impl ResourceStore + 'static) -> Result<Self, ModelError> {
        let membership = ClasspathMembership::from_config(&config)?;
        let encodings = ConfiguredEncoding::from_config(&config);
        Ok(Self::with_collaborators(
            config,
            Box::new(store),
            Box::new(membership),
            Box::new(encodings),
            Box::new(OutlineParser),
        ))
    }

    /// A model with explicitly supplied collaborators.
    pub fn with_collaborators(
        config: Config,
        store: Box<dyn ResourceStore>,
        membership: Box<dyn BuildMembership>,
        encodings: Box<dyn EncodingResolver>,
        parser: Box<dyn StructureParser>,
    ) -> Self {
        Self {
            tree: ElementTree::new(),
            working_copies: Arena::new(),
            store,
            membership,
            encodings,
            parser,
            config,
        }
    }

    pub fn tree(&self) -> &ElementTree {
        &self.tree
    }

    pub fn store(&self) -> &dyn ResourceStore {
        self.store.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Identity path of a canonical node.
    pub fn path(&self, id: NodeId) -> Result<ElementPath, ModelError> {
        self.tree.path(id).ok_or(ModelError::NotPresent(id))
    }

    /// Name of the source root a node sits under, if any.
    pub fn source_root_of(&self, id: NodeId) -> Option<&str> {
        let root = self.tree.ancestor(id, ElementKind::SourceRoot)?;
        self.tree.get(root).map(|n| n.name())
    }

    /// Unit node for `resource`, creating the root and folder chain.
    ///
    /// The unit is placed under the configured source root with the longest
    /// matching path, or under plain folders when no root contains it.
    pub fn unit(&mut self, resource: &ResourcePath) -> Result<NodeId, ModelError> {
        let root_path = self
            .config
            .source_roots()
            .iter()
            .filter(|r| resource.strip_root(&r.path).is_some())
            .max_by_key(|r| r.path.len())
            .map(|r| r.path.clone());

        let model_root = self.tree.root();
        let (mut parent, relative) = match &root_path {
            Some(path) => (
                self.tree
                    .ensure_child(model_root, ElementKind::SourceRoot, path)
                    .ok_or(ModelError::NotPresent(model_root))?,
                resource.strip_root(path).unwrap_or(resource.as_str()),
            ),
            None => (model_root, resource.as_str()),
        };

        let mut components: Vec<&str> = relative.split('/').collect();
        let name = components.pop().unwrap_or(relative);
        for folder in components {
            parent = self
                .tree
                .ensure_child(parent, ElementKind::Folder, folder)
                .ok_or(ModelError::NotPresent(parent))?;
        }

        if let Some(existing) = self.tree.find_child(parent, ElementKind::Unit, name) {
            return Ok(existing);
        }
        self.tree
            .add_unit(parent, name, resource.clone())
            .ok_or(ModelError::NotPresent(parent))
    }

    fn unit_resource(&self, id: NodeId) -> Result<ResourcePath, ModelError> {
        let node = self.tree.get(id).ok_or(ModelError::NotPresent(id))?;
        match (node.kind(), node.resource()) {
            (ElementKind::Unit, Some(resource)) => Ok(resource.clone()),
            _ => Err(ModelError::NotAUnit(self.path(id)?)),
        }
    }

    fn read_buffer(&self, resource: &ResourcePath) -> Result<Buffer, ModelError> {
        if !self.store.exists(resource) {
            return Ok(Buffer::unsaved(resource.clone(), String::new()));
        }
        let bytes = self
            .store
            .read_bytes(resource)
            .map_err(|source| ModelError::Read {
                resource: resource.clone(),
                source,
            })?;
        let label = self.encodings.encoding_for(resource);
        let text = encoding::decode(&bytes, label.as_deref()).map_err(|source| {
            ModelError::Decode {
                resource: resource.clone(),
                source,
            }
        })?;
        Ok(Buffer::synchronized(resource.clone(), text))
    }

    /// Open a unit: read its buffer and parse its structure.
    ///
    /// Opening an open unit does nothing. A unit whose resource does not
    /// exist yet opens with an empty, unsaved buffer.
    pub fn open(&mut self, id: NodeId) -> Result<(), ModelError> {
        let resource = self.unit_resource(id)?;
        if self.tree.get(id).is_some_and(|n| n.is_open()) {
            return Ok(());
        }
        let buffer = self.read_buffer(&resource)?;
        self.tree.attach_buffer(id, buffer);
        self.tree.make_consistent(id, self.parser.as_ref());
        debug!(resource = %resource, "opened unit");
        Ok(())
    }

    /// Close a node, discarding its buffer and parsed children.
    pub fn close(&mut self, id: NodeId) -> Result<(), ModelError> {
        if self.tree.close(id) {
            Ok(())
        } else {
            Err(ModelError::NotPresent(id))
        }
    }

    /// Remove a node and its subtree from the canonical tree.
    ///
    /// Working copies of removed units stay registered and fail to commit.
    pub fn remove(&mut self, id: NodeId) -> Result<(), ModelError> {
        if self.tree.remove(id) {
            Ok(())
        } else {
            Err(ModelError::NotPresent(id))
        }
    }

    fn register(&mut self, copy: WorkingCopy) -> WorkingCopyId {
        WorkingCopyId(self.working_copies.insert(copy))
    }

    /// Create a detached working copy of a unit.
    pub fn new_working_copy(&mut self, unit: NodeId) -> Result<WorkingCopyId, ModelError> {
        self.open(unit)?;
        let resource = self.unit_resource(unit)?;
        let contents = self
            .tree
            .get(unit)
            .and_then(|n| n.buffer())
            .map(|b| b.contents().to_string())
            .ok_or(ModelError::NoBuffer(unit))?;

        let outline = self.parser.parse(&contents);
        let marker = self.store.modification_marker(&resource);
        let id = self.register(WorkingCopy::Detached {
            primary: unit,
            buffer: Buffer::synchronized(resource.clone(), contents),
            marker,
            outline: Some(outline),
        });
        debug!(resource = %resource, working_copy = %id, "created detached working copy");
        Ok(id)
    }

    /// Turn a unit into its own working copy.
    ///
    /// Returns the existing registration if the unit already is one.
    pub fn become_working_copy(&mut self, unit: NodeId) -> Result<WorkingCopyId, ModelError> {
        let existing = self.working_copies.iter().find(|(_, wc)| {
            matches!(wc, WorkingCopy::Primary { primary, .. } if *primary == unit)
        });
        if let Some((key, _)) = existing {
            return Ok(WorkingCopyId(key));
        }

        self.open(unit)?;
        let resource = self.unit_resource(unit)?;
        let marker = self.store.modification_marker(&resource);
        let id = self.register(WorkingCopy::Primary {
            primary: unit,
            resource: resource.clone(),
            marker,
        });
        debug!(resource = %resource, working_copy = %id, "unit became its own working copy");
        Ok(id)
    }

    pub fn working_copy(&self, id: WorkingCopyId) -> Result<&WorkingCopy, ModelError> {
        self.working_copies
            .get(id.0)
            .ok_or(ModelError::UnknownWorkingCopy(id))
    }

    fn working_copy_mut(&mut self, id: WorkingCopyId) -> Result<&mut WorkingCopy, ModelError> {
        self.working_copies
            .get_mut(id.0)
            .ok_or(ModelError::UnknownWorkingCopy(id))
    }

    /// Current text of a node or working copy.
    pub fn contents(&self, handle: impl Into<ElementHandle>) -> Result<&str, ModelError> {
        let id = match handle.into() {
            ElementHandle::Element(id) => id,
            ElementHandle::WorkingCopy(wc) => match self.working_copy(wc)? {
                WorkingCopy::Detached { buffer, .. } => return Ok(buffer.contents()),
                WorkingCopy::Primary { primary, .. } => *primary,
            },
        };
        self.tree
            .get(id)
            .ok_or(ModelError::NotPresent(id))?
            .buffer()
            .map(Buffer::contents)
            .ok_or(ModelError::NoBuffer(id))
    }

    /// Replace a working copy's text. Its structure becomes stale until
    /// the next [`Model::reconcile`].
    pub fn set_contents(
        &mut self,
        wc: WorkingCopyId,
        text: impl Into<String>,
    ) -> Result<(), ModelError> {
        let primary = match self.working_copy_mut(wc)? {
            WorkingCopy::Detached {
                buffer, outline, ..
            } => {
                buffer.set_contents(text);
                *outline = None;
                return Ok(());
            }
            WorkingCopy::Primary { primary, .. } => *primary,
        };

        self.open(primary)?;
        self.tree
            .buffer_mut(primary)
            .ok_or(ModelError::NoBuffer(primary))?
            .set_contents(text);
        self.tree.mark_inconsistent(primary);
        Ok(())
    }

    /// Re-derive a working copy's structure from its text.
    pub fn reconcile(&mut self, wc: WorkingCopyId) -> Result<(), ModelError> {
        let parser = self.parser.as_ref();
        let copy = self
            .working_copies
            .get_mut(wc.0)
            .ok_or(ModelError::UnknownWorkingCopy(wc))?;
        let primary = match copy {
            WorkingCopy::Detached {
                buffer, outline, ..
            } => {
                *outline = Some(parser.parse(buffer.contents()));
                return Ok(());
            }
            WorkingCopy::Primary { primary, .. } => *primary,
        };

        self.open(primary)?;
        self.tree
            .make_consistent(primary, self.parser.as_ref())
            .map(|_| ())
            .ok_or(ModelError::NoBuffer(primary))
    }

    /// Unregister a working copy.
    ///
    /// Discarding a primary working copy with unsaved edits closes the
    /// unit, so the next open reads the persisted content again.
    pub fn discard_working_copy(&mut self, wc: WorkingCopyId) -> Result<(), ModelError> {
        let copy = self
            .working_copies
            .remove(wc.0)
            .ok_or(ModelError::UnknownWorkingCopy(wc))?;

        if let WorkingCopy::Primary { primary, .. } = copy {
            let unsaved = self
                .tree
                .get(primary)
                .and_then(|n| n.buffer())
                .is_some_and(Buffer::has_unsaved_changes);
            if unsaved {
                self.tree.close(primary);
            }
        }
        debug!(working_copy = %wc, "discarded working copy");
        Ok(())
    }

    /// Whether the persisted resource changed since the working copy last
    /// synchronized with it.
    pub fn has_resource_changed(&self, wc: WorkingCopyId) -> Result<bool, ModelError> {
        let copy = self.working_copy(wc)?;
        Ok(copy.marker() != self.store.modification_marker(copy.resource()).as_ref())
    }

    /// Whether a node's (or working copy's) structure matches its text.
    pub fn is_consistent(&self, handle: impl Into<ElementHandle>) -> Result<bool, ModelError> {
        let id = match handle.into() {
            ElementHandle::Element(id) => id,
            ElementHandle::WorkingCopy(wc) => match self.working_copy(wc)? {
                WorkingCopy::Detached { outline, .. } => return Ok(outline.is_some()),
                WorkingCopy::Primary { primary, .. } => *primary,
            },
        };
        self.tree
            .get(id)
            .map(|n| n.is_consistent())
            .ok_or(ModelError::NotPresent(id))
    }

    /// Record that a working copy is in step with the store again.
    pub(crate) fn synchronize_working_copy(
        &mut self,
        wc: WorkingCopyId,
        marker: Option<ModificationMarker>,
    ) -> Result<(), ModelError> {
        let parser = self.parser.as_ref();
        match self
            .working_copies
            .get_mut(wc.0)
            .ok_or(ModelError::UnknownWorkingCopy(wc))?
        {
            WorkingCopy::Detached {
                buffer,
                marker: held,
                outline,
                ..
            } => {
                *held = marker;
                *outline = Some(parser.parse(buffer.contents()));
            }
            WorkingCopy::Primary { marker: held, .. } => *held = marker,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SourceRootConfig;
    use crate::store::MemoryStore;

    fn path(p: &str) -> ResourcePath {
        ResourcePath::new(p).unwrap()
    }

    fn model_with(store: &MemoryStore) -> Model {
        let config = Config::default().with_source_root(SourceRootConfig::new("src"));
        Model::new(config, store.clone()).unwrap()
    }

    mod units {
        use super::*;

        #[test]
        fn unit_under_source_root() {
            let store = MemoryStore::new();
            let mut model = model_with(&store);
            let unit = model.unit(&path("src/app/Main.unit")).unwrap();
            assert_eq!(
                model.path(unit).unwrap().to_string(),
                "src/app/Main.unit#unit"
            );
            assert_eq!(model.source_root_of(unit), Some("src"));
            assert_eq!(model.unit(&path("src/app/Main.unit")).unwrap(), unit);
        }

        #[test]
        fn unit_outside_roots_uses_folders() {
            let store = MemoryStore::new();
            let mut model = model_with(&store);
            let unit = model.unit(&path("notes/Todo.unit")).unwrap();
            assert_eq!(model.source_root_of(unit), None);
            let folder = model.tree().get(unit).unwrap().parent().unwrap();
            assert_eq!(model.tree().get(folder).unwrap().kind(), ElementKind::Folder);
        }

        #[test]
        fn longest_root_wins() {
            let store = MemoryStore::new();
            let config = Config::default()
                .with_source_root(SourceRootConfig::new("src"))
                .with_source_root(SourceRootConfig::new("src/gen"));
            let mut model = Model::new(config, store).unwrap();
            let unit = model.unit(&path("src/gen/A.unit")).unwrap();
            assert_eq!(model.source_root_of(unit), Some("src/gen"));
        }

        #[test]
        fn open_reads_and_parses() {
            let store = MemoryStore::new();
            store.insert(&path("src/A.unit"), b"type A\n    fn f()\n");
            let mut model = model_with(&store);
            let unit = model.unit(&path("src/A.unit")).unwrap();
            model.open(unit).unwrap();
            assert!(model.is_consistent(unit).unwrap());
            assert_eq!(model.contents(unit).unwrap(), "type A\n    fn f()\n");
            assert_eq!(model.tree().children(unit).len(), 1);
        }

        #[test]
        fn open_missing_resource_gives_empty_buffer() {
            let store = MemoryStore::new();
            let mut model = model_with(&store);
            let unit = model.unit(&path("src/New.unit")).unwrap();
            model.open(unit).unwrap();
            assert_eq!(model.contents(unit).unwrap(), "");
        }

        #[test]
        fn open_non_unit_fails() {
            let store = MemoryStore::new();
            let mut model = model_with(&store);
            let unit = model.unit(&path("src/a/B.unit")).unwrap();
            let folder = model.tree().get(unit).unwrap().parent().unwrap();
            assert!(matches!(model.open(folder), Err(ModelError::NotAUnit(_))));
        }

        #[test]
        fn open_undecodable_resource_fails() {
            let store = MemoryStore::new();
            store.insert(&path("src/A.unit"), &[0xff, 0xfe, 0xfd]);
            let mut model = model_with(&store);
            let unit = model.unit(&path("src/A.unit")).unwrap();
            assert!(matches!(model.open(unit), Err(ModelError::Decode { .. })));
        }

        #[test]
        fn closed_unit_has_no_contents() {
            let store = MemoryStore::new();
            store.insert(&path("src/A.unit"), b"type A\n");
            let mut model = model_with(&store);
            let unit = model.unit(&path("src/A.unit")).unwrap();
            model.open(unit).unwrap();
            model.close(unit).unwrap();
            assert!(matches!(model.contents(unit), Err(ModelError::NoBuffer(_))));
        }
    }

    mod working_copies {
        use super::*;

        fn setup() -> (MemoryStore, Model, NodeId) {
            let store = MemoryStore::new();
            store.insert(&path("src/A.unit"), b"type A\n");
            let mut model = model_with(&store);
            let unit = model.unit(&path("src/A.unit")).unwrap();
            (store, model, unit)
        }

        #[test]
        fn detached_edits_do_not_touch_primary() {
            let (_store, mut model, unit) = setup();
            let wc = model.new_working_copy(unit).unwrap();
            assert!(model.is_consistent(wc).unwrap());

            model.set_contents(wc, "type B\n").unwrap();
            assert_eq!(model.contents(wc).unwrap(), "type B\n");
            assert_eq!(model.contents(unit).unwrap(), "type A\n");
            assert!(!model.is_consistent(wc).unwrap());
            assert!(model.is_consistent(unit).unwrap());

            model.reconcile(wc).unwrap();
            assert!(model.is_consistent(wc).unwrap());
        }

        #[test]
        fn primary_edits_go_to_unit_buffer() {
            let (_store, mut model, unit) = setup();
            let wc = model.become_working_copy(unit).unwrap();
            assert!(model.working_copy(wc).unwrap().is_primary());

            model.set_contents(wc, "type B\n").unwrap();
            assert_eq!(model.contents(unit).unwrap(), "type B\n");
            assert!(!model.is_consistent(unit).unwrap());

            model.reconcile(wc).unwrap();
            assert!(model.is_consistent(unit).unwrap());
        }

        #[test]
        fn become_working_copy_is_idempotent() {
            let (_store, mut model, unit) = setup();
            let first = model.become_working_copy(unit).unwrap();
            let second = model.become_working_copy(unit).unwrap();
            assert_eq!(first, second);
        }

        #[test]
        fn external_change_is_detected() {
            let (store, mut model, unit) = setup();
            let wc = model.new_working_copy(unit).unwrap();
            assert!(!model.has_resource_changed(wc).unwrap());
            store.insert(&path("src/A.unit"), b"type A\n");
            assert!(model.has_resource_changed(wc).unwrap());
        }

        #[test]
        fn discard_unregisters() {
            let (_store, mut model, unit) = setup();
            let wc = model.new_working_copy(unit).unwrap();
            model.discard_working_copy(wc).unwrap();
            assert!(matches!(
                model.working_copy(wc),
                Err(ModelError::UnknownWorkingCopy(_))
            ));
            assert!(model.discard_working_copy(wc).is_err());
        }

        #[test]
        fn discarded_slot_is_reused_without_reviving_old_id() {
            let (_store, mut model, unit) = setup();
            let old = model.new_working_copy(unit).unwrap();
            model.discard_working_copy(old).unwrap();
            let new = model.new_working_copy(unit).unwrap();

            assert_ne!(old, new);
            assert_eq!(old.to_string(), new.to_string());
            assert!(matches!(
                model.working_copy(old),
                Err(ModelError::UnknownWorkingCopy(_))
            ));
            assert!(model.set_contents(old, "type X\n").is_err());
            assert_eq!(model.contents(new).unwrap(), "type A\n");
        }

        #[test]
        fn working_copy_churn_keeps_registry_bounded() {
            let (_store, mut model, unit) = setup();
            for _ in 0..1000 {
                let wc = model.new_working_copy(unit).unwrap();
                model.discard_working_copy(wc).unwrap();
            }
            assert_eq!(model.working_copies.capacity(), 1);
            assert!(model.working_copies.is_empty());
        }

        #[test]
        fn discarding_edited_primary_reverts_unit() {
            let (_store, mut model, unit) = setup();
            let wc = model.become_working_copy(unit).unwrap();
            model.set_contents(wc, "type Z\n").unwrap();
            model.discard_working_copy(wc).unwrap();
            assert!(!model.tree().get(unit).unwrap().is_open());
            model.open(unit).unwrap();
            assert_eq!(model.contents(unit).unwrap(), "type A\n");
        }

        #[test]
        fn removed_primary_is_reported() {
            let (_store, mut model, unit) = setup();
            let wc = model.become_working_copy(unit).unwrap();
            model.remove(unit).unwrap();
            assert!(matches!(
                model.is_consistent(wc),
                Err(ModelError::NotPresent(_))
            ));
        }
    }
}
