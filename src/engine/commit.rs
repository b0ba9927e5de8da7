//! engine::commit
//!
//! Commit a working copy into its primary unit.
//!
//! # Architecture
//!
//! [`CommitWorkingCopyOperation::verify`] checks preconditions without
//! touching anything. [`CommitWorkingCopyOperation::run`] then picks one of
//! two paths:
//!
//! - **Managed** (the copy is its own primary, or the unit is in a live
//!   build root, exists, and is validly named): content moves through the
//!   primary's [`Buffer`](crate::core::buffer::Buffer). A failed save puts
//!   the held-back contents back before the error is returned.
//! - **Unmanaged** (everything else): the copy's text is encoded and
//!   written straight to the store, created or replaced.
//!
//! Afterwards the working copy takes the fresh modification marker and is
//! reconciled, and on the managed path a structural delta is built from a
//! snapshot taken before the transfer.
//!
//! # Invariants
//!
//! - A failed verification mutates nothing
//! - A failed transfer leaves the primary's buffer, structure and
//!   consistency exactly as they were, and the working copy untouched
//! - At most one delta is produced per commit
//!
//! # Example
//!
//! ```
//! use workcopy::core::config::{Config, SourceRootConfig};
//! use workcopy::core::model::Model;
//! use workcopy::core::types::ResourcePath;
//! use workcopy::engine::commit;
//! use workcopy::engine::journal::UnitOfWork;
//! use workcopy::store::MemoryStore;
//!
//! let store = MemoryStore::new();
//! let path = ResourcePath::new("src/Main.unit").unwrap();
//! store.insert(&path, b"type Main\n");
//!
//! let config = Config::default().with_source_root(SourceRootConfig::new("src"));
//! let mut model = Model::new(config, store.clone()).unwrap();
//! let unit = model.unit(&path).unwrap();
//! let copy = model.new_working_copy(unit).unwrap();
//! model.set_contents(copy, "type Main\ntype Helper\n").unwrap();
//!
//! let mut uow = UnitOfWork::new("commit");
//! let outcome = commit(&mut model, copy, false, &mut uow).unwrap();
//! assert!(outcome.delta.is_some());
//! assert_eq!(store.text(&path).as_deref(), Some("type Main\ntype Helper\n"));
//! ```

use std::fmt;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::buffer::BufferError;
use crate::core::encoding::{self, EncodingError};
use crate::core::membership::UnitTarget;
use crate::core::model::{ElementHandle, Model, ModelError, WorkingCopy, WorkingCopyId};
use crate::core::tree::NodeId;
use crate::core::types::{ModificationMarker, ResourcePath};
use crate::engine::delta::{DeltaBuilder, ElementDelta};
use crate::engine::journal::{StepKind, UnitOfWork};
use crate::engine::progress::{NullProgressMonitor, ProgressMonitor, ProgressTask};
use crate::store::{StoreError, WriteMode, WriteOptions};

/// Status codes reported for commit failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    InvalidElementTypes,
    ElementDoesNotExist,
    UpdateConflict,
    IoException,
    CoreException,
    Canceled,
    ModelFailure,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusCode::InvalidElementTypes => "invalid_element_types",
            StatusCode::ElementDoesNotExist => "element_does_not_exist",
            StatusCode::UpdateConflict => "update_conflict",
            StatusCode::IoException => "io_exception",
            StatusCode::CoreException => "core_exception",
            StatusCode::Canceled => "canceled",
            StatusCode::ModelFailure => "model_failure",
        };
        f.write_str(s)
    }
}

/// Errors from committing a working copy.
#[derive(Debug, Error)]
pub enum CommitError {
    /// The handle does not name a registered working copy.
    #[error("{0} is not a working copy")]
    InvalidElementKind(ElementHandle),

    /// The primary unit is no longer in the model.
    #[error("primary unit of {0} no longer exists")]
    ElementNotPresent(ResourcePath),

    /// The resource changed since the working copy last synchronized.
    #[error("{0} was modified since the working copy was created")]
    UpdateConflict(ResourcePath),

    /// The text could not be encoded for the store.
    #[error("cannot encode {resource}: {source}")]
    Encoding {
        resource: ResourcePath,
        source: EncodingError,
    },

    /// The store refused or failed the write.
    #[error("cannot write {resource}: {source}")]
    StoreWriteFailure {
        resource: ResourcePath,
        source: StoreError,
    },

    #[error("commit canceled")]
    Canceled,

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl CommitError {
    pub fn code(&self) -> StatusCode {
        match self {
            CommitError::InvalidElementKind(_) => StatusCode::InvalidElementTypes,
            CommitError::ElementNotPresent(_) => StatusCode::ElementDoesNotExist,
            CommitError::UpdateConflict(_) => StatusCode::UpdateConflict,
            CommitError::Encoding { .. } => StatusCode::IoException,
            CommitError::StoreWriteFailure { .. } => StatusCode::CoreException,
            CommitError::Canceled => StatusCode::Canceled,
            CommitError::Model(_) => StatusCode::ModelFailure,
        }
    }

    fn from_buffer(resource: &ResourcePath, err: BufferError) -> Self {
        match err {
            BufferError::Encoding(source) => CommitError::Encoding {
                resource: resource.clone(),
                source,
            },
            BufferError::Store(source) => CommitError::StoreWriteFailure {
                resource: resource.clone(),
                source,
            },
        }
    }
}

/// Which way the content went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommitPath {
    /// Through the primary unit's buffer.
    Managed,
    /// Straight to the store.
    Unmanaged,
}

/// Proof that verification passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified {
    pub working_copy: WorkingCopyId,
    pub primary: NodeId,
    pub resource: ResourcePath,
    pub is_primary: bool,
}

/// Result of a successful commit.
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    pub path: CommitPath,
    /// The delta raised, also appended to the unit of work.
    pub delta: Option<ElementDelta>,
    /// Marker of the resource after the commit.
    pub marker: Option<ModificationMarker>,
}

/// Commits a working copy into its primary unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitWorkingCopyOperation {
    pub handle: ElementHandle,
    /// Commit even if the resource changed underneath the working copy.
    pub force: bool,
}

impl CommitWorkingCopyOperation {
    pub fn new(handle: impl Into<ElementHandle>, force: bool) -> Self {
        Self {
            handle: handle.into(),
            force,
        }
    }

    /// Check the preconditions, in order:
    ///
    /// 1. the handle names a registered working copy
    /// 2. its primary unit is still in the model
    /// 3. the resource is unchanged, unless forced
    ///
    /// Read-only resources are not checked here; the store decides.
    pub fn verify(&self, model: &Model) -> Result<Verified, CommitError> {
        let ElementHandle::WorkingCopy(id) = self.handle else {
            return Err(CommitError::InvalidElementKind(self.handle));
        };
        let copy = model
            .working_copy(id)
            .map_err(|_| CommitError::InvalidElementKind(self.handle))?;

        let resource = copy.resource().clone();
        let primary = copy.primary();
        if !model.tree().contains(primary) {
            return Err(CommitError::ElementNotPresent(resource));
        }

        if !self.force && model.has_resource_changed(id)? {
            return Err(CommitError::UpdateConflict(resource));
        }

        Ok(Verified {
            working_copy: id,
            primary,
            resource,
            is_primary: copy.is_primary(),
        })
    }

    /// Verify, then commit.
    pub fn run(
        &self,
        model: &mut Model,
        uow: &mut UnitOfWork,
        monitor: &mut dyn ProgressMonitor,
    ) -> Result<CommitOutcome, CommitError> {
        let mut task = ProgressTask::begin(monitor, "Committing working copy", 2);
        let verified = self.verify(model)?;
        if task.is_canceled() {
            return Err(CommitError::Canceled);
        }

        let Verified {
            working_copy,
            primary,
            resource,
            is_primary,
        } = verified;

        let root = model.source_root_of(primary).map(str::to_string);
        let target = UnitTarget {
            root: root.as_deref(),
            resource: &resource,
            exists: model.store.exists(&resource),
        };
        let managed = is_primary || model.membership.is_managed(&target);
        let excluded = model.membership.is_excluded(&target);
        let exists = target.exists;

        let mut builder = None;
        let path = if managed {
            debug!(resource = %resource, is_primary, excluded, "committing through buffer");
            model.open(primary)?;

            let consistent = model.is_consistent(primary)?;
            if !excluded && (!is_primary || !consistent) {
                builder = DeltaBuilder::new(&model.tree, primary);
            }

            let marker = self.save_primary(model, working_copy, primary, &resource, uow)?;
            uow.record(StepKind::BufferSaved {
                resource: resource.clone(),
                marker,
            });
            CommitPath::Managed
        } else {
            debug!(resource = %resource, exists, "committing straight to store");
            let (mode, marker) = self.write_unmanaged(model, working_copy, &resource, exists)?;
            uow.record(StepKind::ResourceWritten {
                resource: resource.clone(),
                mode,
                marker,
            });
            if model.tree.get(primary).is_some_and(|n| n.is_open()) {
                model.close(primary)?;
            }
            CommitPath::Unmanaged
        };

        uow.set_modified_resource();

        let marker = model.store.modification_marker(&resource);
        model.synchronize_working_copy(working_copy, marker.clone())?;
        task.worked(1);

        let delta = builder.and_then(|b| b.build_deltas(&model.tree));
        if let Some(delta) = &delta {
            uow.add_delta(delta.clone());
        }
        task.worked(1);

        info!(
            resource = %resource,
            path = ?path,
            delta = delta.is_some(),
            "working copy committed"
        );
        Ok(CommitOutcome {
            path,
            delta,
            marker,
        })
    }

    /// Move the working copy's text into the primary buffer and persist it.
    fn save_primary(
        &self,
        model: &mut Model,
        working_copy: WorkingCopyId,
        primary: NodeId,
        resource: &ResourcePath,
        uow: &mut UnitOfWork,
    ) -> Result<Option<ModificationMarker>, CommitError> {
        let incoming = match model.working_copy(working_copy)? {
            WorkingCopy::Detached { buffer, .. } => Some(buffer.contents().to_string()),
            WorkingCopy::Primary { .. } => None,
        };
        let encoding = model.encodings.encoding_for(resource);
        let keep_history = model.config.keep_history();

        let buffer = model
            .tree
            .buffer_mut(primary)
            .ok_or(ModelError::NoBuffer(primary))?;

        let saved = match incoming {
            Some(contents) => {
                let held = buffer.state();
                buffer.set_contents(contents);
                match buffer.save(model.store.as_ref(), encoding.as_deref(), self.force, keep_history) {
                    Ok(marker) => Ok(marker),
                    Err(err) => {
                        buffer.restore(held);
                        warn!(resource = %resource, error = %err, "save failed, primary buffer restored");
                        uow.record(StepKind::BufferRolledBack {
                            resource: resource.clone(),
                            reason: err.to_string(),
                        });
                        Err(err)
                    }
                }
            }
            None => buffer.save(model.store.as_ref(), encoding.as_deref(), self.force, keep_history),
        };
        let marker = saved.map_err(|e| CommitError::from_buffer(resource, e))?;

        model.tree.make_consistent(primary, model.parser.as_ref());
        Ok(marker)
    }

    /// Encode the working copy's text and write it to the store.
    fn write_unmanaged(
        &self,
        model: &Model,
        working_copy: WorkingCopyId,
        resource: &ResourcePath,
        exists: bool,
    ) -> Result<(WriteMode, ModificationMarker), CommitError> {
        let contents = model.contents(working_copy)?;
        let label = model.encodings.encoding_for(resource);
        let bytes =
            encoding::encode(contents, label.as_deref()).map_err(|source| CommitError::Encoding {
                resource: resource.clone(),
                source,
            })?;

        let options = if exists {
            WriteOptions {
                mode: WriteMode::Replace,
                overwrite: self.force,
                keep_history: model.config.keep_history(),
            }
        } else {
            WriteOptions {
                mode: WriteMode::Create,
                overwrite: self.force,
                keep_history: false,
            }
        };

        let marker = model
            .store
            .write_bytes(resource, &bytes, options)
            .map_err(|source| CommitError::StoreWriteFailure {
                resource: resource.clone(),
                source,
            })?;
        Ok((options.mode, marker))
    }
}

/// Commit a working copy with no progress reporting.
pub fn commit(
    model: &mut Model,
    working_copy: WorkingCopyId,
    force: bool,
    uow: &mut UnitOfWork,
) -> Result<CommitOutcome, CommitError> {
    CommitWorkingCopyOperation::new(working_copy, force).run(model, uow, &mut NullProgressMonitor)
}

impl Model {
    /// Commit a working copy into its primary unit.
    ///
    /// See [`CommitWorkingCopyOperation`].
    pub fn commit_working_copy(
        &mut self,
        working_copy: WorkingCopyId,
        force: bool,
        uow: &mut UnitOfWork,
    ) -> Result<CommitOutcome, CommitError> {
        commit(self, working_copy, force, uow)
    }
}
