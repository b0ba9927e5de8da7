//! engine::journal
//!
//! Unit of work: the accumulator threaded through model operations.
//!
//! A [`UnitOfWork`] collects the deltas raised by the operations run inside
//! it, whether any of them modified a persisted resource, and an ordered
//! log of the steps they took. The log (without the deltas) serializes to
//! JSON and can be written to disk with fsync.
//!
//! # Storage
//!
//! - `<dir>/<op_id>.json` - One file per unit of work
//!
//! # Example
//!
//! ```
//! use workcopy::engine::journal::{OpPhase, UnitOfWork};
//!
//! let mut uow = UnitOfWork::new("commit");
//! assert_eq!(uow.phase(), &OpPhase::InProgress);
//! uow.commit();
//! assert!(uow.phase().is_finished());
//! ```

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::core::types::{ModificationMarker, ResourcePath, UtcTimestamp};
use crate::engine::delta::ElementDelta;
use crate::store::WriteMode;

/// Errors from journal operations.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("journal json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("journal not found: {0}")]
    NotFound(String),
}

/// Unique identifier for a unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpId(String);

impl OpId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for OpId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OpId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Phase of a unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpPhase {
    InProgress,
    Committed,
    Failed,
}

impl OpPhase {
    pub fn is_finished(&self) -> bool {
        matches!(self, OpPhase::Committed | OpPhase::Failed)
    }
}

/// A step taken inside a unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    /// A unit buffer was persisted.
    BufferSaved {
        resource: ResourcePath,
        marker: Option<ModificationMarker>,
    },
    /// Bytes were written straight to the store.
    ResourceWritten {
        resource: ResourcePath,
        mode: WriteMode,
        marker: ModificationMarker,
    },
    /// A failed save was undone in memory.
    BufferRolledBack { resource: ResourcePath, reason: String },
    /// A structural delta was raised.
    DeltaEmitted { element: String, records: usize },
}

/// A step with the time it was recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitStep {
    pub kind: StepKind,
    pub timestamp: UtcTimestamp,
}

/// Accumulator for one logical unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitOfWork {
    pub op_id: OpId,
    /// What started this unit of work.
    pub label: String,
    pub started_at: UtcTimestamp,
    pub finished_at: Option<UtcTimestamp>,
    phase: OpPhase,
    has_modified_resource: bool,
    steps: Vec<UnitStep>,
    #[serde(skip)]
    deltas: Vec<ElementDelta>,
}

impl UnitOfWork {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            op_id: OpId::new(),
            label: label.into(),
            started_at: UtcTimestamp::now(),
            finished_at: None,
            phase: OpPhase::InProgress,
            has_modified_resource: false,
            steps: Vec::new(),
            deltas: Vec::new(),
        }
    }

    pub fn phase(&self) -> &OpPhase {
        &self.phase
    }

    pub fn record(&mut self, kind: StepKind) {
        self.steps.push(UnitStep {
            kind,
            timestamp: UtcTimestamp::now(),
        });
    }

    pub fn steps(&self) -> impl Iterator<Item = &StepKind> {
        self.steps.iter().map(|s| &s.kind)
    }

    /// Append a delta raised by an operation.
    pub fn add_delta(&mut self, delta: ElementDelta) {
        self.record(StepKind::DeltaEmitted {
            element: delta.element.to_string(),
            records: delta.record_count(),
        });
        self.deltas.push(delta);
    }

    pub fn deltas(&self) -> &[ElementDelta] {
        &self.deltas
    }

    /// Hand the collected deltas to the caller for distribution.
    pub fn take_deltas(&mut self) -> Vec<ElementDelta> {
        std::mem::take(&mut self.deltas)
    }

    pub fn set_modified_resource(&mut self) {
        self.has_modified_resource = true;
    }

    pub fn has_modified_resource(&self) -> bool {
        self.has_modified_resource
    }

    pub fn commit(&mut self) {
        self.phase = OpPhase::Committed;
        self.finished_at = Some(UtcTimestamp::now());
    }

    pub fn fail(&mut self) {
        self.phase = OpPhase::Failed;
        self.finished_at = Some(UtcTimestamp::now());
    }

    /// Path of this unit's file inside `dir`.
    pub fn file_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.json", self.op_id))
    }

    /// Write the log to `<dir>/<op_id>.json` with fsync.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, JournalError> {
        fs::create_dir_all(dir)?;
        let path = self.file_path(dir);
        let content = serde_json::to_string_pretty(self)?;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;

        Ok(path)
    }

    /// Read a log written by [`UnitOfWork::write_to`]. Deltas are not kept.
    pub fn read_from(dir: &Path, op_id: &OpId) -> Result<Self, JournalError> {
        let path = dir.join(format!("{op_id}.json"));
        if !path.exists() {
            return Err(JournalError::NotFound(op_id.to_string()));
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
