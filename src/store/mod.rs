//! store
//!
//! Single interface to the persisted store.
//!
//! # Architecture
//!
//! Every read and write of persisted unit content goes through the
//! [`ResourceStore`] trait. The commit protocol relies on one contract per
//! call: a write either fully applies or leaves the previous content intact
//! and reports failure.
//!
//! Implementations:
//! - [`memory::MemoryStore`] - in-memory, deterministic, with failure injection
//! - [`fs::FsStore`] - files below a root directory, atomic rename writes
//!
//! # Modification markers
//!
//! [`ResourceStore::modification_marker`] exposes an opaque marker derived
//! from modification events, never from content. Writing identical bytes
//! still changes the marker.

pub mod fs;
pub mod lock;
pub mod memory;

pub use fs::FsStore;
pub use lock::{LockError, StoreLock};
pub use memory::MemoryStore;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{ModificationMarker, ResourcePath};

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The resource does not exist.
    #[error("resource not found: {0}")]
    NotFound(ResourcePath),

    /// Create was requested but the resource exists and overwrite is off.
    #[error("resource already exists: {0}")]
    AlreadyExists(ResourcePath),

    /// The resource is read-only and overwrite is off.
    #[error("resource is read-only: {0}")]
    ReadOnly(ResourcePath),

    /// The store refused the write.
    #[error("store rejected operation on {resource}: {reason}")]
    Rejected {
        resource: ResourcePath,
        reason: String,
    },

    /// Failed to lock the store for writing.
    #[error("store lock error: {0}")]
    Lock(#[from] LockError),

    /// Underlying I/O failure.
    #[error("store i/o error on {resource}: {source}")]
    Io {
        resource: ResourcePath,
        source: std::io::Error,
    },
}

/// Whether a write creates a new resource or replaces an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    Create,
    Replace,
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMode::Create => f.write_str("create"),
            WriteMode::Replace => f.write_str("replace"),
        }
    }
}

/// Options for [`ResourceStore::write_bytes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    pub mode: WriteMode,
    /// Permission to overwrite conflicting external state: an existing
    /// resource on create, or a read-only flag on replace.
    pub overwrite: bool,
    /// Preserve the previous content in the store's history.
    pub keep_history: bool,
}

/// The persisted store.
pub trait ResourceStore: Send + Sync {
    /// Whether the resource currently exists.
    fn exists(&self, resource: &ResourcePath) -> bool;

    /// Read the full content of a resource.
    fn read_bytes(&self, resource: &ResourcePath) -> Result<Vec<u8>, StoreError>;

    /// Current modification marker, `None` if the resource is missing or
    /// inaccessible.
    fn modification_marker(&self, resource: &ResourcePath) -> Option<ModificationMarker>;

    /// Write the full content of a resource, all or nothing.
    ///
    /// - `Create` on an existing resource fails with `AlreadyExists` unless
    ///   `overwrite` is set, in which case it replaces
    /// - `Replace` on a missing resource fails with `NotFound`
    /// - Replacing a read-only resource fails with `ReadOnly` unless
    ///   `overwrite` is set
    ///
    /// Returns the marker of the freshly written resource.
    fn write_bytes(
        &self,
        resource: &ResourcePath,
        bytes: &[u8],
        options: WriteOptions,
    ) -> Result<ModificationMarker, StoreError>;

    /// Preserved previous versions, oldest first.
    fn history(&self, resource: &ResourcePath) -> Result<Vec<Vec<u8>>, StoreError>;
}
