//! store::memory
//!
//! In-memory store for tests and embedding.
//!
//! Every successful write, and every external modification made through
//! [`MemoryStore::insert`], bumps a global generation counter; the
//! resource's modification marker is derived from that generation.
//! Failures can be injected with [`FailOn`] and every call is recorded.
//!
//! # Example
//!
//! ```
//! use workcopy::core::types::ResourcePath;
//! use workcopy::store::memory::{FailOn, MemoryStore};
//! use workcopy::store::ResourceStore;
//!
//! let store = MemoryStore::new();
//! let path = ResourcePath::new("src/A.unit").unwrap();
//! store.insert(&path, b"type A\n");
//! assert!(store.exists(&path));
//!
//! store.fail_on(FailOn::Write("disk full".into()));
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::core::types::{ModificationMarker, ResourcePath};

use super::{ResourceStore, StoreError, WriteMode, WriteOptions};

/// Injected failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailOn {
    /// Reject every write with the given reason.
    Write(String),
    /// Reject writes to one resource.
    WriteTo(ResourcePath, String),
    /// Reject every read with the given reason.
    Read(String),
}

/// A recorded store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryOperation {
    Read {
        resource: ResourcePath,
    },
    Write {
        resource: ResourcePath,
        mode: WriteMode,
        overwrite: bool,
        keep_history: bool,
    },
}

#[derive(Debug, Clone)]
struct Entry {
    bytes: Vec<u8>,
    generation: u64,
    read_only: bool,
    history: Vec<Vec<u8>>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<ResourcePath, Entry>,
    generation: u64,
    fail_on: Option<FailOn>,
    operations: Vec<MemoryOperation>,
}

impl Inner {
    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }
}

/// Shared-state in-memory store. Clones see the same resources.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create or overwrite a resource from outside the model.
    ///
    /// Counts as an external modification: the marker changes, no history
    /// is kept, and nothing is recorded as an operation.
    pub fn insert(&self, resource: &ResourcePath, bytes: &[u8]) {
        let mut inner = self.lock();
        let generation = inner.next_generation();
        let entry = inner.entries.entry(resource.clone()).or_insert(Entry {
            bytes: Vec::new(),
            generation,
            read_only: false,
            history: Vec::new(),
        });
        entry.bytes = bytes.to_vec();
        entry.generation = generation;
    }

    /// Delete a resource from outside the model.
    pub fn remove(&self, resource: &ResourcePath) -> bool {
        self.lock().entries.remove(resource).is_some()
    }

    /// Mark a resource read-only. Returns false if it does not exist.
    pub fn set_read_only(&self, resource: &ResourcePath, read_only: bool) -> bool {
        match self.lock().entries.get_mut(resource) {
            Some(entry) => {
                entry.read_only = read_only;
                true
            }
            None => false,
        }
    }

    /// Configure the store to fail.
    pub fn fail_on(&self, fail_on: FailOn) {
        self.lock().fail_on = Some(fail_on);
    }

    pub fn clear_failure(&self) {
        self.lock().fail_on = None;
    }

    /// All recorded calls, in order.
    pub fn operations(&self) -> Vec<MemoryOperation> {
        self.lock().operations.clone()
    }

    /// Number of attempted writes, including rejected ones.
    pub fn write_count(&self) -> usize {
        self.lock()
            .operations
            .iter()
            .filter(|op| matches!(op, MemoryOperation::Write { .. }))
            .count()
    }

    /// Raw content of a resource.
    pub fn contents(&self, resource: &ResourcePath) -> Option<Vec<u8>> {
        self.lock().entries.get(resource).map(|e| e.bytes.clone())
    }

    /// Content of a resource as lossy UTF-8.
    pub fn text(&self, resource: &ResourcePath) -> Option<String> {
        self.contents(resource)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl ResourceStore for MemoryStore {
    fn exists(&self, resource: &ResourcePath) -> bool {
        self.lock().entries.contains_key(resource)
    }

    fn read_bytes(&self, resource: &ResourcePath) -> Result<Vec<u8>, StoreError> {
        let mut inner = self.lock();
        inner.operations.push(MemoryOperation::Read {
            resource: resource.clone(),
        });
        if let Some(FailOn::Read(reason)) = &inner.fail_on {
            return Err(StoreError::Rejected {
                resource: resource.clone(),
                reason: reason.clone(),
            });
        }
        inner
            .entries
            .get(resource)
            .map(|e| e.bytes.clone())
            .ok_or_else(|| StoreError::NotFound(resource.clone()))
    }

    fn modification_marker(&self, resource: &ResourcePath) -> Option<ModificationMarker> {
        self.lock()
            .entries
            .get(resource)
            .map(|e| ModificationMarker::from_generation(e.generation))
    }

    fn write_bytes(
        &self,
        resource: &ResourcePath,
        bytes: &[u8],
        options: WriteOptions,
    ) -> Result<ModificationMarker, StoreError> {
        let mut inner = self.lock();
        inner.operations.push(MemoryOperation::Write {
            resource: resource.clone(),
            mode: options.mode,
            overwrite: options.overwrite,
            keep_history: options.keep_history,
        });

        match &inner.fail_on {
            Some(FailOn::Write(reason)) => {
                return Err(StoreError::Rejected {
                    resource: resource.clone(),
                    reason: reason.clone(),
                })
            }
            Some(FailOn::WriteTo(target, reason)) if target == resource => {
                return Err(StoreError::Rejected {
                    resource: resource.clone(),
                    reason: reason.clone(),
                })
            }
            _ => {}
        }

        match (inner.entries.get(resource), options.mode) {
            (Some(_), WriteMode::Create) if !options.overwrite => {
                return Err(StoreError::AlreadyExists(resource.clone()))
            }
            (Some(entry), _) if entry.read_only && !options.overwrite => {
                return Err(StoreError::ReadOnly(resource.clone()))
            }
            (None, WriteMode::Replace) => return Err(StoreError::NotFound(resource.clone())),
            _ => {}
        }

        let generation = inner.next_generation();
        match inner.entries.get_mut(resource) {
            Some(entry) => {
                let previous = std::mem::replace(&mut entry.bytes, bytes.to_vec());
                if options.keep_history {
                    entry.history.push(previous);
                }
                entry.generation = generation;
            }
            None => {
                inner.entries.insert(
                    resource.clone(),
                    Entry {
                        bytes: bytes.to_vec(),
                        generation,
                        read_only: false,
                        history: Vec::new(),
                    },
                );
            }
        }

        Ok(ModificationMarker::from_generation(generation))
    }

    fn history(&self, resource: &ResourcePath) -> Result<Vec<Vec<u8>>, StoreError> {
        Ok(self
            .lock()
            .entries
            .get(resource)
            .map(|e| e.history.clone())
            .unwrap_or_default())
    }
}
