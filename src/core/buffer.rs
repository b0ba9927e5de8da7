//! core::buffer
//!
//! Mutable unit text bound to one element.
//!
//! # Invariants
//!
//! - A buffer is owned by exactly one element (or one detached working copy)
//! - `synchronized` is true only while the contents match the store
//! - A failed `save` leaves both contents and flag untouched

use thiserror::Error;
use tracing::debug;

use crate::core::encoding::{self, EncodingError};
use crate::core::types::{ModificationMarker, ResourcePath};
use crate::store::{ResourceStore, StoreError, WriteMode, WriteOptions};

/// Errors from saving a buffer.
#[derive(Debug, Error)]
pub enum BufferError {
    #[error("cannot encode contents: {0}")]
    Encoding(#[from] EncodingError),

    #[error("cannot persist contents: {0}")]
    Store(#[from] StoreError),
}

/// A snapshot of a buffer's contents and synchronization flag.
///
/// Used as the hold-back copy while a commit replaces the contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferState {
    contents: String,
    synchronized: bool,
}

/// Text contents of a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buffer {
    resource: ResourcePath,
    contents: String,
    synchronized: bool,
}

impl Buffer {
    /// A buffer whose contents were just read from the store.
    pub fn synchronized(resource: ResourcePath, contents: String) -> Self {
        Self {
            resource,
            contents,
            synchronized: true,
        }
    }

    /// A buffer with contents the store does not hold yet.
    pub fn unsaved(resource: ResourcePath, contents: String) -> Self {
        Self {
            resource,
            contents,
            synchronized: false,
        }
    }

    pub fn resource(&self) -> &ResourcePath {
        &self.resource
    }

    pub fn contents(&self) -> &str {
        &self.contents
    }

    /// Replace the contents. The buffer is no longer synchronized.
    pub fn set_contents(&mut self, contents: impl Into<String>) {
        self.contents = contents.into();
        self.synchronized = false;
    }

    pub fn has_unsaved_changes(&self) -> bool {
        !self.synchronized
    }

    /// Snapshot contents and flag.
    pub fn state(&self) -> BufferState {
        BufferState {
            contents: self.contents.clone(),
            synchronized: self.synchronized,
        }
    }

    /// Put back a snapshot taken with [`Buffer::state`].
    pub fn restore(&mut self, state: BufferState) {
        self.contents = state.contents;
        self.synchronized = state.synchronized;
    }

    /// Persist the contents.
    ///
    /// Nothing is written when the buffer is synchronized and `force` is not
    /// set; the current marker is returned instead. Otherwise the contents
    /// are encoded and written (created or replaced), with `force` passed to
    /// the store as permission to overwrite conflicting external state.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError`] if encoding or the store write fails. The
    /// buffer is unchanged in that case.
    pub fn save(
        &mut self,
        store: &dyn ResourceStore,
        encoding: Option<&str>,
        force: bool,
        keep_history: bool,
    ) -> Result<Option<ModificationMarker>, BufferError> {
        if self.synchronized && !force {
            debug!(resource = %self.resource, "buffer already synchronized, skipping save");
            return Ok(store.modification_marker(&self.resource));
        }

        let bytes = encoding::encode(&self.contents, encoding)?;
        let exists = store.exists(&self.resource);
        let options = WriteOptions {
            mode: if exists {
                WriteMode::Replace
            } else {
                WriteMode::Create
            },
            overwrite: force,
            keep_history: keep_history && exists,
        };
        let marker = store.write_bytes(&self.resource, &bytes, options)?;

        self.synchronized = true;
        debug!(resource = %self.resource, %marker, bytes = bytes.len(), "buffer saved");
        Ok(Some(marker))
    }
}
