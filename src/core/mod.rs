//! core
//!
//! Core domain types, schemas, and the canonical model.
//!
//! # Modules
//!
//! - [`types`] - Strong types: ResourcePath, ElementPath, ModificationMarker
//! - [`arena`] - Generational slot storage
//! - [`config`] - Configuration schema and loading
//! - [`encoding`] - Text encoding of persisted unit content
//! - [`membership`] - Build membership of units (managed vs unmanaged)
//! - [`outline`] - Structure parser for unit text
//! - [`buffer`] - Unit text with atomic save
//! - [`tree`] - Arena-backed element tree
//! - [`model`] - The canonical model and its working copies
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing
//! - Structure and buffer content change together or not at all

pub mod arena;
pub mod buffer;
pub mod config;
pub mod encoding;
pub mod membership;
pub mod model;
pub mod outline;
pub mod tree;
pub mod types;
