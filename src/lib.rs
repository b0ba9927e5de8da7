//! Workcopy - working copies of source units and the protocol that commits them
//!
//! A working copy is an editable overlay of a unit in a canonical source
//! model. Committing it writes its text back to persistent storage and
//! keeps the model's structure in step, reporting what changed as a
//! structural delta.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`core`] - Domain types, configuration, element tree, buffers, and the model
//! - [`store`] - Single interface for all persisted-resource access
//! - [`engine`] - Commit operation, delta builder, unit of work, progress
//!
//! # Correctness Invariants
//!
//! Workcopy maintains the following invariants:
//!
//! 1. A commit whose preconditions fail changes nothing
//! 2. A resource changed underneath a working copy is never overwritten
//!    unless the caller forces it
//! 3. A failed save leaves the primary unit's buffer as it was
//! 4. A unit's structure and its buffer content always move together

pub mod core;
pub mod engine;
pub mod store;
