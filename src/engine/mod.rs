//! engine
//!
//! Operations that move working-copy edits into the canonical model.
//!
//! # Architecture
//!
//! A commit follows a fixed lifecycle:
//!
//! ```text
//! Verify -> Select path -> Transfer -> Synchronize -> Delta
//! ```
//!
//! 1. **Verify**: the handle is a working copy, its primary exists, and the
//!    resource is unchanged (unless forced)
//! 2. **Select path**: managed (through the primary's buffer) or unmanaged
//!    (straight to the store)
//! 3. **Transfer**: write the content; a failed managed save is rolled back
//!    in memory
//! 4. **Synchronize**: the working copy takes the new modification marker
//! 5. **Delta**: diff the primary's structure against the snapshot taken
//!    before the transfer
//!
//! Every step is recorded on the [`UnitOfWork`] threaded through the call,
//! which also collects the deltas raised.
//!
//! # Invariants
//!
//! - Nothing is mutated before verification passes
//! - Structure and buffer content of the primary change together or not at all
//! - A failed commit never marks the working copy consistent

pub mod commit;
pub mod delta;
pub mod journal;
pub mod progress;

pub use commit::{
    commit, CommitError, CommitOutcome, CommitPath, CommitWorkingCopyOperation, StatusCode,
    Verified,
};
pub use delta::{ChangeFlags, DeltaBuilder, DeltaKind, ElementDelta};
pub use journal::{JournalError, OpId, OpPhase, StepKind, UnitOfWork};
pub use progress::{NullProgressMonitor, ProgressMonitor, ProgressTask};
