#![forbid(unsafe_code)]

//! Notifications emitted by a [`Tree`](crate::Tree).

use crate::path::Path;

/// What a staged write did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    /// A value was written.
    Set,
    /// A value was removed.
    Unset,
}

/// Emitted once per staged write, before the batch is committed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Full path of the write.
    pub path: Path,
    /// Top-level branches the write touched. A write below the root touches
    /// exactly one; a root write touches every key present before or after.
    pub branches: Vec<String>,
    pub kind: ChangeKind,
}

/// Emitted exactly once per non-empty commit, after the batch is visible.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitEvent {
    /// Revision of the tree after this commit. Starts at 1.
    pub revision: u64,
    /// Number of staged writes applied.
    pub writes: usize,
    /// Distinct branches touched by the batch, in first-touch order.
    pub branches: Vec<String>,
}
