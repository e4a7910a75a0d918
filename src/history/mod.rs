//! Commit history mining over libgit2.
//!
//! The walk is split in two: a cheap pass that yields `(hash, time)` for
//! every commit past the cursor, and [`HistoryWalker::mine`] which computes
//! diff statistics and per-file modifications only when a commit needs a
//! new row.

mod methods;
mod walker;

pub use walker::{ChangeKind, CommitEntry, CommitStats, FileModification, HistoryWalker, MinedCommit};
