//! Error types for mirroring and indexing.

use thiserror::Error;

use crate::platform::PlatformError;

pub type Result<T> = std::result::Result<T, IndexError>;

/// Failures an indexing or mirroring step can hit.
///
/// Callers at the per-repository boundary log these and carry on with the
/// next repository; none of them aborts a run.
#[derive(Error, Debug)]
pub enum IndexError {
    /// libgit2 failed to open, walk or diff a repository.
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// An external `git` process exited unsuccessfully.
    #[error("`{command}` exited with {status}: {stderr}")]
    Command {
        /// Command line with credentials masked.
        command: String,
        status: String,
        stderr: String,
    },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl IndexError {
    /// Short category label for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Git(_) | Self::Command { .. } => "GitError",
            Self::Storage(_) => "DatabaseError",
            Self::Platform(_) => "PlatformError",
            Self::Io(_) => "IoError",
            Self::Other(_) => "Exception",
        }
    }
}
