//! Commit and merge request indexers.
//!
//! Both entry points swallow their errors: a failure is logged against the
//! repository's display URL and reported as a zero result, so one broken
//! repository never stops a run over many.

pub mod commits;
pub mod requests;

pub use commits::index_commits;
pub use requests::index_merge_requests;

use crate::error::IndexError;

fn log_failure(log_url: &str, err: &IndexError) {
    match err {
        IndexError::Command { command, stderr, .. } => {
            tracing::warn!("{} returned {} for {}", command, stderr.trim(), log_url);
        }
        IndexError::Other(_) => {
            tracing::warn!("Exception indexing repository {} => {:?}", log_url, err);
        }
        _ => {
            tracing::warn!("{} indexing repository {} => {}", err.kind(), log_url, err);
        }
    }
}
