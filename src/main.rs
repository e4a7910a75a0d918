//! git-indexer: mirror git repositories and index their history
//!
//! Enumerates repositories from a source, keeps local mirrors up to date and
//! writes commits, authors and merge/pull requests to the index database.

use anyhow::Result;

fn main() -> Result<()> {
    git_indexer::cli::run()
}
