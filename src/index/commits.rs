use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::log_failure;
use crate::db::{Commit, CommittedFile, NewCommit, Repository, Store};
use crate::error::Result;
use crate::history::{HistoryWalker, MinedCommit};
use crate::utils::time::{now_naive_utc, to_naive_utc};
use crate::utils::{display_url, format_with_commas, should_exclude_from_stats, truncate_chars};

/// Longest commit message kept; squash merges can carry huge ones.
pub const MAX_MESSAGE_CHARS: usize = 2048;

/// Index the commits of the repository mirrored at `local_path`.
///
/// Returns the repository row and the number of commits newly linked to it.
/// An inactive repository yields `(Some(repo), 0)`; any failure is logged
/// and yields `(None, 0)`, leaving whatever was already committed in place.
pub fn index_commits(
    store: &mut Store,
    clone_url: &str,
    local_path: &Path,
    repo_source: &str,
    index_all: bool,
    timeout: Duration,
) -> (Option<Repository>, usize) {
    let log_url = display_url(clone_url);
    match try_index_commits(store, clone_url, local_path, repo_source, index_all, timeout, &log_url) {
        Ok(result) => result,
        Err(e) => {
            log_failure(&log_url, &e);
            (None, 0)
        }
    }
}

fn try_index_commits(
    store: &mut Store,
    clone_url: &str,
    local_path: &Path,
    repo_source: &str,
    index_all: bool,
    timeout: Duration,
    log_url: &str,
) -> Result<(Option<Repository>, usize)> {
    let repo = store.ensure_repository(clone_url, repo_source)?;
    if !repo.is_active {
        info!("Skipping inactive repository {}", log_url);
        return Ok((Some(repo), 0));
    }

    info!("Starting to index {}", log_url);
    let started = Instant::now();

    let known = store.repo_commit_hashes(repo.id)?;
    let since = if index_all { None } else { repo.last_commit_at };
    let walker = HistoryWalker::open(local_path)?;

    let mut n_new_commits = 0usize;
    for entry in walker.commits_since(since)? {
        if started.elapsed() >= timeout {
            warn!("Indexing not done after {} seconds, aborting {}", timeout.as_secs(), log_url);
            break;
        }

        let entry = entry?;
        if known.contains(&entry.hash) {
            continue;
        }

        // shared with a fork: link only
        let new_commit = if store.commit_exists(&entry.hash)? {
            debug!("Commit {} already indexed, linking", entry.hash);
            None
        } else {
            Some(build_commit(walker.mine(&entry)?))
        };

        store.record_commit(repo.id, &entry.hash, to_naive_utc(&entry.committed_at), new_commit.as_ref())?;
        n_new_commits += 1;
    }

    if n_new_commits > 0 {
        info!("Indexed {} new commits in {}", format_with_commas(n_new_commits), log_url);
    }

    store.mark_indexed(repo.id, now_naive_utc())?;
    let repo = store.repository(repo.id)?;
    Ok((Some(repo), n_new_commits))
}

/// Turn a mined commit into rows, splitting line and file counts by the exclusion list.
pub fn build_commit(mined: MinedCommit) -> NewCommit {
    let mut files = Vec::with_capacity(mined.modifications.len());
    let (mut n_lines_changed, mut n_lines_ignored) = (0i64, 0i64);
    let (mut n_files_changed, mut n_files_ignored) = (0i64, 0i64);

    for m in &mined.modifications {
        let path = m.path();
        let excluded = should_exclude_from_stats(path);
        let lines = (m.added_lines + m.deleted_lines) as i64;

        let mut file = CommittedFile::new(&mined.hash, m.change_kind.as_str(), path, &m.filename);
        file.n_lines_added = m.added_lines as i64;
        file.n_lines_deleted = m.deleted_lines as i64;
        file.n_lines_changed = lines;
        file.n_lines_of_code = m.nloc as i64;
        file.n_methods = m.methods as i64;
        file.n_methods_changed = m.methods_changed as i64;
        file.is_on_exclude_list = excluded;
        file.is_superfluous = excluded;
        files.push(file);

        if excluded {
            n_files_ignored += 1;
            n_lines_ignored += lines;
        } else {
            n_files_changed += 1;
            n_lines_changed += lines;
        }
    }

    let commit = Commit {
        sha: mined.hash,
        message: truncate_chars(&mined.message, MAX_MESSAGE_CHARS).to_string(),
        created_at: to_naive_utc(&mined.committed_at),
        created_at_tz: mined.committed_at,
        is_merge: mined.is_merge,
        n_lines: mined.stats.lines() as i64,
        n_files: mined.stats.files as i64,
        n_insertions: mined.stats.insertions as i64,
        n_deletions: mined.stats.deletions as i64,
        n_lines_changed,
        n_lines_ignored,
        n_files_changed,
        n_files_ignored,
        author_id: 0,
    };

    NewCommit {
        commit,
        author_name: mined.committer_name,
        author_email: mined.committer_email.to_lowercase(),
        files,
    }
}
