//! Per-repository routing of a run: mirror, then index commits or requests.

use clap::ValueEnum;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::db::Store;
use crate::enumerate::RepoDescriptor;
use crate::index::{index_commits, index_merge_requests};
use crate::mirror::{ensure_mirror, Tokens};
use crate::platform::{Clients, Platform};
use crate::utils::display_url;
use crate::utils::urls::RepoFilter;

/// Pipeline stage a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Mirror remote repositories and index their commits
    Commits,
    /// Index closed and merged merge/pull requests from the platform API
    Requests,
    /// Only create or update mirrors
    Mirror,
}

/// The side effects a run drives, one repository at a time.
pub trait Pipeline {
    /// Local mirror path, or `None` when mirroring failed.
    fn mirror(&mut self, repo: &RepoDescriptor) -> Option<PathBuf>;

    /// Newly indexed commit count, or `None` when indexing failed.
    fn index_commits(&mut self, repo: &RepoDescriptor, local_path: &Path, index_all: bool) -> Option<usize>;

    fn index_requests(&mut self, repo: &RepoDescriptor, platform: Platform) -> usize;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub matched: usize,
    pub mirrored: usize,
    pub failed: usize,
    pub commits: usize,
    pub requests: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Processed {} repositories: {} mirrored, {} failed, {} new commits, {} new requests",
            self.matched, self.mirrored, self.failed, self.commits, self.requests
        )
    }
}

/// Drive `pipeline` over every repository matching `filter`.
pub fn process<P: Pipeline>(
    mode: Mode,
    filter: &RepoFilter,
    repos: impl Iterator<Item = RepoDescriptor>,
    index_all: bool,
    pipeline: &mut P,
) -> RunSummary {
    let mut summary = RunSummary::default();

    for repo in repos.filter(|r| filter.is_match(&r.clone_url)) {
        summary.matched += 1;
        let log_url = display_url(&repo.clone_url);

        if mode == Mode::Requests {
            match Platform::from_source(&repo.repo_source) {
                Some(platform) => summary.requests += pipeline.index_requests(&repo, platform),
                None => info!("Unknown repo_source: {} for {}", repo.repo_source, log_url),
            }
            continue;
        }

        let local_path = if repo.is_remote {
            match pipeline.mirror(&repo) {
                Some(path) => {
                    summary.mirrored += 1;
                    path
                }
                None => {
                    warn!("Cannot create mirror for {}", log_url);
                    summary.failed += 1;
                    continue;
                }
            }
        } else {
            PathBuf::from(&repo.clone_url)
        };

        if mode == Mode::Commits {
            match pipeline.index_commits(&repo, &local_path, index_all) {
                Some(n) => summary.commits += n,
                None => summary.failed += 1,
            }
        }
    }

    summary
}

/// Pipeline backed by the real store, git and platform APIs.
pub struct LivePipeline<'a> {
    pub store: Store,
    pub clients: &'a Clients,
    pub tokens: Tokens,
    pub mirror_root: Option<PathBuf>,
    pub timeout: Duration,
}

impl Pipeline for LivePipeline<'_> {
    fn mirror(&mut self, repo: &RepoDescriptor) -> Option<PathBuf> {
        let root = self.mirror_root.as_deref()?;
        let (path, _) = ensure_mirror(&repo.clone_url, &repo.repo_source, repo.is_private, root, &self.tokens);
        path
    }

    fn index_commits(&mut self, repo: &RepoDescriptor, local_path: &Path, index_all: bool) -> Option<usize> {
        let (indexed, n) = index_commits(
            &mut self.store,
            &repo.clone_url,
            local_path,
            &repo.repo_source,
            index_all,
            self.timeout,
        );
        indexed.map(|_| n)
    }

    fn index_requests(&mut self, repo: &RepoDescriptor, platform: Platform) -> usize {
        let project = match &repo.project {
            Some(project) => project.clone(),
            None => match self.clients.lookup(platform, &repo.clone_url) {
                Ok(project) => project,
                Err(e) => {
                    warn!("Cannot find {} project for {} => {}", platform, display_url(&repo.clone_url), e);
                    return 0;
                }
            },
        };
        index_merge_requests(&self.store, &self.clients.handle(project))
    }
}
