//! Repository enumeration: platform searches and list files.

use clap::ValueEnum;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::platform::{Clients, PlatformProject, Result as PlatformResult};

/// Where repositories to process come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Source {
    Github,
    Gitlab,
    List,
}

/// One repository to mirror or index.
#[derive(Debug, Clone, PartialEq)]
pub struct RepoDescriptor {
    /// Clone URL for remote repositories, a filesystem path for local ones.
    pub clone_url: String,
    pub is_private: bool,
    /// `github`, `gitlab`, `local`, or whatever a list file names.
    pub repo_source: String,
    pub is_remote: bool,
    /// Set when the repository came from a platform search.
    pub project: Option<PlatformProject>,
}

impl From<PlatformProject> for RepoDescriptor {
    fn from(project: PlatformProject) -> Self {
        Self {
            clone_url: project.clone_url.clone(),
            is_private: project.is_private,
            repo_source: project.platform.as_str().to_string(),
            is_remote: true,
            project: Some(project),
        }
    }
}

/// Repositories from `source`. `query` is a search term, or the list file path.
pub fn enumerate<'a>(
    source: Source,
    query: &'a str,
    clients: &'a Clients,
) -> anyhow::Result<Box<dyn Iterator<Item = RepoDescriptor> + 'a>> {
    let repos: Box<dyn Iterator<Item = RepoDescriptor> + 'a> = match source {
        Source::Github => Box::new(until_error("GitHub", query, clients.github.search_repositories(query))),
        Source::Gitlab => {
            if !clients.gitlab.has_token() {
                info!("GITLAB_TOKEN not set, skipping GitLab search");
                Box::new(std::iter::empty())
            } else {
                Box::new(until_error("GitLab", query, clients.gitlab.search_projects(query)))
            }
        }
        Source::List => {
            let path = Path::new(query);
            let content = fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("Failed to read list file {}: {}", path.display(), e))?;
            Box::new(parse_list(&content).into_iter())
        }
    };
    Ok(repos)
}

fn until_error<'a>(
    platform: &'static str,
    query: &'a str,
    results: impl Iterator<Item = PlatformResult<PlatformProject>> + 'a,
) -> impl Iterator<Item = RepoDescriptor> + 'a {
    results.map_while(move |result| match result {
        Ok(project) => Some(RepoDescriptor::from(project)),
        Err(e) => {
            info!("{} search {} error => {}", platform, query, e);
            None
        }
    })
}

/// Parse a list file: one `url[,private y/n[,source]]` entry per line.
///
/// Lines starting with `#` and lines of six characters or fewer are
/// skipped. URLs on github.com or gitlab.com get that platform as their
/// source regardless of the third field; anything else defaults to `local`.
pub fn parse_list(content: &str) -> Vec<RepoDescriptor> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#') && line.chars().count() > 6)
        .map(|line| {
            let parts: Vec<&str> = line.split(',').map(str::trim).collect();
            let url = parts[0].to_lowercase();
            let private_flag = parts.get(1).map(|p| p.to_lowercase()).unwrap_or_else(|| "n".to_string());

            let repo_source = if url.contains("github.com") {
                "github".to_string()
            } else if url.contains("gitlab.com") {
                "gitlab".to_string()
            } else {
                parts.get(2).map(|s| s.to_lowercase()).unwrap_or_else(|| "local".to_string())
            };

            RepoDescriptor {
                clone_url: parts[0].to_string(),
                is_private: private_flag == "y",
                is_remote: repo_source != "local",
                repo_source,
                project: None,
            }
        })
        .collect()
}
