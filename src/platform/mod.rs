//! GitHub and GitLab REST clients.
//!
//! Blocking `reqwest` clients with `serde` models for the handful of
//! endpoints the indexer needs: project search, project lookup and closed
//! merge/pull request listing.

pub mod github;
pub mod gitlab;

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::config::Settings;
use crate::db::NewMergeRequest;

pub use github::{ApiPullRequest, GitHubClient};
pub use gitlab::{ApiMergeRequest, GitLabClient};

pub type Result<T> = std::result::Result<T, PlatformError>;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0} token not configured")]
    MissingToken(&'static str),

    #[error("invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),

    #[error("cannot resolve a project from {0}")]
    UnknownProject(String),
}

/// Hosting platform of a remote repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    GitHub,
    GitLab,
}

impl Platform {
    /// Tag stored as `repositories.repo_type`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GitHub => "github",
            Self::GitLab => "gitlab",
        }
    }

    pub fn from_source(source: &str) -> Option<Self> {
        match source {
            "github" => Some(Self::GitHub),
            "gitlab" => Some(Self::GitLab),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hosted project, as returned by search or lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformProject {
    pub platform: Platform,
    /// Numeric project id on GitLab, `owner/name` on GitHub.
    pub id: String,
    /// `namespace/name`.
    pub path: String,
    /// Canonical https clone URL; the repository identifier.
    pub clone_url: String,
    pub is_private: bool,
}

/// A closed or merged request in its platform's own shape.
#[derive(Debug, Clone)]
pub enum PlatformRequest {
    GitHub(ApiPullRequest),
    GitLab(ApiMergeRequest),
}

impl PlatformRequest {
    /// Platform-native id: the pull number on GitHub, the project-scoped `iid` on GitLab.
    pub fn request_id(&self) -> String {
        match self {
            Self::GitHub(pr) => pr.number.to_string(),
            Self::GitLab(mr) => mr.iid.to_string(),
        }
    }

    pub fn to_merge_request(&self) -> NewMergeRequest {
        match self {
            Self::GitHub(pr) => pr.to_merge_request(),
            Self::GitLab(mr) => mr.to_merge_request(),
        }
    }
}

/// Where the request indexer reads a project's requests from.
pub trait RequestSource {
    fn platform(&self) -> Platform;

    fn clone_url(&self) -> &str;

    /// Requests in a terminal state (closed or merged), in listing order.
    fn closed_requests(&self) -> Result<Vec<PlatformRequest>>;

    /// Fill in fields the listing leaves out. Called only for requests about to be stored.
    fn resolve(&self, request: PlatformRequest) -> Result<PlatformRequest> {
        Ok(request)
    }
}

/// API clients for both platforms, built once per run.
pub struct Clients {
    pub github: GitHubClient,
    pub gitlab: GitLabClient,
}

impl Clients {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            github: GitHubClient::new(&settings.github_api_url, settings.github_token.as_deref())?,
            gitlab: GitLabClient::new(&settings.gitlab_url, settings.gitlab_token.as_deref())?,
        })
    }

    /// Look a project up by the path in its clone URL.
    pub fn lookup(&self, platform: Platform, clone_url: &str) -> Result<PlatformProject> {
        let path = crate::utils::urls::project_path(clone_url)
            .ok_or_else(|| PlatformError::UnknownProject(crate::utils::display_url(clone_url)))?;
        match platform {
            Platform::GitHub => self.github.repository(&path),
            Platform::GitLab => self.gitlab.project(&path),
        }
    }

    pub fn handle(&self, project: PlatformProject) -> ProjectHandle<'_> {
        ProjectHandle { project, clients: self }
    }
}

/// A project bound to the client that can list its requests.
pub struct ProjectHandle<'a> {
    project: PlatformProject,
    clients: &'a Clients,
}

impl ProjectHandle<'_> {
    pub fn project(&self) -> &PlatformProject {
        &self.project
    }
}

impl RequestSource for ProjectHandle<'_> {
    fn platform(&self) -> Platform {
        self.project.platform
    }

    fn clone_url(&self) -> &str {
        &self.project.clone_url
    }

    fn closed_requests(&self) -> Result<Vec<PlatformRequest>> {
        let requests = match self.project.platform {
            Platform::GitHub => self
                .clients
                .github
                .closed_pulls(&self.project.path)?
                .into_iter()
                .map(PlatformRequest::GitHub)
                .collect(),
            Platform::GitLab => self
                .clients
                .gitlab
                .closed_merge_requests(&self.project.id)?
                .into_iter()
                .map(PlatformRequest::GitLab)
                .collect(),
        };
        Ok(requests)
    }

    fn resolve(&self, request: PlatformRequest) -> Result<PlatformRequest> {
        match request {
            // the pulls listing never carries merged_by
            PlatformRequest::GitHub(pr) if pr.is_merged() && pr.merged_by.is_none() => {
                let detail = self.clients.github.pull(&self.project.path, pr.number)?;
                Ok(PlatformRequest::GitHub(detail))
            }
            other => Ok(other),
        }
    }
}

/// Lazily fetched pages of API results.
///
/// A page shorter than `per_page` ends the sequence; the first error is
/// yielded once and ends it too.
pub struct Paged<'a, T> {
    fetch: Box<dyn FnMut(u32) -> Result<Vec<T>> + 'a>,
    per_page: usize,
    next_page: u32,
    buffer: std::vec::IntoIter<T>,
    done: bool,
}

impl<'a, T> Paged<'a, T> {
    pub fn new(per_page: usize, fetch: impl FnMut(u32) -> Result<Vec<T>> + 'a) -> Self {
        Self {
            fetch: Box::new(fetch),
            per_page,
            next_page: 1,
            buffer: Vec::new().into_iter(),
            done: false,
        }
    }
}

impl<T> Iterator for Paged<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.next() {
                return Some(Ok(item));
            }
            if self.done {
                return None;
            }
            match (self.fetch)(self.next_page) {
                Ok(items) => {
                    self.next_page += 1;
                    self.done = items.len() < self.per_page;
                    self.buffer = items.into_iter();
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Fetch every page of a listing endpoint.
pub(crate) fn collect_pages<T>(per_page: usize, fetch: impl FnMut(u32) -> Result<Vec<T>>) -> Result<Vec<T>> {
    Paged::new(per_page, fetch).collect()
}

pub(crate) fn build_client(headers: reqwest::header::HeaderMap) -> Result<Client> {
    let client = Client::builder()
        .user_agent(concat!("git-indexer/", env!("CARGO_PKG_VERSION")))
        .default_headers(headers)
        .timeout(Duration::from_secs(60))
        .build()?;
    Ok(client)
}

pub(crate) fn get_json<T: DeserializeOwned>(http: &Client, url: &str, query: &[(&str, String)]) -> Result<T> {
    tracing::debug!("GET {}", url);
    let response = http.get(url).query(query).send()?;
    let status = response.status();
    if !status.is_success() {
        let message = response.text().unwrap_or_default();
        return Err(PlatformError::Api { status: status.as_u16(), message });
    }
    let body = response.text()?;
    Ok(serde_json::from_str(&body)?)
}
