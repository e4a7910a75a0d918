//! GitLab REST v4 client.

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::Deserialize;

use super::{build_client, collect_pages, get_json, Paged, Platform, PlatformError, PlatformProject, Result};
use crate::db::NewMergeRequest;
use crate::utils::time::parse_api_timestamp;

const SEARCH_PER_PAGE: usize = 20;
const MERGE_REQUESTS_PER_PAGE: usize = 100;

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct ApiProject {
    id: u64,
    path_with_namespace: String,
    http_url_to_repo: String,
    visibility: Option<String>,
}

impl From<ApiProject> for PlatformProject {
    fn from(project: ApiProject) -> Self {
        Self {
            platform: Platform::GitLab,
            id: project.id.to_string(),
            path: project.path_with_namespace,
            clone_url: project.http_url_to_repo,
            is_private: project.visibility.as_deref() == Some("private"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiUser {
    pub username: String,
}

/// A merge request as returned by `/projects/{id}/merge_requests`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiMergeRequest {
    /// Project-scoped id, the one shown in the web UI.
    pub iid: u64,
    pub title: String,
    pub state: String,
    pub source_branch: String,
    pub target_branch: Option<String>,
    pub sha: Option<String>,
    pub merge_commit_sha: Option<String>,
    pub squash_commit_sha: Option<String>,
    #[serde(default)]
    pub squash: bool,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub merged_at: Option<String>,
    #[serde(default)]
    pub merge_user: Option<ApiUser>,
    /// Deprecated by GitLab in favour of `merge_user`.
    #[serde(default)]
    pub merged_by: Option<ApiUser>,
}

impl ApiMergeRequest {
    pub fn is_terminal(&self) -> bool {
        matches!(self.state.as_str(), "closed" | "merged")
    }

    pub fn to_merge_request(&self) -> NewMergeRequest {
        let merged = self.state == "merged";
        let (merged_by_username, merge_sha) = if merged {
            let user = self.merge_user.as_ref().or(self.merged_by.as_ref()).map(|u| u.username.clone());
            let sha = if self.squash { self.squash_commit_sha.clone() } else { self.merge_commit_sha.clone() };
            (user, sha)
        } else {
            (None, None)
        };
        let ts = |value: &Option<String>| parse_api_timestamp(value.as_deref()).map(|dt| dt.naive_utc());

        NewMergeRequest {
            request_id: self.iid.to_string(),
            title: self.title.clone(),
            state: self.state.clone(),
            source_sha: self.sha.clone(),
            source_branch: self.source_branch.clone(),
            target_branch: self.target_branch.clone(),
            merge_sha,
            created_at: ts(&self.created_at),
            merged_at: ts(&self.merged_at),
            updated_at: ts(&self.updated_at),
            is_merged: merged,
            merged_by_username,
        }
    }
}

pub struct GitLabClient {
    http: Client,
    api_url: String,
    has_token: bool,
}

impl GitLabClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(token)?;
            value.set_sensitive(true);
            headers.insert("PRIVATE-TOKEN", value);
        }
        let base = base_url.trim_end_matches('/');
        let api_url = if base.ends_with("/api/v4") { base.to_string() } else { format!("{base}/api/v4") };
        Ok(Self { http: build_client(headers)?, api_url, has_token: token.is_some() })
    }

    pub fn has_token(&self) -> bool {
        self.has_token
    }

    /// Projects matching a search term. Each hit costs one extra project fetch.
    pub fn search_projects<'a>(&'a self, query: &'a str) -> Paged<'a, PlatformProject> {
        Paged::new(SEARCH_PER_PAGE, move |page| {
            if !self.has_token {
                return Err(PlatformError::MissingToken("GitLab"));
            }
            let hits: Vec<SearchHit> = get_json(
                &self.http,
                &format!("{}/search", self.api_url),
                &[
                    ("scope", "projects".to_string()),
                    ("search", query.to_string()),
                    ("per_page", SEARCH_PER_PAGE.to_string()),
                    ("page", page.to_string()),
                ],
            )?;
            hits.iter().map(|hit| self.project(&hit.id.to_string())).collect()
        })
    }

    /// Project by numeric id or `namespace/name` path.
    pub fn project(&self, id_or_path: &str) -> Result<PlatformProject> {
        let project: ApiProject =
            get_json(&self.http, &format!("{}/projects/{}", self.api_url, encode_id(id_or_path)), &[])?;
        Ok(project.into())
    }

    /// Merge requests in `closed` or `merged` state.
    pub fn closed_merge_requests(&self, id_or_path: &str) -> Result<Vec<ApiMergeRequest>> {
        let url = format!("{}/projects/{}/merge_requests", self.api_url, encode_id(id_or_path));
        let all: Vec<ApiMergeRequest> = collect_pages(MERGE_REQUESTS_PER_PAGE, |page| {
            get_json(
                &self.http,
                &url,
                &[("per_page", MERGE_REQUESTS_PER_PAGE.to_string()), ("page", page.to_string())],
            )
        })?;
        Ok(all.into_iter().filter(ApiMergeRequest::is_terminal).collect())
    }
}

fn encode_id(id_or_path: &str) -> String {
    url::form_urlencoded::byte_serialize(id_or_path.as_bytes()).collect()
}
