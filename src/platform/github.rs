//! GitHub REST v3 client.

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::Deserialize;

use super::{build_client, collect_pages, get_json, Paged, Platform, PlatformProject, Result};
use crate::db::NewMergeRequest;
use crate::utils::time::parse_api_timestamp;

const SEARCH_PER_PAGE: usize = 100;
const PULLS_PER_PAGE: usize = 100;

#[derive(Debug, Deserialize)]
struct ApiRepository {
    full_name: String,
    clone_url: String,
    #[serde(default)]
    private: bool,
}

impl From<ApiRepository> for PlatformProject {
    fn from(repo: ApiRepository) -> Self {
        Self {
            platform: Platform::GitHub,
            id: repo.full_name.clone(),
            path: repo.full_name,
            clone_url: repo.clone_url,
            is_private: repo.private,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    items: Vec<ApiRepository>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiGitRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiUser {
    pub login: String,
}

/// A pull request as returned by `/repos/{owner}/{repo}/pulls`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiPullRequest {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub head: ApiGitRef,
    pub base: ApiGitRef,
    pub merge_commit_sha: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub merged_at: Option<String>,
    /// Only present on the single-pull endpoint.
    #[serde(default)]
    pub merged_by: Option<ApiUser>,
}

impl ApiPullRequest {
    pub fn is_merged(&self) -> bool {
        self.merged_at.is_some()
    }

    pub fn to_merge_request(&self) -> NewMergeRequest {
        let merged = self.is_merged();
        let ts = |value: &Option<String>| parse_api_timestamp(value.as_deref()).map(|dt| dt.naive_utc());
        NewMergeRequest {
            request_id: self.number.to_string(),
            title: self.title.clone(),
            state: self.state.clone(),
            source_sha: self.head.sha.clone(),
            source_branch: self.head.ref_name.clone(),
            target_branch: Some(self.base.ref_name.clone()),
            merge_sha: self.merge_commit_sha.clone(),
            created_at: ts(&self.created_at),
            merged_at: ts(&self.merged_at),
            updated_at: ts(&self.updated_at),
            is_merged: merged,
            merged_by_username: if merged { self.merged_by.as_ref().map(|u| u.login.clone()) } else { None },
        }
    }
}

pub struct GitHubClient {
    http: Client,
    api_url: String,
}

impl GitHubClient {
    pub fn new(api_url: &str, token: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        Ok(Self { http: build_client(headers)?, api_url: api_url.trim_end_matches('/').to_string() })
    }

    /// Repositories matching a search query, fetched page by page as consumed.
    pub fn search_repositories<'a>(&'a self, query: &'a str) -> Paged<'a, PlatformProject> {
        Paged::new(SEARCH_PER_PAGE, move |page| {
            let response: SearchResponse = get_json(
                &self.http,
                &format!("{}/search/repositories", self.api_url),
                &[
                    ("q", query.to_string()),
                    ("per_page", SEARCH_PER_PAGE.to_string()),
                    ("page", page.to_string()),
                ],
            )?;
            Ok(response.items.into_iter().map(PlatformProject::from).collect())
        })
    }

    /// Repository by `owner/name`.
    pub fn repository(&self, full_name: &str) -> Result<PlatformProject> {
        let repo: ApiRepository = get_json(&self.http, &format!("{}/repos/{full_name}", self.api_url), &[])?;
        Ok(repo.into())
    }

    pub fn closed_pulls(&self, full_name: &str) -> Result<Vec<ApiPullRequest>> {
        let url = format!("{}/repos/{full_name}/pulls", self.api_url);
        collect_pages(PULLS_PER_PAGE, |page| {
            get_json(
                &self.http,
                &url,
                &[
                    ("state", "closed".to_string()),
                    ("per_page", PULLS_PER_PAGE.to_string()),
                    ("page", page.to_string()),
                ],
            )
        })
    }

    pub fn pull(&self, full_name: &str, number: u64) -> Result<ApiPullRequest> {
        get_json(&self.http, &format!("{}/repos/{full_name}/pulls/{number}", self.api_url), &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MERGED_PULL: &str = r#"{
        "number": 1,
        "title": "Update README.md",
        "state": "closed",
        "head": {"ref": "feature", "sha": "e1a1bc4b0b9f3e2c1f9f6b47e2b2c0f8e6b5d4c3"},
        "base": {"ref": "main", "sha": "0d1c2b3a"},
        "merge_commit_sha": "9f8e7d6c5b4a39281706f5e4d3c2b1a098765432",
        "created_at": "2023-07-07T07:50:00Z",
        "updated_at": "2023-07-07T08:00:00Z",
        "merged_at": "2023-07-07T07:59:06Z",
        "merged_by": {"login": "sloppycoder"}
    }"#;

    #[test]
    fn test_merged_pull_mapping() {
        let pr: ApiPullRequest = serde_json::from_str(MERGED_PULL).expect("json");
        let mr = pr.to_merge_request();
        assert_eq!(mr.request_id, "1");
        assert_eq!(mr.state, "closed");
        assert!(mr.is_merged);
        assert_eq!(mr.merged_by_username.as_deref(), Some("sloppycoder"));
        assert_eq!(mr.source_branch, "feature");
        assert_eq!(mr.target_branch.as_deref(), Some("main"));
        assert_eq!(mr.merge_sha.as_deref(), Some("9f8e7d6c5b4a39281706f5e4d3c2b1a098765432"));
        assert_eq!(mr.merged_at.map(|t| t.to_string()).as_deref(), Some("2023-07-07 07:59:06"));
    }

    #[test]
    fn test_closed_unmerged_pull_has_no_merger() {
        let json = r#"{
            "number": 7, "title": "wip", "state": "closed",
            "head": {"ref": "wip", "sha": null}, "base": {"ref": "main", "sha": null},
            "merge_commit_sha": null, "created_at": "2023-07-01T00:00:00Z",
            "updated_at": null, "merged_at": null,
            "merged_by": {"login": "someone"}
        }"#;
        let pr: ApiPullRequest = serde_json::from_str(json).expect("json");
        let mr = pr.to_merge_request();
        assert!(!mr.is_merged);
        assert!(mr.merged_by_username.is_none());
        assert!(mr.merged_at.is_none());
    }

    #[test]
    fn test_repository_to_project() {
        let repo: ApiRepository = serde_json::from_str(
            r#"{"full_name": "sloppycoder/hello", "clone_url": "https://github.com/sloppycoder/hello.git", "private": false}"#,
        )
        .expect("json");
        let project = PlatformProject::from(repo);
        assert_eq!(project.path, "sloppycoder/hello");
        assert_eq!(project.platform, Platform::GitHub);
        assert!(!project.is_private);
    }
}
