//! Row types for the indexed store.

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Row;

use crate::utils::file_type;

static GIT_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.git$").expect("valid regex"));

/// One row per distinct (clone URL, source platform).
#[derive(Debug, Clone, PartialEq)]
pub struct Repository {
    pub id: i64,
    pub repo_type: Option<String>,
    pub repo_name: Option<String>,
    pub repo_group: Option<String>,
    pub component: Option<String>,
    pub clone_url: String,
    pub is_active: bool,
    /// Wall clock of the last completed indexing run.
    pub last_indexed_at: Option<NaiveDateTime>,
    /// Latest committer timestamp indexed so far; the incremental cursor.
    pub last_commit_at: Option<NaiveDateTime>,
}

impl Repository {
    pub(crate) const COLUMNS: &'static str = "id, repo_type, repo_name, repo_group, component, \
         clone_url, is_active, last_indexed_at, last_commit_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            repo_type: row.get(1)?,
            repo_name: row.get(2)?,
            repo_group: row.get(3)?,
            component: row.get(4)?,
            clone_url: row.get(5)?,
            is_active: row.get(6)?,
            last_indexed_at: row.get(7)?,
            last_commit_at: row.get(8)?,
        })
    }

    /// Web URL for browsing the repository.
    pub fn browse_url(&self) -> String {
        let url = self.clone_url.as_str();
        let url = match self.repo_type.as_deref() {
            Some("local") => format!("http://localhost:9000/gitweb{url}"),
            Some("github") if url.starts_with("git@") => {
                url.replacen("git@github.com:", "https://github.com/", 1)
            }
            Some("github") => url.to_string(),
            Some("gitlab") if url.starts_with("git@") => {
                url.replacen("git@gitlab.com:", "https://gitlab.com/", 1)
            }
            Some("gitlab") if url.starts_with("git+ssh://git@gitlab.com/") => {
                url.replacen("git+ssh://git@", "https://", 1)
            }
            Some("gitlab") => url.to_string(),
            _ => "https://invalid.url".to_string(),
        };
        GIT_SUFFIX_RE.replace(&url, "").into_owned()
    }

    /// Prefix for linking a commit hash, empty when the platform has no commit pages.
    pub fn url_for_commit(&self) -> String {
        match self.repo_type.as_deref() {
            Some("github") => format!("{}/commit", self.browse_url()),
            Some(t) if t.starts_with("gitlab") => format!("{}/-/commit", self.browse_url()),
            _ => String::new(),
        }
    }
}

/// One row per lower-cased committer email.
#[derive(Debug, Clone, PartialEq)]
pub struct Author {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub team: Option<String>,
    pub author_group: Option<String>,
    pub login_name: Option<String>,
    /// Canonical author this one is an alias of; maintained by hand.
    pub parent_id: Option<i64>,
}

impl Author {
    pub(crate) const COLUMNS: &'static str =
        "id, name, email, company, team, author_group, login_name, parent_id";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            company: row.get(3)?,
            team: row.get(4)?,
            author_group: row.get(5)?,
            login_name: row.get(6)?,
            parent_id: row.get(7)?,
        })
    }
}

/// One row per commit hash, shared by every repository containing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    pub sha: String,
    pub message: String,
    /// Committer timestamp as naive UTC; compared against the cursor.
    pub created_at: NaiveDateTime,
    /// Same instant with the committer's own offset.
    pub created_at_tz: DateTime<FixedOffset>,
    pub is_merge: bool,
    pub n_lines: i64,
    pub n_files: i64,
    pub n_insertions: i64,
    pub n_deletions: i64,
    pub n_lines_changed: i64,
    pub n_lines_ignored: i64,
    pub n_files_changed: i64,
    pub n_files_ignored: i64,
    pub author_id: i64,
}

impl Commit {
    pub(crate) const COLUMNS: &'static str = "sha, message, created_at, created_at_tz, is_merge, \
         n_lines, n_files, n_insertions, n_deletions, n_lines_changed, n_lines_ignored, \
         n_files_changed, n_files_ignored, author_id";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            sha: row.get(0)?,
            message: row.get(1)?,
            created_at: row.get(2)?,
            created_at_tz: row.get(3)?,
            is_merge: row.get(4)?,
            n_lines: row.get(5)?,
            n_files: row.get(6)?,
            n_insertions: row.get(7)?,
            n_deletions: row.get(8)?,
            n_lines_changed: row.get(9)?,
            n_lines_ignored: row.get(10)?,
            n_files_changed: row.get(11)?,
            n_files_ignored: row.get(12)?,
            author_id: row.get(13)?,
        })
    }
}

/// A commit ready to be written: the row, its committer and its files.
#[derive(Debug, Clone)]
pub struct NewCommit {
    /// `author_id` is ignored; the author is resolved by email on insert.
    pub commit: Commit,
    pub author_name: String,
    /// Already lower-cased.
    pub author_email: String,
    pub files: Vec<CommittedFile>,
}

/// A file touched by a commit. Written with its commit, never updated.
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedFile {
    pub id: i64,
    pub commit_sha: String,
    pub change_type: String,
    pub file_path: String,
    pub file_name: String,
    pub file_type: String,
    pub n_lines_added: i64,
    pub n_lines_deleted: i64,
    pub n_lines_changed: i64,
    pub n_lines_of_code: i64,
    pub n_methods: i64,
    pub n_methods_changed: i64,
    pub is_on_exclude_list: bool,
    pub is_superfluous: bool,
}

impl CommittedFile {
    pub(crate) const COLUMNS: &'static str = "id, commit_sha, change_type, file_path, file_name, \
         file_type, n_lines_added, n_lines_deleted, n_lines_changed, n_lines_of_code, n_methods, \
         n_methods_changed, is_on_exclude_list, is_superfluous";

    /// New unsaved row; the file type is derived from the path.
    pub fn new(commit_sha: &str, change_type: &str, file_path: &str, file_name: &str) -> Self {
        Self {
            id: 0,
            commit_sha: commit_sha.to_string(),
            change_type: change_type.to_string(),
            file_path: file_path.to_string(),
            file_name: file_name.to_string(),
            file_type: file_type(file_path),
            n_lines_added: 0,
            n_lines_deleted: 0,
            n_lines_changed: 0,
            n_lines_of_code: 0,
            n_methods: 0,
            n_methods_changed: 0,
            is_on_exclude_list: false,
            is_superfluous: false,
        }
    }

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            commit_sha: row.get(1)?,
            change_type: row.get(2)?,
            file_path: row.get(3)?,
            file_name: row.get(4)?,
            file_type: row.get(5)?,
            n_lines_added: row.get(6)?,
            n_lines_deleted: row.get(7)?,
            n_lines_changed: row.get(8)?,
            n_lines_of_code: row.get(9)?,
            n_methods: row.get(10)?,
            n_methods_changed: row.get(11)?,
            is_on_exclude_list: row.get(12)?,
            is_superfluous: row.get(13)?,
        })
    }
}

/// A merge/pull request in the platform-neutral shape, before it has a row id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewMergeRequest {
    /// Platform-native id, unique within the repository.
    pub request_id: String,
    pub title: String,
    pub state: String,
    pub source_sha: Option<String>,
    pub source_branch: String,
    pub target_branch: Option<String>,
    pub merge_sha: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub merged_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
    pub is_merged: bool,
    pub merged_by_username: Option<String>,
}

/// A stored merge/pull request.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeRequest {
    pub id: i64,
    pub repo_id: i64,
    pub request: NewMergeRequest,
    pub first_comment_at: Option<NaiveDateTime>,
    pub has_tests: Option<bool>,
    pub has_test_passed: Option<bool>,
}

impl MergeRequest {
    pub(crate) const COLUMNS: &'static str = "id, repo_id, request_id, title, state, source_sha, \
         source_branch, target_branch, merge_sha, created_at, merged_at, updated_at, is_merged, \
         merged_by_username, first_comment_at, has_tests, has_test_passed";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            repo_id: row.get(1)?,
            request: NewMergeRequest {
                request_id: row.get(2)?,
                title: row.get(3)?,
                state: row.get(4)?,
                source_sha: row.get(5)?,
                source_branch: row.get(6)?,
                target_branch: row.get(7)?,
                merge_sha: row.get(8)?,
                created_at: row.get(9)?,
                merged_at: row.get(10)?,
                updated_at: row.get(11)?,
                is_merged: row.get(12)?,
                merged_by_username: row.get(13)?,
            },
            first_comment_at: row.get(14)?,
            has_tests: row.get(15)?,
            has_test_passed: row.get(16)?,
        })
    }
}
