//! Read-only lookups over the index: by commit hash, author email or repository URL.

pub mod web;

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;

use crate::config::Settings;
use crate::db::{Author, Commit, Repository, Store};

pub const MAX_ITEMS: usize = 50;
pub const MIN_QUERY_CHARS: usize = 4;

static SHA_PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-f]{7}").expect("valid sha regex"));
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\S+@\S+)\b").expect("valid email regex"));

/// What a search term is taken to mean.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    /// Fewer than four characters; nothing is looked up.
    TooShort,
    Sha(String),
    Email(String),
    Repo(String),
}

pub fn classify(query: &str) -> SearchQuery {
    if query.chars().count() < MIN_QUERY_CHARS {
        return SearchQuery::TooShort;
    }
    if !query.contains('@') && SHA_PREFIX_RE.is_match(query) {
        return SearchQuery::Sha(query.to_string());
    }
    if query.contains('@') {
        if let Some(m) = EMAIL_RE.find(query) {
            return SearchQuery::Email(m.as_str().to_string());
        }
    }
    SearchQuery::Repo(query.to_string())
}

/// A commit together with every repository that contains it.
#[derive(Debug, Clone)]
pub struct CommitHit {
    pub commit: Commit,
    pub repos: Vec<Repository>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    pub commits: Vec<CommitHit>,
    pub authors: Vec<Author>,
    pub repos: Vec<Repository>,
}

impl SearchResult {
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty() && self.authors.is_empty() && self.repos.is_empty()
    }
}

/// Run a classified query. A single matching author or repository also
/// brings back its commits.
pub fn search(store: &Store, query: &SearchQuery) -> rusqlite::Result<SearchResult> {
    let mut result = SearchResult::default();
    let commits = match query {
        SearchQuery::TooShort => return Ok(result),
        SearchQuery::Sha(fragment) => store.search_commits_by_sha(fragment, MAX_ITEMS)?,
        SearchQuery::Email(fragment) => {
            result.authors = store.search_authors_by_email(fragment, MAX_ITEMS)?;
            match result.authors.as_slice() {
                [author] => store.commits_by_author(author.id, MAX_ITEMS)?,
                _ => Vec::new(),
            }
        }
        SearchQuery::Repo(fragment) => {
            result.repos = store.search_repositories(fragment, MAX_ITEMS)?;
            match result.repos.as_slice() {
                [repo] => store.commits_in_repository(repo.id, MAX_ITEMS)?,
                _ => Vec::new(),
            }
        }
    };

    result.commits = commits
        .into_iter()
        .map(|commit| {
            let repos = store.repositories_of_commit(&commit.sha)?;
            Ok(CommitHit { commit, repos })
        })
        .collect::<rusqlite::Result<_>>()?;
    Ok(result)
}

/// Where the search service finds the index. Each request opens its own
/// read-only connection.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
}

impl Database {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.sqlite_path())
    }

    pub fn open(&self) -> anyhow::Result<Store> {
        Store::open_read_only(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify("abc"), SearchQuery::TooShort);
        assert_eq!(classify(""), SearchQuery::TooShort);
        assert_eq!(classify("964a8440"), SearchQuery::Sha("964a8440".to_string()));
        assert_eq!(classify("mini@me"), SearchQuery::Email("mini@me".to_string()));
        assert_eq!(classify("author: mini@me.com "), SearchQuery::Email("mini@me.com".to_string()));
        assert_eq!(classify("super/repo"), SearchQuery::Repo("super/repo".to_string()));
        // uppercase hex is not a hash
        assert_eq!(classify("964A8440"), SearchQuery::Repo("964A8440".to_string()));
        // a hash prefix with an @ is not a hash
        assert_eq!(classify("964a844@x"), SearchQuery::Email("964a844@x".to_string()));
    }

    #[test]
    fn test_database_open_fails_on_missing_path() {
        let tmp = tempfile::TempDir::new().expect("tmp");
        let path = tmp.path().join("typo").join("index.db");
        let db = Database::new(&path);

        assert!(db.open().is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_database_open_reads_existing_index() {
        let tmp = tempfile::TempDir::new().expect("tmp");
        let path = tmp.path().join("index.db");
        Store::open(&path)
            .expect("create")
            .ensure_repository("https://github.com/sloppycoder/hello.git", "github")
            .expect("repo");

        let store = Database::new(&path).open().expect("open");
        let result = search(&store, &classify("sloppycoder")).expect("search");
        assert_eq!(result.repos.len(), 1);
    }

    #[test]
    fn test_too_short_query_returns_nothing() {
        let store = Store::open_in_memory().expect("store");
        let result = search(&store, &SearchQuery::TooShort).expect("search");
        assert!(result.is_empty());
    }
}
