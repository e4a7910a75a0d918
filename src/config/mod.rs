//! Runtime settings
//!
//! Loaded from defaults, an optional `git-indexer.toml`, and environment
//! variables (`DATABASE_URL`, `GITHUB_TOKEN`, `GITLAB_TOKEN`, ...).

pub mod loader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub use loader::{load_settings, load_settings_from_file};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// `sqlite:///relative.db`, `sqlite:////abs/path.db`, `file:path` or a plain path.
    pub database_url: String,
    pub github_token: Option<String>,
    pub gitlab_token: Option<String>,
    pub github_api_url: String,
    pub gitlab_url: String,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    /// Wall-clock budget for walking one repository's history.
    pub index_timeout_secs: u64,
    pub search_bind: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite:///git-indexer.db".to_string(),
            github_token: None,
            gitlab_token: None,
            github_api_url: "https://api.github.com".to_string(),
            gitlab_url: "https://gitlab.com".to_string(),
            log_level: "info".to_string(),
            log_file: None,
            index_timeout_secs: 28_800,
            search_bind: "127.0.0.1:8000".to_string(),
        }
    }
}

impl Settings {
    /// Filesystem path of the SQLite database named by `database_url`.
    pub fn sqlite_path(&self) -> PathBuf {
        let url = self.database_url.trim();
        let path = url
            .strip_prefix("sqlite:///")
            .or_else(|| url.strip_prefix("sqlite://"))
            .or_else(|| url.strip_prefix("file:"))
            .unwrap_or(url);
        PathBuf::from(path)
    }

    pub fn index_timeout(&self) -> Duration {
        Duration::from_secs(self.index_timeout_secs)
    }

    pub(crate) fn normalized(mut self) -> Self {
        fn non_blank(value: Option<String>) -> Option<String> {
            value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
        }
        self.github_token = non_blank(self.github_token);
        self.gitlab_token = non_blank(self.gitlab_token);
        self.log_file = self.log_file.filter(|p| !p.as_os_str().is_empty());
        self
    }
}
