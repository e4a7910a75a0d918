//! Clone URL helpers: log-safe display, credential masking, mirror paths, filters.

use globset::{Glob, GlobSet, GlobSetBuilder};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

static SCHEME_HOST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://[^/]+").expect("valid scheme regex"));
static SSH_HOST_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"git@.*:").expect("valid ssh regex"));
static GIT_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.git$").expect("valid suffix regex"));
static CREDENTIALS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(://)[^@/\s]+@").expect("valid credentials regex"));

pub const DISPLAY_URL_MAX_LENGTH: usize = 64;

/// Short, credential-free form of a clone URL for log lines.
///
/// Drops the `scheme://host` or `git@host:` prefix (and with it any
/// embedded token), middle-truncates long paths and strips `.git`.
pub fn display_url(clone_url: &str) -> String {
    display_url_with_max(clone_url, DISPLAY_URL_MAX_LENGTH)
}

pub fn display_url_with_max(clone_url: &str, max_length: usize) -> String {
    let url = SCHEME_HOST_RE.replace_all(clone_url, "");
    let url = SSH_HOST_RE.replace_all(&url, "");
    let url = shorten(&url, max_length);
    GIT_SUFFIX_RE.replace(&url, "").into_owned()
}

fn shorten(path: &str, max_length: usize) -> String {
    let chars: Vec<char> = path.chars().collect();
    if chars.len() <= max_length {
        return path.to_string();
    }
    let tail_len = max_length.saturating_sub(6);
    let head: String = chars[..3.min(chars.len())].iter().collect();
    let tail: String = chars[chars.len() - tail_len..].iter().collect();
    format!("{head}...{tail}")
}

/// Mask `user:secret@` in any `scheme://` URL inside `text`.
pub fn redact_credentials(text: &str) -> String {
    CREDENTIALS_RE.replace_all(text, "${1}***:***@").into_owned()
}

/// Remove `user:secret@` from an http(s) URL, keeping the scheme.
pub fn strip_credentials(url: &str) -> String {
    CREDENTIALS_RE.replace(url, "${1}").into_owned()
}

/// Map a clone URL to the bare mirror directory under `dest_path`.
///
/// - `https://[creds@]host/ns/project/repo` → `<dest>/ns/project/repo.git`
/// - `git@host:ns/repo.git`                → `<dest>/ns/repo.git`
/// - local `/some/where/project/repo`      → `<dest>/project/repo.git`
pub fn clone_url_to_mirror_path(clone_url: &str, dest_path: &str) -> PathBuf {
    let mut path = if clone_url.starts_with("http") {
        clone_url.split('/').skip(3).collect::<Vec<_>>().join("/")
    } else if clone_url.starts_with("git@") {
        clone_url.split(':').nth(1).unwrap_or_default().to_string()
    } else {
        let local = Path::new(clone_url);
        let name = local.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let parent = local
            .parent()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        format!("{parent}/{name}")
    };

    if !path.ends_with(".git") {
        path.push_str(".git");
    }

    PathBuf::from(format!("{}/{}", dest_path.trim_end_matches('/'), path))
}

/// Repository name: last URL segment without `.git`.
pub fn repo_name(clone_url: &str) -> String {
    let last = clone_url.trim_end_matches('/').rsplit(&['/', ':'][..]).next().unwrap_or(clone_url);
    last.strip_suffix(".git").unwrap_or(last).to_string()
}

/// `namespace/project` path of a hosted clone URL, as platform APIs address it.
pub fn project_path(clone_url: &str) -> Option<String> {
    let path = if clone_url.starts_with("http") {
        clone_url.splitn(4, '/').nth(3)?.to_string()
    } else if let Some(rest) = clone_url.strip_prefix("git@") {
        rest.split_once(':')?.1.to_string()
    } else {
        return None;
    };
    let path = path.trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    (!path.is_empty()).then(|| path.to_string())
}

/// Comma-separated shell-style globs; `*` also matches `/`.
#[derive(Debug, Clone)]
pub struct RepoFilter {
    set: GlobSet,
}

impl RepoFilter {
    pub fn new(patterns: &[String]) -> Result<Self, globset::Error> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(Glob::new(pattern)?);
        }
        Ok(Self { set: builder.build()? })
    }

    pub fn is_match(&self, identifier: &str) -> bool {
        self.set.is_match(identifier)
    }
}
