//! Local bare mirrors of remote repositories.
//!
//! Cloning and fetching shell out to `git`; remote URL rewriting goes
//! through libgit2. A mirror is valid when its `HEAD` file exists.

use git2::Repository;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::{IndexError, Result};
use crate::utils::urls::{clone_url_to_mirror_path, strip_credentials};
use crate::utils::{display_url, redact_credentials};

/// Access tokens injected into clone URLs of private repositories.
#[derive(Debug, Clone, Default)]
pub struct Tokens {
    pub github: Option<String>,
    pub gitlab: Option<String>,
}

impl Tokens {
    pub fn from_settings(settings: &Settings) -> Self {
        Self { github: settings.github_token.clone(), gitlab: settings.gitlab_token.clone() }
    }
}

/// Create or update the bare mirror of `clone_url` under `root`.
///
/// Returns the mirror directory and whether it was newly cloned. `None`
/// means the repository should be skipped for this run; a failed clone
/// leaves no directory behind.
pub fn ensure_mirror(
    clone_url: &str,
    repo_source: &str,
    is_private: bool,
    root: &Path,
    tokens: &Tokens,
) -> (Option<PathBuf>, bool) {
    let log_url = display_url(clone_url);
    let repo_dir = match absolute(&clone_url_to_mirror_path(clone_url, &root.to_string_lossy())) {
        Ok(dir) => dir,
        Err(e) => {
            warn!("Cannot resolve mirror path for {} => {}", log_url, e);
            return (None, false);
        }
    };

    if repo_dir.join("HEAD").is_file() {
        match update_remote_url(&repo_dir, repo_source, tokens) {
            Ok(true) => info!("Updated remote url for {}", log_url),
            Ok(false) => {}
            Err(e) => warn!("Cannot update remote url for {} => {}", log_url, e),
        }
        return match run_git(&["fetch", "--prune"], &repo_dir) {
            Ok(()) => {
                info!("Updated existing repo {} from {}", repo_dir.display(), log_url);
                (Some(repo_dir), false)
            }
            Err(e) => {
                warn!("Unable to fetch {} => {}", log_url, e);
                (None, false)
            }
        };
    }

    if is_non_empty_dir(&repo_dir) {
        warn!("{} exists but is not a bare git repo, skipping {}", repo_dir.display(), log_url);
        return (None, false);
    }

    let full_url = if is_private { url_with_token(clone_url, repo_source, tokens) } else { clone_url.to_string() };
    match clone_mirror(&full_url, &repo_dir) {
        Ok(()) => {
            info!("Created new mirror in {} for {}", repo_dir.display(), log_url);
            (Some(repo_dir), true)
        }
        Err(e) => {
            warn!("Unable to clone {} => {}", log_url, e);
            if let Err(e) = fs::remove_dir_all(&repo_dir) {
                debug!("Cannot remove {} => {}", repo_dir.display(), e);
            }
            (None, false)
        }
    }
}

fn clone_mirror(full_url: &str, repo_dir: &Path) -> Result<()> {
    fs::create_dir_all(repo_dir)?;
    let parent = repo_dir.parent().unwrap_or(repo_dir);
    let target = repo_dir.to_string_lossy();
    run_git(&["clone", "--mirror", "--", full_url, &target], parent)?;
    if !repo_dir.join("HEAD").is_file() {
        return Err(IndexError::Other(format!("no HEAD in {} after clone", repo_dir.display())));
    }
    Ok(())
}

/// Add the platform token to an http(s) clone URL.
///
/// GitHub takes the token as the user name, GitLab as the `oauth2` password.
/// Other URLs, and platforms without a configured token, pass through.
pub fn url_with_token(clone_url: &str, repo_source: &str, tokens: &Tokens) -> String {
    if !clone_url.starts_with("http") {
        return clone_url.to_string();
    }

    if repo_source == "github" || clone_url.starts_with("https://github.com") {
        if let Some(token) = &tokens.github {
            return clone_url.replacen("https://", &format!("https://{token}@"), 1);
        }
    } else if repo_source == "gitlab" || clone_url.starts_with("https://gitlab.com") {
        if let Some(token) = &tokens.gitlab {
            return clone_url.replacen("://", &format!("://oauth2:{token}@"), 1);
        }
    }

    clone_url.to_string()
}

/// Re-inject the current token into the mirror's http origin URL.
///
/// Returns whether the URL changed.
pub fn update_remote_url(repo_dir: &Path, repo_source: &str, tokens: &Tokens) -> Result<bool> {
    let repo = Repository::open(repo_dir)?;
    let remote = repo.find_remote("origin")?;
    let Some(url) = remote.url() else {
        return Ok(false);
    };
    if !url.starts_with("http") {
        return Ok(false);
    }

    let new_url = url_with_token(&strip_credentials(url), repo_source, tokens);
    if new_url == url {
        return Ok(false);
    }
    repo.remote_set_url("origin", &new_url)?;
    Ok(true)
}

/// Run `git` in `cwd`, logging the command with credentials masked.
fn run_git(args: &[&str], cwd: &Path) -> Result<()> {
    let command = redact_credentials(&format!("git {}", args.join(" ")));
    info!("Running '{}' in {}", command, cwd.display());

    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()?;

    if output.status.success() {
        debug!("{}", String::from_utf8_lossy(&output.stdout).trim());
        Ok(())
    } else {
        Err(IndexError::Command {
            command,
            status: output.status.to_string(),
            stderr: redact_credentials(String::from_utf8_lossy(&output.stderr).trim()),
        })
    }
}

fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn is_non_empty_dir(path: &Path) -> bool {
    fs::read_dir(path).map(|mut entries| entries.next().is_some()).unwrap_or(false)
}
