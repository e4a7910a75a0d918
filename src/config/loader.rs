//! Settings loading
//!
//! Precedence: environment > config file > defaults.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use std::path::{Path, PathBuf};

use super::Settings;

pub const CONFIG_ENV_VAR: &str = "GIT_INDEXER_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "git-indexer.toml";

const ENV_KEYS: &[&str] = &[
    "database_url",
    "github_token",
    "gitlab_token",
    "github_api_url",
    "gitlab_url",
    "log_level",
    "log_file",
    "index_timeout_secs",
    "search_bind",
];

/// Load settings for the current process.
///
/// The config file is the one named by `GIT_INDEXER_CONFIG`, else
/// `git-indexer.toml` in the working directory when present.
pub fn load_settings() -> Result<Settings> {
    let explicit = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
    let config_path_provided = explicit.is_some();
    let discovered = explicit.or_else(|| {
        let candidate = PathBuf::from(DEFAULT_CONFIG_FILE);
        candidate.exists().then_some(candidate)
    });

    let Some(config_file) = discovered else {
        return extract(base().merge(env()));
    };

    if config_path_provided && !config_file.exists() {
        anyhow::bail!("Config file not found: {}", config_file.display());
    }

    match extract(with_file(&config_file).merge(env())) {
        Ok(settings) => Ok(settings),
        Err(e) if !config_path_provided => {
            // auto-discovered: fall back to env + defaults
            tracing::warn!(
                "Failed to parse auto-discovered config {}: {:#}",
                config_file.display(),
                e
            );
            extract(base().merge(env()))
        }
        Err(e) => Err(e),
    }
}

/// Settings from a single TOML file over the defaults, ignoring the environment.
pub fn load_settings_from_file(path: &Path) -> Result<Settings> {
    extract(with_file(path))
}

fn base() -> Figment {
    Figment::from(Serialized::defaults(Settings::default()))
}

fn with_file(path: &Path) -> Figment {
    base().merge(Toml::file(path))
}

fn env() -> Env {
    Env::raw().only(ENV_KEYS)
}

fn extract(figment: Figment) -> Result<Settings> {
    let settings: Settings = figment.extract().context("Invalid git-indexer settings")?;
    Ok(settings.normalized())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_from_empty_file() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("git-indexer.toml");
        fs::write(&path, "").expect("write");

        let settings = load_settings_from_file(&path).expect("settings");
        assert_eq!(settings.index_timeout_secs, 28_800);
        assert_eq!(settings.gitlab_url, "https://gitlab.com");
        assert!(settings.github_token.is_none());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("git-indexer.toml");
        fs::write(
            &path,
            "database_url = 'sqlite:///tmp/gi.db'\nindex_timeout_secs = 60\ngitlab_token = ''\n",
        )
        .expect("write");

        let settings = load_settings_from_file(&path).expect("settings");
        assert_eq!(settings.index_timeout_secs, 60);
        assert_eq!(settings.sqlite_path(), PathBuf::from("tmp/gi.db"));
        // blank tokens count as unset
        assert!(settings.gitlab_token.is_none());
    }

    #[test]
    fn test_invalid_type_is_an_error() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("bad.toml");
        fs::write(&path, "index_timeout_secs = 'soon'\n").expect("write");

        assert!(load_settings_from_file(&path).is_err());
    }
}
