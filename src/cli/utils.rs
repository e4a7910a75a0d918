//! Shared CLI utilities.

use anyhow::{Context, Result};

use crate::utils::urls::RepoFilter;

/// Split a comma-separated string, trimming whitespace and discarding empty segments.
pub fn parse_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.to_string())
        .collect()
}

/// Build the `--filter` matcher; an empty filter matches everything.
pub fn repo_filter(value: &str) -> Result<RepoFilter> {
    let mut patterns = parse_csv(value);
    if patterns.is_empty() {
        patterns.push("*".to_string());
    }
    RepoFilter::new(&patterns).with_context(|| format!("Invalid --filter pattern: {value}"))
}
