//! git-indexer: mirror git repositories and index their history
//!
//! Repositories are enumerated from GitHub, GitLab or a list file, mirrored
//! locally, and their commits, authors, changed files and merge/pull
//! requests recorded in SQLite. The `git-search` binary serves lookups over
//! the resulting index.

pub mod cli;
pub mod config;
pub mod db;
pub mod enumerate;
pub mod error;
pub mod history;
pub mod index;
pub mod mirror;
pub mod platform;
pub mod search;
pub mod utils;
