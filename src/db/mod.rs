//! Relational store for repositories, authors, commits, files and merge requests.

pub mod models;
pub mod schema;
mod store;

pub use models::{Author, Commit, CommittedFile, MergeRequest, NewCommit, NewMergeRequest, Repository};
pub use store::Store;
