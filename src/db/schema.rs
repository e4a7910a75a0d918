//! SQLite schema for the commit index.

use anyhow::{bail, Context, Result};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;

pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS repositories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        repo_type TEXT,
        repo_name TEXT,
        repo_group TEXT,
        component TEXT,
        clone_url TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1,
        last_indexed_at TEXT,
        last_commit_at TEXT
    );
    CREATE UNIQUE INDEX IF NOT EXISTS ux_repositories_url_type
        ON repositories(clone_url, repo_type);

    CREATE TABLE IF NOT EXISTS authors (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        company TEXT,
        team TEXT,
        author_group TEXT,
        login_name TEXT,
        parent_id INTEGER REFERENCES authors(id)
    );

    CREATE TABLE IF NOT EXISTS commits (
        sha TEXT PRIMARY KEY,
        message TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL,
        created_at_tz TEXT NOT NULL,
        is_merge INTEGER NOT NULL DEFAULT 0,
        n_lines INTEGER NOT NULL DEFAULT 0,
        n_files INTEGER NOT NULL DEFAULT 0,
        n_insertions INTEGER NOT NULL DEFAULT 0,
        n_deletions INTEGER NOT NULL DEFAULT 0,
        n_lines_changed INTEGER NOT NULL DEFAULT 0,
        n_lines_ignored INTEGER NOT NULL DEFAULT 0,
        n_files_changed INTEGER NOT NULL DEFAULT 0,
        n_files_ignored INTEGER NOT NULL DEFAULT 0,
        author_id INTEGER NOT NULL REFERENCES authors(id)
    );
    CREATE INDEX IF NOT EXISTS ix_commits_author ON commits(author_id);

    CREATE TABLE IF NOT EXISTS committed_files (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        commit_sha TEXT NOT NULL REFERENCES commits(sha),
        change_type TEXT NOT NULL DEFAULT 'UNKNOWN',
        file_path TEXT NOT NULL,
        file_name TEXT NOT NULL,
        file_type TEXT NOT NULL,
        n_lines_added INTEGER NOT NULL DEFAULT 0,
        n_lines_deleted INTEGER NOT NULL DEFAULT 0,
        n_lines_changed INTEGER NOT NULL DEFAULT 0,
        n_lines_of_code INTEGER NOT NULL DEFAULT 0,
        n_methods INTEGER NOT NULL DEFAULT 0,
        n_methods_changed INTEGER NOT NULL DEFAULT 0,
        is_on_exclude_list INTEGER NOT NULL DEFAULT 0,
        is_superfluous INTEGER NOT NULL DEFAULT 0
    );
    CREATE INDEX IF NOT EXISTS ix_committed_files_commit ON committed_files(commit_sha);

    CREATE TABLE IF NOT EXISTS merge_requests (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        repo_id INTEGER NOT NULL REFERENCES repositories(id),
        request_id TEXT NOT NULL,
        title TEXT NOT NULL,
        state TEXT NOT NULL,
        source_sha TEXT,
        source_branch TEXT NOT NULL DEFAULT '',
        target_branch TEXT,
        merge_sha TEXT,
        created_at TEXT,
        merged_at TEXT,
        updated_at TEXT,
        first_comment_at TEXT,
        is_merged INTEGER NOT NULL DEFAULT 0,
        merged_by_username TEXT,
        has_tests INTEGER,
        has_test_passed INTEGER
    );
    CREATE UNIQUE INDEX IF NOT EXISTS ux_merge_requests_repo_request
        ON merge_requests(repo_id, request_id);

    CREATE TABLE IF NOT EXISTS repo_to_commits (
        repo_id INTEGER NOT NULL REFERENCES repositories(id),
        commit_sha TEXT NOT NULL REFERENCES commits(sha),
        PRIMARY KEY (repo_id, commit_sha)
    );
    CREATE INDEX IF NOT EXISTS ix_repo_to_commits_sha ON repo_to_commits(commit_sha);
";

/// Open the database at `path`, creating the schema on first use.
pub fn open_or_create(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed creating database directory {}", parent.display()))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open SQLite database at {}", path.display()))?;
    initialize(&conn)?;
    Ok(conn)
}

/// Open an existing database for reading only.
///
/// Nothing is created: a missing file, or one without the current schema
/// version, is an error.
pub fn open_read_only(path: &Path) -> Result<Connection> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI)
        .with_context(|| format!("Failed to open SQLite database at {}", path.display()))?;
    let version: i64 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .with_context(|| format!("{} is not a git-indexer database", path.display()))?;
    if version != SCHEMA_VERSION {
        bail!("Unsupported git-indexer schema version {version}; expected {}", SCHEMA_VERSION);
    }
    Ok(conn)
}

/// Fresh in-memory database with the schema applied.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    initialize(&conn)?;
    Ok(conn)
}

fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(SCHEMA)?;

    let current: Option<i64> =
        conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0)).ok();
    match current {
        None => {
            conn.execute("INSERT INTO schema_version(version) VALUES(?1)", [SCHEMA_VERSION])?;
        }
        Some(version) if version == SCHEMA_VERSION => {}
        Some(version) => {
            bail!("Unsupported git-indexer schema version {version}; expected {}", SCHEMA_VERSION);
        }
    }
    Ok(())
}
