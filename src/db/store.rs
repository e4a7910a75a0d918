//! Lookup-or-create access to the commit index.
//!
//! Every write that must land atomically (a commit with its files, its
//! repository link and the cursor bump) goes through one transaction.

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Result};
use std::collections::HashSet;
use std::path::Path;

use super::models::{
    Author, Commit, CommittedFile, MergeRequest, NewCommit, NewMergeRequest, Repository,
};
use super::schema;
use crate::utils::urls::repo_name;

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        Ok(Self { conn: schema::open_or_create(path)? })
    }

    /// Open an existing index without creating or migrating anything.
    pub fn open_read_only(path: &Path) -> anyhow::Result<Self> {
        Ok(Self { conn: schema::open_read_only(path)? })
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        Ok(Self { conn: schema::open_in_memory()? })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    // ── repositories ────────────────────────────────────────────────────────

    /// Find the repository for `(clone_url, repo_type)`, creating it if absent.
    pub fn ensure_repository(&self, clone_url: &str, repo_type: &str) -> Result<Repository> {
        if let Some(repo) = self.find_repository(clone_url, repo_type)? {
            return Ok(repo);
        }
        self.conn.execute(
            "INSERT INTO repositories(clone_url, repo_type, repo_name, is_active) VALUES(?1, ?2, ?3, 1)",
            params![clone_url, repo_type, repo_name(clone_url)],
        )?;
        self.repository(self.conn.last_insert_rowid())
    }

    pub fn find_repository(&self, clone_url: &str, repo_type: &str) -> Result<Option<Repository>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM repositories WHERE clone_url = ?1 AND repo_type = ?2",
                    Repository::COLUMNS
                ),
                params![clone_url, repo_type],
                Repository::from_row,
            )
            .optional()
    }

    pub fn repository(&self, id: i64) -> Result<Repository> {
        self.conn.query_row(
            &format!("SELECT {} FROM repositories WHERE id = ?1", Repository::COLUMNS),
            [id],
            Repository::from_row,
        )
    }

    pub fn set_repository_active(&self, repo_id: i64, active: bool) -> Result<()> {
        self.conn
            .execute("UPDATE repositories SET is_active = ?2 WHERE id = ?1", params![repo_id, active])?;
        Ok(())
    }

    /// Stamp the end of an indexing run.
    pub fn mark_indexed(&self, repo_id: i64, at: NaiveDateTime) -> Result<()> {
        self.conn.execute(
            "UPDATE repositories SET last_indexed_at = ?2 WHERE id = ?1",
            params![repo_id, at],
        )?;
        Ok(())
    }

    /// Hashes of every commit already linked to the repository.
    pub fn repo_commit_hashes(&self, repo_id: i64) -> Result<HashSet<String>> {
        let mut stmt = self.conn.prepare("SELECT commit_sha FROM repo_to_commits WHERE repo_id = ?1")?;
        let rows = stmt.query_map([repo_id], |row| row.get::<_, String>(0))?;
        rows.collect()
    }

    // ── commits ─────────────────────────────────────────────────────────────

    pub fn commit_exists(&self, sha: &str) -> Result<bool> {
        commit_exists(&self.conn, sha)
    }

    pub fn find_commit(&self, sha: &str) -> Result<Option<Commit>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM commits WHERE sha = ?1", Commit::COLUMNS),
                [sha],
                Commit::from_row,
            )
            .optional()
    }

    pub fn committed_files(&self, sha: &str) -> Result<Vec<CommittedFile>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM committed_files WHERE commit_sha = ?1 ORDER BY id",
            CommittedFile::COLUMNS
        ))?;
        let rows = stmt.query_map([sha], CommittedFile::from_row)?;
        rows.collect()
    }

    pub fn find_author_by_email(&self, email: &str) -> Result<Option<Author>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM authors WHERE email = ?1", Author::COLUMNS),
                [email],
                Author::from_row,
            )
            .optional()
    }

    /// Link `sha` to the repository and advance its cursor, in one transaction.
    ///
    /// `new_commit` is written first when given and no row for the hash
    /// exists yet; an existing row (e.g. from a fork) is only linked.
    pub fn record_commit(
        &mut self,
        repo_id: i64,
        sha: &str,
        created_at: NaiveDateTime,
        new_commit: Option<&NewCommit>,
    ) -> Result<()> {
        let tx = self.conn.transaction()?;

        if let Some(new) = new_commit {
            if !commit_exists(&tx, sha)? {
                let author_id = find_or_create_author(&tx, &new.author_name, &new.author_email)?;
                insert_commit(&tx, &new.commit, author_id)?;
                for file in &new.files {
                    insert_committed_file(&tx, file)?;
                }
            }
        }

        tx.execute(
            "INSERT OR IGNORE INTO repo_to_commits(repo_id, commit_sha) VALUES(?1, ?2)",
            params![repo_id, sha],
        )?;
        tx.execute(
            "UPDATE repositories SET last_commit_at = ?2 \
             WHERE id = ?1 AND (last_commit_at IS NULL OR last_commit_at < ?2)",
            params![repo_id, created_at],
        )?;

        tx.commit()
    }

    pub fn count_commits(&self) -> Result<i64> {
        self.conn.query_row("SELECT COUNT(*) FROM commits", [], |row| row.get(0))
    }

    pub fn count_repo_links(&self) -> Result<i64> {
        self.conn.query_row("SELECT COUNT(*) FROM repo_to_commits", [], |row| row.get(0))
    }

    // ── merge requests ──────────────────────────────────────────────────────

    pub fn merge_request_exists(&self, repo_id: i64, request_id: &str) -> Result<bool> {
        self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM merge_requests WHERE repo_id = ?1 AND request_id = ?2)",
            params![repo_id, request_id],
            |row| row.get(0),
        )
    }

    pub fn insert_merge_request(&self, repo_id: i64, request: &NewMergeRequest) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO merge_requests(repo_id, request_id, title, state, source_sha, source_branch, \
             target_branch, merge_sha, created_at, merged_at, updated_at, is_merged, merged_by_username) \
             VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                repo_id,
                request.request_id,
                request.title,
                request.state,
                request.source_sha,
                request.source_branch,
                request.target_branch,
                request.merge_sha,
                request.created_at,
                request.merged_at,
                request.updated_at,
                request.is_merged,
                request.merged_by_username,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn find_merge_request(&self, repo_id: i64, request_id: &str) -> Result<Option<MergeRequest>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM merge_requests WHERE repo_id = ?1 AND request_id = ?2",
                    MergeRequest::COLUMNS
                ),
                params![repo_id, request_id],
                MergeRequest::from_row,
            )
            .optional()
    }

    pub fn count_merge_requests(&self, repo_id: i64) -> Result<i64> {
        self.conn.query_row(
            "SELECT COUNT(*) FROM merge_requests WHERE repo_id = ?1",
            [repo_id],
            |row| row.get(0),
        )
    }

    // ── search ──────────────────────────────────────────────────────────────

    pub fn search_commits_by_sha(&self, fragment: &str, limit: usize) -> Result<Vec<Commit>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM commits WHERE sha LIKE '%' || ?1 || '%' ORDER BY created_at DESC LIMIT ?2",
            Commit::COLUMNS
        ))?;
        let rows = stmt.query_map(params![fragment, limit as i64], Commit::from_row)?;
        rows.collect()
    }

    pub fn search_authors_by_email(&self, fragment: &str, limit: usize) -> Result<Vec<Author>> {
        // canonical authors first
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM authors WHERE email LIKE '%' || ?1 || '%' \
             ORDER BY parent_id IS NOT NULL, email LIMIT ?2",
            Author::COLUMNS
        ))?;
        let rows = stmt.query_map(params![fragment, limit as i64], Author::from_row)?;
        rows.collect()
    }

    pub fn commits_by_author(&self, author_id: i64, limit: usize) -> Result<Vec<Commit>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM commits WHERE author_id = ?1 ORDER BY created_at DESC LIMIT ?2",
            Commit::COLUMNS
        ))?;
        let rows = stmt.query_map(params![author_id, limit as i64], Commit::from_row)?;
        rows.collect()
    }

    pub fn search_repositories(&self, fragment: &str, limit: usize) -> Result<Vec<Repository>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM repositories WHERE clone_url LIKE '%' || ?1 || '%' ORDER BY clone_url LIMIT ?2",
            Repository::COLUMNS
        ))?;
        let rows = stmt.query_map(params![fragment, limit as i64], Repository::from_row)?;
        rows.collect()
    }

    pub fn commits_in_repository(&self, repo_id: i64, limit: usize) -> Result<Vec<Commit>> {
        let columns = Commit::COLUMNS
            .split(", ")
            .map(|c| format!("c.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {columns} FROM commits c JOIN repo_to_commits rc ON rc.commit_sha = c.sha \
             WHERE rc.repo_id = ?1 ORDER BY c.created_at DESC LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![repo_id, limit as i64], Commit::from_row)?;
        rows.collect()
    }

    pub fn repositories_of_commit(&self, sha: &str) -> Result<Vec<Repository>> {
        let columns = Repository::COLUMNS
            .split(", ")
            .map(|c| format!("r.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {columns} FROM repositories r JOIN repo_to_commits rc ON rc.repo_id = r.id \
             WHERE rc.commit_sha = ?1 ORDER BY r.id"
        ))?;
        let rows = stmt.query_map([sha], Repository::from_row)?;
        rows.collect()
    }
}

fn commit_exists(conn: &Connection, sha: &str) -> Result<bool> {
    conn.query_row("SELECT EXISTS(SELECT 1 FROM commits WHERE sha = ?1)", [sha], |row| row.get(0))
}

fn find_or_create_author(conn: &Connection, name: &str, email: &str) -> Result<i64> {
    let existing: Option<i64> = conn
        .query_row("SELECT id FROM authors WHERE email = ?1", [email], |row| row.get(0))
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }
    conn.execute("INSERT INTO authors(name, email) VALUES(?1, ?2)", params![name, email])?;
    Ok(conn.last_insert_rowid())
}

fn insert_commit(conn: &Connection, commit: &Commit, author_id: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO commits(sha, message, created_at, created_at_tz, is_merge, n_lines, n_files, \
         n_insertions, n_deletions, n_lines_changed, n_lines_ignored, n_files_changed, \
         n_files_ignored, author_id) \
         VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            commit.sha,
            commit.message,
            commit.created_at,
            commit.created_at_tz,
            commit.is_merge,
            commit.n_lines,
            commit.n_files,
            commit.n_insertions,
            commit.n_deletions,
            commit.n_lines_changed,
            commit.n_lines_ignored,
            commit.n_files_changed,
            commit.n_files_ignored,
            author_id,
        ],
    )?;
    Ok(())
}

fn insert_committed_file(conn: &Connection, file: &CommittedFile) -> Result<()> {
    conn.execute(
        "INSERT INTO committed_files(commit_sha, change_type, file_path, file_name, file_type, \
         n_lines_added, n_lines_deleted, n_lines_changed, n_lines_of_code, n_methods, \
         n_methods_changed, is_on_exclude_list, is_superfluous) \
         VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            file.commit_sha,
            file.change_type,
            file.file_path,
            file.file_name,
            file.file_type,
            file.n_lines_added,
            file.n_lines_deleted,
            file.n_lines_changed,
            file.n_lines_of_code,
            file.n_methods,
            file.n_methods_changed,
            file.is_on_exclude_list,
            file.is_superfluous,
        ],
    )?;
    Ok(())
}
