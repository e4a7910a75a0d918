use chrono::{DateTime, FixedOffset, NaiveDateTime};
use git2::{Delta, Diff, DiffFindOptions, DiffOptions, ErrorCode, Oid, Patch, Repository, Sort};
use std::ops::Range;
use std::path::Path;

use super::methods::{count_changed, definition_ranges};
use crate::utils::time::{git_time_to_datetime, to_naive_utc};

/// A commit reached by the walk, before any diff work.
#[derive(Debug, Clone)]
pub struct CommitEntry {
    pub oid: Oid,
    pub hash: String,
    pub committed_at: DateTime<FixedOffset>,
}

/// How a file changed relative to the first parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Add,
    Delete,
    Modify,
    Rename,
    Copy,
    Unknown,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Delete => "DELETE",
            Self::Modify => "MODIFY",
            Self::Rename => "RENAME",
            Self::Copy => "COPY",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl From<Delta> for ChangeKind {
    fn from(delta: Delta) -> Self {
        match delta {
            Delta::Added => Self::Add,
            Delta::Deleted => Self::Delete,
            Delta::Modified => Self::Modify,
            Delta::Renamed => Self::Rename,
            Delta::Copied => Self::Copy,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileModification {
    pub change_kind: ChangeKind,
    pub old_path: Option<String>,
    pub new_path: Option<String>,
    pub filename: String,
    pub added_lines: usize,
    pub deleted_lines: usize,
    /// Non-blank lines of the new content; 0 when deleted or binary.
    pub nloc: usize,
    pub methods: usize,
    pub methods_changed: usize,
}

impl FileModification {
    /// New path, or the old one for deletions.
    pub fn path(&self) -> &str {
        self.new_path.as_deref().or(self.old_path.as_deref()).unwrap_or_default()
    }
}

/// Diff totals against the first parent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitStats {
    pub files: usize,
    pub insertions: usize,
    pub deletions: usize,
}

impl CommitStats {
    pub fn lines(&self) -> usize {
        self.insertions + self.deletions
    }
}

/// Everything the index stores about one commit.
#[derive(Debug, Clone)]
pub struct MinedCommit {
    pub hash: String,
    pub message: String,
    pub committer_name: String,
    pub committer_email: String,
    pub committed_at: DateTime<FixedOffset>,
    pub is_merge: bool,
    pub stats: CommitStats,
    /// Empty for merge commits.
    pub modifications: Vec<FileModification>,
}

/// Reads commit history out of a (usually bare) repository.
pub struct HistoryWalker {
    repo: Repository,
}

impl HistoryWalker {
    pub fn open(path: &Path) -> Result<Self, git2::Error> {
        let repo = Repository::open(path)?;
        tracing::debug!("Opened repository at {}", path.display());
        Ok(Self { repo })
    }

    /// Commits reachable from any ref or HEAD, oldest first, committed at or after `since`.
    pub fn commits_since(
        &self,
        since: Option<NaiveDateTime>,
    ) -> Result<impl Iterator<Item = Result<CommitEntry, git2::Error>> + '_, git2::Error> {
        let mut revwalk = self.repo.revwalk()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME | Sort::REVERSE)?;
        // "refs/*": branches, tags and remote-tracking refs
        revwalk.push_glob("*")?;
        // a detached HEAD can hold commits no ref reaches
        match revwalk.push_head() {
            Ok(()) => {}
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {}
            Err(e) => return Err(e),
        }

        let iter = revwalk.filter_map(move |oid| {
            let entry = oid.and_then(|oid| self.entry(oid));
            match entry {
                Ok(entry) => match since {
                    Some(cursor) if to_naive_utc(&entry.committed_at) < cursor => None,
                    _ => Some(Ok(entry)),
                },
                Err(e) => Some(Err(e)),
            }
        });
        Ok(iter)
    }

    fn entry(&self, oid: Oid) -> Result<CommitEntry, git2::Error> {
        let commit = self.repo.find_commit(oid)?;
        let when = commit.committer().when();
        let committed_at = git_time_to_datetime(when.seconds(), when.offset_minutes())
            .ok_or_else(|| git2::Error::from_str("commit time out of range"))?;
        Ok(CommitEntry { oid, hash: oid.to_string(), committed_at })
    }

    /// Full diff statistics and per-file modifications for one commit.
    pub fn mine(&self, entry: &CommitEntry) -> Result<MinedCommit, git2::Error> {
        let commit = self.repo.find_commit(entry.oid)?;
        let committer = commit.committer();
        let is_merge = commit.parent_count() > 1;

        let tree = commit.tree()?;
        let parent_tree = if commit.parent_count() > 0 { Some(commit.parent(0)?.tree()?) } else { None };

        let mut opts = DiffOptions::new();
        opts.context_lines(0);
        let mut diff = self.repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut opts))?;
        diff.find_similar(Some(DiffFindOptions::new().renames(true)))?;

        let git_stats = diff.stats()?;
        let stats = CommitStats {
            files: git_stats.files_changed(),
            insertions: git_stats.insertions(),
            deletions: git_stats.deletions(),
        };

        let modifications = if is_merge { Vec::new() } else { self.modifications(&diff)? };

        Ok(MinedCommit {
            hash: entry.hash.clone(),
            message: String::from_utf8_lossy(commit.message_bytes()).into_owned(),
            committer_name: String::from_utf8_lossy(committer.name_bytes()).into_owned(),
            committer_email: String::from_utf8_lossy(committer.email_bytes()).into_owned(),
            committed_at: entry.committed_at,
            is_merge,
            stats,
            modifications,
        })
    }

    fn modifications(&self, diff: &Diff<'_>) -> Result<Vec<FileModification>, git2::Error> {
        let mut mods = Vec::with_capacity(diff.deltas().len());

        for (idx, delta) in diff.deltas().enumerate() {
            let change_kind = ChangeKind::from(delta.status());
            let old_path = delta.old_file().path().map(|p| p.to_string_lossy().into_owned());
            let new_path = match change_kind {
                ChangeKind::Delete => None,
                _ => delta.new_file().path().map(|p| p.to_string_lossy().into_owned()),
            };
            let old_path = match change_kind {
                ChangeKind::Add => None,
                _ => old_path,
            };

            let (added_lines, deleted_lines, changed) = match Patch::from_diff(diff, idx)? {
                Some(patch) => {
                    let (_, added, deleted) = patch.line_stats()?;
                    (added, deleted, hunk_ranges(&patch)?)
                }
                None => (0, 0, Vec::new()),
            };

            let source = match change_kind {
                ChangeKind::Delete => None,
                _ => self.text_blob(delta.new_file().id())?,
            };
            let path = new_path.as_deref().or(old_path.as_deref()).unwrap_or_default().to_string();
            let (nloc, methods, methods_changed) = match source {
                Some(text) => {
                    let defs = definition_ranges(&path, &text);
                    let nloc = text.lines().filter(|l| !l.trim().is_empty()).count();
                    (nloc, defs.len(), count_changed(&defs, &changed))
                }
                None => (0, 0, 0),
            };

            let filename = Path::new(&path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.clone());

            mods.push(FileModification {
                change_kind,
                old_path,
                new_path,
                filename,
                added_lines,
                deleted_lines,
                nloc,
                methods,
                methods_changed,
            });
        }

        Ok(mods)
    }

    /// Blob content as text, or `None` for missing or binary blobs.
    fn text_blob(&self, oid: Oid) -> Result<Option<String>, git2::Error> {
        if oid.is_zero() {
            return Ok(None);
        }
        let blob = match self.repo.find_blob(oid) {
            Ok(blob) => blob,
            // submodule commits and the like
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        if blob.is_binary() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(blob.content()).into_owned()))
    }
}

/// New-side line ranges touched by each hunk; pure deletions touch the line they follow.
fn hunk_ranges(patch: &Patch<'_>) -> Result<Vec<Range<usize>>, git2::Error> {
    let mut ranges = Vec::with_capacity(patch.num_hunks());
    for idx in 0..patch.num_hunks() {
        let (hunk, _) = patch.hunk(idx)?;
        let start = hunk.new_start() as usize;
        let len = hunk.new_lines() as usize;
        ranges.push(start..start + len.max(1));
    }
    Ok(ranges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{Signature, Time};
    use std::fs;
    use tempfile::TempDir;

    fn commit_file(repo: &Repository, name: &str, content: &str, message: &str, at: i64) -> Oid {
        let workdir = repo.workdir().expect("workdir").to_path_buf();
        fs::write(workdir.join(name), content).expect("write");
        let mut index = repo.index().expect("index");
        index.add_path(Path::new(name)).expect("add");
        index.write().expect("write index");
        let tree = repo.find_tree(index.write_tree().expect("tree")).expect("find tree");
        let sig = Signature::new("Dev", "Dev@Example.com", &Time::new(at, 120)).expect("sig");
        let parents: Vec<_> = repo
            .head()
            .ok()
            .and_then(|h| h.target())
            .map(|oid| repo.find_commit(oid).expect("parent"))
            .into_iter()
            .collect();
        let parent_refs: Vec<_> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs).expect("commit")
    }

    #[test]
    fn walks_oldest_first_and_mines_stats() {
        let tmp = TempDir::new().expect("tmp");
        let repo = Repository::init(tmp.path()).expect("init");
        commit_file(&repo, "app.py", "def a():\n    return 1\n", "first", 1_600_000_000);
        commit_file(&repo, "app.py", "def a():\n    return 2\n\ndef b():\n    pass\n", "second", 1_600_000_100);

        let walker = HistoryWalker::open(tmp.path()).expect("open");
        let entries: Vec<_> = walker.commits_since(None).expect("walk").collect::<Result<_, _>>().expect("entries");
        assert_eq!(entries.len(), 2);
        assert!(entries[0].committed_at < entries[1].committed_at);

        let first = walker.mine(&entries[0]).expect("mine");
        assert_eq!(first.message, "first");
        assert_eq!(first.committer_email, "Dev@Example.com");
        assert_eq!(first.stats, CommitStats { files: 1, insertions: 2, deletions: 0 });
        assert_eq!(first.modifications[0].change_kind, ChangeKind::Add);
        assert!(first.modifications[0].old_path.is_none());

        let second = walker.mine(&entries[1]).expect("mine");
        let m = &second.modifications[0];
        assert_eq!(m.change_kind, ChangeKind::Modify);
        assert_eq!((m.added_lines, m.deleted_lines), (4, 1));
        assert_eq!(m.nloc, 4);
        assert_eq!(m.methods, 2);
        assert_eq!(m.filename, "app.py");
        assert_eq!(second.stats.lines(), 5);
    }

    #[test]
    fn cursor_is_inclusive() {
        let tmp = TempDir::new().expect("tmp");
        let repo = Repository::init(tmp.path()).expect("init");
        commit_file(&repo, "a.txt", "a\n", "one", 1_600_000_000);
        commit_file(&repo, "a.txt", "b\n", "two", 1_600_000_100);

        let walker = HistoryWalker::open(tmp.path()).expect("open");
        let all: Vec<_> = walker.commits_since(None).expect("walk").collect::<Result<_, _>>().expect("entries");
        let cursor = to_naive_utc(&all[1].committed_at);
        let since: Vec<_> =
            walker.commits_since(Some(cursor)).expect("walk").collect::<Result<_, _>>().expect("entries");
        assert_eq!(since.len(), 1);
        assert_eq!(since[0].hash, all[1].hash);
    }

    #[test]
    fn walks_commits_only_reachable_from_detached_head() {
        let tmp = TempDir::new().expect("tmp");
        let repo = Repository::init(tmp.path()).expect("init");
        let first = commit_file(&repo, "a.txt", "a\n", "on branch", 1_600_000_000);
        repo.set_head_detached(first).expect("detach");
        let detached = commit_file(&repo, "a.txt", "b\n", "detached", 1_600_000_100);

        let walker = HistoryWalker::open(tmp.path()).expect("open");
        let hashes: Vec<_> = walker
            .commits_since(None)
            .expect("walk")
            .map(|e| e.expect("entry").hash)
            .collect();
        assert_eq!(hashes, vec![first.to_string(), detached.to_string()]);
    }

    #[test]
    fn empty_repository_yields_nothing() {
        let tmp = TempDir::new().expect("tmp");
        Repository::init_bare(tmp.path()).expect("init");
        let walker = HistoryWalker::open(tmp.path()).expect("open");
        assert_eq!(walker.commits_since(None).expect("walk").count(), 0);
    }
}
