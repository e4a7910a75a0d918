//! Integration tests for commit and merge request indexing

use git2::{Repository, Signature, Time};
use git_indexer::db::Store;
use git_indexer::index::{index_commits, index_merge_requests};
use git_indexer::platform::{
    ApiMergeRequest, ApiPullRequest, Platform, PlatformError, PlatformRequest, RequestSource,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(600);
const BASE_TIME: i64 = 1_688_716_746;

fn commit_file(repo: &Repository, name: &str, content: &str, message: &str, offset_secs: i64) {
    let workdir = repo.workdir().expect("workdir");
    fs::write(workdir.join(name), content).expect("write");
    let mut index = repo.index().expect("index");
    index.add_path(Path::new(name)).expect("add");
    index.write().expect("write index");
    let tree = repo.find_tree(index.write_tree().expect("tree")).expect("find tree");

    let sig = Signature::new("Dev One", "Dev.One@Example.com", &Time::new(BASE_TIME + offset_secs, 480))
        .expect("sig");
    let parents = match repo.head() {
        Ok(head) => vec![head.peel_to_commit().expect("head commit")],
        Err(_) => Vec::new(),
    };
    let parent_refs: Vec<_> = parents.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs).expect("commit");
}

/// Two commits touching a source file and a lock file.
fn upstream(tmp: &Path) -> PathBuf {
    let path = tmp.join("upstream");
    let repo = Repository::init(&path).expect("init");
    commit_file(&repo, "main.py", "def hello():\n    return 1\n", "first", 0);
    commit_file(&repo, "poetry.lock", "a = 1\nb = 2\n", "add lock", 60);
    path
}

fn fork_of(source: &Path, tmp: &Path) -> PathBuf {
    let path = tmp.join("fork");
    let repo = Repository::clone(&source.to_string_lossy(), &path).expect("clone");
    commit_file(&repo, "fork.py", "def forked():\n    pass\n", "fork only", 120);
    path
}

fn url(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

#[test]
fn test_reindexing_is_idempotent() {
    let tmp = TempDir::new().expect("tmp");
    let source = upstream(tmp.path());
    let mut store = Store::open_in_memory().expect("store");

    let (repo, n) = index_commits(&mut store, &url(&source), &source, "local", false, TIMEOUT);
    let repo = repo.expect("indexed");
    assert_eq!(n, 2);
    assert!(repo.last_indexed_at.is_some());
    assert_eq!(store.count_commits().expect("count"), 2);

    let (_, n) = index_commits(&mut store, &url(&source), &source, "local", false, TIMEOUT);
    assert_eq!(n, 0);
    let (_, n) = index_commits(&mut store, &url(&source), &source, "local", true, TIMEOUT);
    assert_eq!(n, 0);
    assert_eq!(store.count_commits().expect("count"), 2);
    assert_eq!(store.count_repo_links().expect("links"), 2);
}

#[test]
fn test_commit_rows_carry_stats_and_author() {
    let tmp = TempDir::new().expect("tmp");
    let source = upstream(tmp.path());
    let mut store = Store::open_in_memory().expect("store");
    index_commits(&mut store, &url(&source), &source, "local", false, TIMEOUT);

    let git = Repository::open(&source).expect("open");
    let head = git.head().expect("head").peel_to_commit().expect("commit");
    let sha = head.id().to_string();
    let commit = store.find_commit(&sha).expect("query").expect("stored");
    assert_eq!(commit.message, "add lock");
    assert_eq!((commit.n_files_ignored, commit.n_lines_ignored), (1, 2));
    assert_eq!(commit.n_files_changed, 0);
    assert_eq!(commit.created_at_tz.offset().local_minus_utc(), 8 * 3600);

    let files = store.committed_files(&sha).expect("files");
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].change_type, "ADD");
    assert!(files[0].is_on_exclude_list);

    let author = store.find_author_by_email("dev.one@example.com").expect("query").expect("author");
    assert_eq!(author.name, "Dev One");
    assert_eq!(commit.author_id, author.id);
}

#[test]
fn test_fork_links_shared_commits_without_duplicates() {
    let tmp = TempDir::new().expect("tmp");
    let source = upstream(tmp.path());
    let fork = fork_of(&source, tmp.path());
    let mut store = Store::open_in_memory().expect("store");

    let (_, n) = index_commits(&mut store, &url(&source), &source, "local", false, TIMEOUT);
    assert_eq!(n, 2);
    let (fork_repo, n) = index_commits(&mut store, &url(&fork), &fork, "local", false, TIMEOUT);
    assert_eq!(n, 3);

    assert_eq!(store.count_commits().expect("count"), 3);
    assert_eq!(store.count_repo_links().expect("links"), 5);
    assert_eq!(store.repo_commit_hashes(fork_repo.expect("fork").id).expect("hashes").len(), 3);
}

#[test]
fn test_cursor_picks_up_new_commits_only() {
    let tmp = TempDir::new().expect("tmp");
    let source = upstream(tmp.path());
    let mut store = Store::open_in_memory().expect("store");

    let (repo, _) = index_commits(&mut store, &url(&source), &source, "local", false, TIMEOUT);
    let first_cursor = repo.expect("indexed").last_commit_at.expect("cursor");

    let git = Repository::open(&source).expect("open");
    commit_file(&git, "main.py", "def hello():\n    return 2\n", "change hello", 600);

    let (repo, n) = index_commits(&mut store, &url(&source), &source, "local", false, TIMEOUT);
    assert_eq!(n, 1);
    let cursor = repo.expect("indexed").last_commit_at.expect("cursor");
    assert_eq!((cursor - first_cursor).num_seconds(), 540);
}

#[test]
fn test_expired_timeout_stops_walk_but_stamps_repository() {
    let tmp = TempDir::new().expect("tmp");
    let source = upstream(tmp.path());
    let mut store = Store::open_in_memory().expect("store");

    let (repo, n) = index_commits(&mut store, &url(&source), &source, "local", false, Duration::ZERO);
    let repo = repo.expect("repository row");
    assert_eq!(n, 0);
    assert!(repo.last_indexed_at.is_some());
    assert!(repo.last_commit_at.is_none());
    assert_eq!(store.count_commits().expect("count"), 0);

    // the next run with a real budget picks everything up
    let (_, n) = index_commits(&mut store, &url(&source), &source, "local", false, TIMEOUT);
    assert_eq!(n, 2);
}

#[test]
fn test_detached_head_commits_are_indexed() {
    let tmp = TempDir::new().expect("tmp");
    let source = upstream(tmp.path());
    let git = Repository::open(&source).expect("open");
    let head = git.head().expect("head").target().expect("target");
    git.set_head_detached(head).expect("detach");
    commit_file(&git, "main.py", "def hello():\n    return 3\n", "detached work", 300);

    let mut store = Store::open_in_memory().expect("store");
    let (_, n) = index_commits(&mut store, &url(&source), &source, "local", false, TIMEOUT);
    assert_eq!(n, 3);
}

#[test]
fn test_empty_repository_indexes_nothing() {
    let tmp = TempDir::new().expect("tmp");
    let path = tmp.path().join("empty");
    Repository::init(&path).expect("init");
    let mut store = Store::open_in_memory().expect("store");

    let (repo, n) = index_commits(&mut store, &url(&path), &path, "local", false, TIMEOUT);
    let repo = repo.expect("repository row");
    assert_eq!(n, 0);
    assert!(repo.last_commit_at.is_none());
    assert!(repo.last_indexed_at.is_some());
}

#[test]
fn test_inactive_repository_is_skipped() {
    let tmp = TempDir::new().expect("tmp");
    let source = upstream(tmp.path());
    let mut store = Store::open_in_memory().expect("store");
    let repo = store.ensure_repository(&url(&source), "local").expect("repo");
    store.set_repository_active(repo.id, false).expect("deactivate");

    let (repo, n) = index_commits(&mut store, &url(&source), &source, "local", false, TIMEOUT);
    assert!(!repo.expect("repository row").is_active);
    assert_eq!(n, 0);
    assert_eq!(store.count_commits().expect("count"), 0);
}

#[test]
fn test_missing_repository_path_fails() {
    let tmp = TempDir::new().expect("tmp");
    let missing = tmp.path().join("nope");
    let mut store = Store::open_in_memory().expect("store");

    let (repo, n) = index_commits(&mut store, &url(&missing), &missing, "local", false, TIMEOUT);
    assert!(repo.is_none());
    assert_eq!(n, 0);
}

struct FakeSource {
    platform: Platform,
    clone_url: String,
    requests: Vec<PlatformRequest>,
    fail_after_listing: bool,
}

impl RequestSource for FakeSource {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn clone_url(&self) -> &str {
        &self.clone_url
    }

    fn closed_requests(&self) -> Result<Vec<PlatformRequest>, PlatformError> {
        Ok(self.requests.clone())
    }

    fn resolve(&self, request: PlatformRequest) -> Result<PlatformRequest, PlatformError> {
        if self.fail_after_listing && request.request_id() == "3" {
            return Err(PlatformError::Api { status: 502, message: "bad gateway".to_string() });
        }
        Ok(request)
    }
}

fn pull(number: u64, merged: bool) -> PlatformRequest {
    let json = serde_json::json!({
        "number": number,
        "title": format!("PR {number}"),
        "state": "closed",
        "head": { "ref": "feature", "sha": "aaaaaaa" },
        "base": { "ref": "main", "sha": "bbbbbbb" },
        "merge_commit_sha": "ccccccc",
        "created_at": "2023-07-01T10:00:00Z",
        "updated_at": "2023-07-02T10:00:00Z",
        "merged_at": if merged { serde_json::Value::from("2023-07-02T10:00:00Z") } else { serde_json::Value::Null },
        "merged_by": { "login": "octocat" },
    });
    PlatformRequest::GitHub(serde_json::from_value::<ApiPullRequest>(json).expect("pull"))
}

fn merge_request(iid: u64) -> PlatformRequest {
    let json = serde_json::json!({
        "iid": iid,
        "title": "MR",
        "state": "merged",
        "source_branch": "feature",
        "target_branch": "main",
        "sha": "1111111",
        "merge_commit_sha": "2222222",
        "squash_commit_sha": "3333333",
        "squash": true,
        "merged_at": "2023-07-02T10:00:00.000Z",
        "merge_user": { "username": "mini" },
    });
    PlatformRequest::GitLab(serde_json::from_value::<ApiMergeRequest>(json).expect("merge request"))
}

#[test]
fn test_requests_are_stored_once() {
    let store = Store::open_in_memory().expect("store");
    let source = FakeSource {
        platform: Platform::GitHub,
        clone_url: "https://github.com/sloppycoder/hello.git".to_string(),
        requests: vec![pull(1, true), pull(2, false)],
        fail_after_listing: false,
    };

    assert_eq!(index_merge_requests(&store, &source), 2);
    assert_eq!(index_merge_requests(&store, &source), 0);

    let repo = store
        .find_repository(&source.clone_url, "github")
        .expect("query")
        .expect("repository row");
    assert_eq!(store.count_merge_requests(repo.id).expect("count"), 2);

    let merged = store.find_merge_request(repo.id, "1").expect("query").expect("stored");
    assert!(merged.request.is_merged);
    assert_eq!(merged.request.merged_by_username.as_deref(), Some("octocat"));
    let closed = store.find_merge_request(repo.id, "2").expect("query").expect("stored");
    assert!(!closed.request.is_merged);
    assert!(closed.request.merged_by_username.is_none());
}

#[test]
fn test_same_request_id_in_other_repository_is_stored() {
    let store = Store::open_in_memory().expect("store");
    let first = FakeSource {
        platform: Platform::GitLab,
        clone_url: "https://gitlab.com/vino9/one.git".to_string(),
        requests: vec![merge_request(1)],
        fail_after_listing: false,
    };
    let second = FakeSource {
        platform: Platform::GitLab,
        clone_url: "https://gitlab.com/vino9/two.git".to_string(),
        requests: vec![merge_request(1)],
        fail_after_listing: false,
    };

    assert_eq!(index_merge_requests(&store, &first), 1);
    assert_eq!(index_merge_requests(&store, &second), 1);

    let repo = store.find_repository(&first.clone_url, "gitlab").expect("query").expect("repo");
    let stored = store.find_merge_request(repo.id, "1").expect("query").expect("stored");
    assert_eq!(stored.request.merge_sha.as_deref(), Some("3333333"));
    assert_eq!(stored.request.merged_by_username.as_deref(), Some("mini"));
}

#[test]
fn test_failure_keeps_requests_stored_before_it() {
    let store = Store::open_in_memory().expect("store");
    let source = FakeSource {
        platform: Platform::GitHub,
        clone_url: "https://github.com/sloppycoder/flaky.git".to_string(),
        requests: vec![pull(1, true), pull(2, true), pull(3, true), pull(4, true)],
        fail_after_listing: true,
    };

    assert_eq!(index_merge_requests(&store, &source), 2);
    let repo = store.find_repository(&source.clone_url, "github").expect("query").expect("repo");
    assert_eq!(store.count_merge_requests(repo.id).expect("count"), 2);
}
