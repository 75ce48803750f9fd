mod common;

use common::TestRepo;
use git_autoupdate::git::{self, GitError};
use git_autoupdate::inspector::{GitInspector, Inspector};
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_repo_creation() -> anyhow::Result<()> {
    let repo = TestRepo::new()?;

    assert!(git::git_dir(repo.path()).is_ok());
    assert_eq!(git::current_branch(repo.path())?, Some("master".to_string()));
    let revision = git::current_revision(repo.path())?;
    assert_eq!(revision.len(), 40);
    assert!(revision.chars().all(|c| c.is_ascii_hexdigit()));
    Ok(())
}

#[test]
fn test_remote_url_matches_origin() -> anyhow::Result<()> {
    let repo = TestRepo::with_remote()?;
    let remote = repo.remote_path().expect("remote configured");

    assert_eq!(git::remote_url(repo.path())?, remote.to_string_lossy());
    Ok(())
}

#[test]
fn test_remote_url_missing_without_origin() -> anyhow::Result<()> {
    let repo = TestRepo::new()?;

    assert!(git::remote_url(repo.path()).is_err());
    assert_eq!(GitInspector::new(repo.path()).remote_url(), None);
    Ok(())
}

#[test]
fn test_commits_behind_counts_fetched_upstream_commits() -> anyhow::Result<()> {
    let repo = TestRepo::with_remote()?;
    assert_eq!(git::commits_behind(repo.path(), "master")?, 0);

    repo.push_upstream_commits(3)?;
    // Not visible until fetched
    assert_eq!(git::commits_behind(repo.path(), "master")?, 0);

    git::fetch(repo.path())?;
    assert_eq!(git::commits_behind(repo.path(), "master")?, 3);
    Ok(())
}

#[test]
fn test_fetch_does_not_move_local_branch() -> anyhow::Result<()> {
    let repo = TestRepo::with_remote()?;
    let before = repo.head()?;
    repo.push_upstream_commits(1)?;

    git::fetch(repo.path())?;

    assert_eq!(repo.head()?, before);
    Ok(())
}

#[test]
fn test_pull_fast_forwards_to_upstream() -> anyhow::Result<()> {
    let repo = TestRepo::with_remote()?;
    let upstream = repo.push_upstream_commits(2)?;

    git::pull(repo.path())?;

    assert_eq!(repo.head()?, upstream);
    assert!(repo.file_exists("upstream-1.txt"));
    Ok(())
}

#[test]
fn test_fetch_fails_with_broken_remote() -> anyhow::Result<()> {
    let repo = TestRepo::with_remote()?;
    repo.break_remote()?;

    let err = git::fetch(repo.path()).unwrap_err();

    assert!(matches!(err, GitError::Failed { .. }));
    assert!(err.to_string().contains("fetch"));
    assert!(!GitInspector::new(repo.path()).fetch_remote());
    Ok(())
}

#[test]
fn test_commits_behind_unknown_branch_fails() -> anyhow::Result<()> {
    let repo = TestRepo::with_remote()?;

    assert!(git::commits_behind(repo.path(), "does-not-exist").is_err());
    assert_eq!(
        GitInspector::new(repo.path()).commits_behind("does-not-exist"),
        None
    );
    Ok(())
}

#[test]
fn test_detached_head_has_no_current_branch() -> anyhow::Result<()> {
    let repo = TestRepo::new()?;
    let head = repo.head()?;
    git::run_git(repo.path(), &["checkout", "--detach", &head])?;

    assert_eq!(git::current_branch(repo.path())?, None);
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_timeout_kills_slow_command() -> anyhow::Result<()> {
    let repo = TestRepo::new()?;

    let err = git::run_git_with_timeout(
        repo.path(),
        &["-c", "alias.pause=!sleep 5", "pause"],
        Duration::from_millis(100),
    )
    .unwrap_err();

    assert!(err.is_timeout());
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_timeout_bounds_pipes_held_by_background_child() -> anyhow::Result<()> {
    let repo = TestRepo::new()?;
    let started = std::time::Instant::now();

    let result = git::run_git_with_timeout(
        repo.path(),
        &["-c", "alias.bg=!sleep 4 &", "bg"],
        Duration::from_millis(500),
    );

    assert!(result.is_ok(), "unexpected error: {:?}", result.err());
    assert!(started.elapsed() < Duration::from_secs(2));
    Ok(())
}

#[test]
fn test_inspector_state_snapshot() -> anyhow::Result<()> {
    let repo = TestRepo::with_remote()?;
    let inspector = GitInspector::new(repo.path());

    let state = inspector.state().expect("state available");

    assert_eq!(state.current_revision, repo.head()?);
    assert_eq!(state.tracking_branch, "master");
    assert_eq!(state.commits_behind, Some(0));
    assert!(state.remote_url.is_some());
    Ok(())
}

#[test]
fn test_inspector_rejects_plain_directory() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let inspector = GitInspector::new(dir.path());

    assert!(!inspector.is_repository());
    assert!(inspector.current_revision().is_none());
    Ok(())
}
