//! Test infrastructure for git-autoupdate integration tests.

#![allow(dead_code)]

use anyhow::Result;
use git_autoupdate::git::run_git;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn configure_identity(path: &Path) -> Result<()> {
    run_git(path, &["config", "user.email", "test@example.com"])?;
    run_git(path, &["config", "user.name", "Test User"])?;
    Ok(())
}

/// A temporary git repository for testing.
/// Automatically cleaned up when dropped.
pub struct TestRepo {
    _temp_dir: TempDir,
    path: PathBuf,
    remote: Option<TempDir>,
}

impl TestRepo {
    /// Creates a new test repository with an initial commit on the master branch.
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().to_path_buf();

        run_git(&path, &["init", "-b", "master"])?;
        configure_identity(&path)?;

        std::fs::write(path.join("README.md"), "# Test Repo\n")?;
        run_git(&path, &["add", "README.md"])?;
        run_git(&path, &["commit", "-m", "Initial commit"])?;

        Ok(Self {
            _temp_dir: temp_dir,
            path,
            remote: None,
        })
    }

    /// Creates a test repository tracking a bare `origin` remote.
    pub fn with_remote() -> Result<Self> {
        let remote_dir = TempDir::new()?;
        run_git(remote_dir.path(), &["init", "--bare"])?;

        let mut local = Self::new()?;
        let remote_path = remote_dir.path().to_string_lossy().to_string();
        run_git(&local.path, &["remote", "add", "origin", &remote_path])?;
        run_git(&local.path, &["push", "-u", "origin", "master"])?;
        local.remote = Some(remote_dir);

        Ok(local)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn remote_path(&self) -> Option<&Path> {
        self.remote.as_ref().map(|r| r.path())
    }

    pub fn head(&self) -> Result<String> {
        Ok(run_git(&self.path, &["rev-parse", "HEAD"])?)
    }

    /// Clones origin into a fresh directory for making upstream commits.
    fn upstream_clone(&self) -> Result<(TempDir, PathBuf)> {
        let remote = self
            .remote_path()
            .ok_or_else(|| anyhow::anyhow!("repository has no remote"))?;
        let other = TempDir::new()?;
        let clone = other.path().join("clone");
        run_git(
            other.path(),
            &[
                "clone",
                "--branch",
                "master",
                &remote.to_string_lossy(),
                &clone.to_string_lossy(),
            ],
        )?;
        configure_identity(&clone)?;
        Ok((other, clone))
    }

    /// Pushes `count` new commits to origin from a separate clone and
    /// returns the new upstream head. The local checkout is not touched.
    pub fn push_upstream_commits(&self, count: usize) -> Result<String> {
        let (_other, clone) = self.upstream_clone()?;

        for i in 0..count {
            let name = format!("upstream-{}.txt", i);
            std::fs::write(clone.join(&name), format!("change {}\n", i))?;
            run_git(&clone, &["add", &name])?;
            run_git(&clone, &["commit", "-m", &format!("Upstream change {}", i)])?;
        }
        run_git(&clone, &["push", "origin", "master"])?;
        Ok(run_git(&clone, &["rev-parse", "HEAD"])?)
    }

    /// Commits a local change to README.md that conflicts with upstream edits.
    pub fn commit_local_readme(&self, contents: &str) -> Result<()> {
        std::fs::write(self.path.join("README.md"), contents)?;
        run_git(&self.path, &["commit", "-am", "Local change"])?;
        Ok(())
    }

    /// Pushes an upstream edit of README.md.
    pub fn push_upstream_readme(&self, contents: &str) -> Result<()> {
        let (_other, clone) = self.upstream_clone()?;
        std::fs::write(clone.join("README.md"), contents)?;
        run_git(&clone, &["commit", "-am", "Upstream README"])?;
        run_git(&clone, &["push", "origin", "master"])?;
        Ok(())
    }

    pub fn break_remote(&self) -> Result<()> {
        let missing = self.path.join("no-such-remote");
        run_git(
            &self.path,
            &["remote", "set-url", "origin", &missing.to_string_lossy()],
        )?;
        Ok(())
    }

    pub fn file_exists(&self, name: &str) -> bool {
        self.path.join(name).exists()
    }
}
