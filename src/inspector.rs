//! Soft-failing view of a repository.
//!
//! [`Inspector`] is the seam between the update protocol and the version
//! control backend. Queries degrade to "no information" instead of returning
//! errors: the failure is logged here and the caller sees `None` or `false`.

use crate::git::{self, GitError};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Point-in-time view of the local and remote state, recomputed on every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryState {
    pub current_revision: String,
    pub tracking_branch: String,
    pub commits_behind: Option<u64>,
    pub remote_url: Option<String>,
}

pub trait Inspector: Send + Sync {
    fn is_repository(&self) -> bool;
    fn current_revision(&self) -> Option<String>;
    fn current_branch(&self) -> Option<String>;
    fn remote_url(&self) -> Option<String>;
    /// Returns whether the fetch succeeded.
    fn fetch_remote(&self) -> bool;
    /// Upstream commits not yet merged locally.
    fn commits_behind(&self, branch: &str) -> Option<u64>;
    /// Merges upstream into the working tree.
    fn merge_upstream(&self) -> Result<(), GitError>;

    /// Combines the read-only queries into one snapshot.
    ///
    /// Uses whatever remote-tracking refs are present; no fetch is made.
    fn state(&self) -> Option<RepositoryState> {
        let current_revision = self.current_revision()?;
        let tracking_branch = self.current_branch()?;
        Some(RepositoryState {
            commits_behind: self.commits_behind(&tracking_branch),
            remote_url: self.remote_url(),
            current_revision,
            tracking_branch,
        })
    }
}

impl<T: Inspector + ?Sized> Inspector for Arc<T> {
    fn is_repository(&self) -> bool {
        (**self).is_repository()
    }

    fn current_revision(&self) -> Option<String> {
        (**self).current_revision()
    }

    fn current_branch(&self) -> Option<String> {
        (**self).current_branch()
    }

    fn remote_url(&self) -> Option<String> {
        (**self).remote_url()
    }

    fn fetch_remote(&self) -> bool {
        (**self).fetch_remote()
    }

    fn commits_behind(&self, branch: &str) -> Option<u64> {
        (**self).commits_behind(branch)
    }

    fn merge_upstream(&self) -> Result<(), GitError> {
        (**self).merge_upstream()
    }
}

/// [`Inspector`] backed by the git command line.
#[derive(Debug, Clone)]
pub struct GitInspector {
    repo: PathBuf,
}

impl GitInspector {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self { repo: repo.into() }
    }

    pub fn path(&self) -> &Path {
        &self.repo
    }
}

fn soft<T>(what: &str, result: Result<T, GitError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, "error {}", what);
            None
        }
    }
}

impl Inspector for GitInspector {
    fn is_repository(&self) -> bool {
        match git::git_dir(&self.repo) {
            Ok(_) => true,
            Err(GitError::Failed { .. }) => {
                debug!(path = %self.repo.display(), "not a git repository");
                false
            }
            Err(e) => {
                warn!(error = %e, "error checking git repository");
                false
            }
        }
    }

    fn current_revision(&self) -> Option<String> {
        soft("getting current revision", git::current_revision(&self.repo))
    }

    fn current_branch(&self) -> Option<String> {
        soft("getting current branch", git::current_branch(&self.repo)).flatten()
    }

    fn remote_url(&self) -> Option<String> {
        // An unset key exits non-zero; that is not worth a warning.
        git::remote_url(&self.repo).ok()
    }

    fn fetch_remote(&self) -> bool {
        debug!(path = %self.repo.display(), "fetching updates");
        soft("fetching updates", git::fetch(&self.repo)).is_some()
    }

    fn commits_behind(&self, branch: &str) -> Option<u64> {
        soft(
            "checking for updates",
            git::commits_behind(&self.repo, branch),
        )
    }

    fn merge_upstream(&self) -> Result<(), GitError> {
        debug!(path = %self.repo.display(), "pulling latest changes");
        git::pull(&self.repo)
    }
}
