//! The check-and-apply protocol.
//!
//! One [`Updater::check_and_update`] call walks fetch → compare → backup →
//! merge → verify and reports what happened as an [`UpdateResult`]. No step
//! returns an error to the caller; every failure becomes a result value.

use crate::backup::{self, backup_timestamp};
use crate::constants::{BACKUPS_DIR, SETTINGS_FILE, SHORT_REVISION_LEN};
use crate::inspector::{GitInspector, Inspector};
use crate::settings::{ConfigStore, Settings};
use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStep {
    CheckingRepository,
    Fetching,
    Comparing,
    BackingUp,
    Merging,
    Verifying,
}

impl fmt::Display for UpdateStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UpdateStep::CheckingRepository => "Checking repository",
            UpdateStep::Fetching => "Fetching from origin",
            UpdateStep::Comparing => "Comparing with upstream",
            UpdateStep::BackingUp => "Backing up working tree",
            UpdateStep::Merging => "Pulling changes from origin",
            UpdateStep::Verifying => "Verifying new revision",
        };
        f.write_str(text)
    }
}

/// Receives progress notifications while an update check runs.
pub trait UpdateObserver {
    fn on_step(&self, step: UpdateStep);
}

/// No-op observer for when progress tracking is not needed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoOpObserver;

impl UpdateObserver for NoOpObserver {
    fn on_step(&self, _step: UpdateStep) {}
}

/// Outcome of one check-and-apply pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateResult {
    success: bool,
    updated: bool,
    message: String,
    timestamp: DateTime<Local>,
    revision: Option<String>,
}

impl UpdateResult {
    fn failed(message: impl Into<String>, timestamp: DateTime<Local>) -> Self {
        Self {
            success: false,
            updated: false,
            message: message.into(),
            timestamp,
            revision: None,
        }
    }

    fn unchanged(
        message: impl Into<String>,
        timestamp: DateTime<Local>,
        revision: Option<String>,
    ) -> Self {
        Self {
            success: true,
            updated: false,
            message: message.into(),
            timestamp,
            revision,
        }
    }

    fn applied(message: impl Into<String>, timestamp: DateTime<Local>, revision: String) -> Self {
        Self {
            success: true,
            updated: true,
            message: message.into(),
            timestamp,
            revision: Some(revision),
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn updated(&self) -> bool {
        self.updated
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }
}

/// Read-only snapshot for status queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Status {
    pub running: bool,
    pub enabled: bool,
    pub last_check: Option<DateTime<Local>>,
    pub last_update: Option<DateTime<Local>>,
    pub update_count: u64,
    pub last_revision: Option<String>,
    pub check_interval_seconds: u64,
    pub repo_path: PathBuf,
    pub remote_url: Option<String>,
    pub is_repository: bool,
    pub project_name: String,
}

#[derive(Debug, Default)]
struct UpdaterState {
    last_check: Option<DateTime<Local>>,
    last_revision: Option<String>,
}

/// Shortens a revision for human-readable output.
#[must_use]
pub fn short_revision(revision: &str) -> &str {
    revision.get(..SHORT_REVISION_LEN).unwrap_or(revision)
}

/// Keeps one repository in sync with its upstream.
pub struct Updater {
    repo_path: PathBuf,
    inspector: Box<dyn Inspector>,
    store: ConfigStore,
    state: Mutex<UpdaterState>,
}

impl Updater {
    /// Opens the repository at `repo_path` using the git command line.
    pub fn open(repo_path: impl Into<PathBuf>) -> Self {
        let repo_path = repo_path.into();
        let inspector = GitInspector::new(&repo_path);
        Self::with_inspector(repo_path, inspector)
    }

    pub fn with_inspector(repo_path: impl Into<PathBuf>, inspector: impl Inspector + 'static) -> Self {
        let repo_path = repo_path.into();
        let store = ConfigStore::open(repo_path.join(SETTINGS_FILE));

        let last_revision = if inspector.is_repository() {
            inspector.current_revision()
        } else {
            warn!(path = %repo_path.display(), "not a git repository");
            None
        };
        if let Some(revision) = &last_revision {
            info!(revision = short_revision(revision), "auto-updater initialized");
        }

        Self {
            repo_path,
            inspector: Box::new(inspector),
            store,
            state: Mutex::new(UpdaterState {
                last_check: None,
                last_revision,
            }),
        }
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn inspector(&self) -> &dyn Inspector {
        self.inspector.as_ref()
    }

    #[must_use]
    pub fn settings(&self) -> Settings {
        self.store.snapshot()
    }

    /// Applies recognized settings keys and returns the ones applied.
    pub fn update_settings(&self, partial: &Map<String, Value>) -> Vec<String> {
        self.store.update(partial)
    }

    pub fn last_revision(&self) -> Option<String> {
        self.lock_state().last_revision.clone()
    }

    pub fn last_check(&self) -> Option<DateTime<Local>> {
        self.lock_state().last_check
    }

    fn lock_state(&self) -> MutexGuard<'_, UpdaterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn check_and_update(&self) -> UpdateResult {
        self.check_and_update_with(&NoOpObserver)
    }

    pub fn check_and_update_with(&self, observer: &dyn UpdateObserver) -> UpdateResult {
        observer.on_step(UpdateStep::CheckingRepository);
        if !self.inspector.is_repository() {
            return UpdateResult::failed("Not a Git repository", Local::now());
        }

        let settings = self.store.snapshot();
        if !settings.enabled {
            return UpdateResult::unchanged("Auto-update disabled", Local::now(), None);
        }

        let checked_at = Local::now();
        self.lock_state().last_check = Some(checked_at);

        observer.on_step(UpdateStep::Fetching);
        if !self.inspector.fetch_remote() {
            return UpdateResult::failed("Failed to fetch updates", checked_at);
        }

        observer.on_step(UpdateStep::Comparing);
        let behind = self
            .inspector
            .current_branch()
            .and_then(|branch| self.inspector.commits_behind(&branch));
        let behind = match behind {
            Some(count) if count > 0 => count,
            _ => {
                debug!("no updates available");
                return UpdateResult::unchanged(
                    "No updates available",
                    checked_at,
                    self.last_revision(),
                );
            }
        };
        info!(commits_behind = behind, "updates available");

        if settings.backup_before_update {
            observer.on_step(UpdateStep::BackingUp);
            self.backup(checked_at);
        }

        observer.on_step(UpdateStep::Merging);
        let before = self.inspector.current_revision();
        if let Err(e) = self.inspector.merge_upstream() {
            error!(error = %e, "git pull failed");
            return UpdateResult::failed("Failed to pull updates", checked_at);
        }

        observer.on_step(UpdateStep::Verifying);
        match self.inspector.current_revision() {
            Some(after) if before.as_deref() != Some(after.as_str()) => {
                info!(
                    from = before.as_deref().map(short_revision).unwrap_or("unknown"),
                    to = short_revision(&after),
                    "successfully updated"
                );
                self.lock_state().last_revision = Some(after.clone());
                let settings = self.store.record_update(Local::now());
                UpdateResult::applied(
                    format!("Successfully updated {}", settings.project_name),
                    checked_at,
                    after,
                )
            }
            after => {
                info!("no new commits to pull");
                UpdateResult::unchanged("No new commits to pull", checked_at, after)
            }
        }
    }

    fn backup(&self, at: DateTime<Local>) {
        let dest = self.repo_path.join(BACKUPS_DIR);
        if let Err(e) = backup::create_backup(&self.repo_path, &dest, &backup_timestamp(at)) {
            warn!(error = %e, "backup failed, but continuing with update");
        }
    }

    /// Assembles the status snapshot; `running` comes from the scheduler.
    pub fn status(&self, running: bool) -> Status {
        let settings = self.store.snapshot();
        let state = self.lock_state();
        Status {
            running,
            enabled: settings.enabled,
            last_check: state.last_check,
            last_update: settings.last_update_timestamp,
            update_count: settings.update_count,
            last_revision: state.last_revision.clone(),
            check_interval_seconds: settings.check_interval_seconds,
            repo_path: self.repo_path.clone(),
            remote_url: self.inspector.remote_url(),
            is_repository: self.inspector.is_repository(),
            project_name: settings.project_name,
        }
    }
}
