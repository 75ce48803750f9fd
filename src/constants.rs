//! Application-wide constants.
//!
//! Centralized configuration values to avoid magic numbers throughout the codebase.

use std::time::Duration;

/// Timeout for read-only git queries (rev-parse, config, rev-list).
pub const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for `git fetch`.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for `git pull`.
pub const MERGE_TIMEOUT: Duration = Duration::from_secs(60);

/// How often a running git child is polled for exit.
pub const PROCESS_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Returns the git executable to invoke.
///
/// Can be customized via the GIT_AUTOUPDATE_GIT environment variable.
/// Falls back to `git` on the PATH if not set or empty.
///
/// Example: `GIT_AUTOUPDATE_GIT=/opt/git/bin/git git-autoupdate check`
pub fn git_program() -> String {
    std::env::var("GIT_AUTOUPDATE_GIT")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "git".to_string())
}

/// Default polling interval for the scheduler loop (30 minutes).
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 1800;

/// Shortest interval the scheduler will sleep between checks.
pub const MIN_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Sleep after a failed loop iteration before retrying.
pub const ERROR_RETRY_INTERVAL: Duration = Duration::from_secs(60);

/// How long `Scheduler::stop` waits for the loop thread to exit.
pub const STOP_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Settings file name, relative to the repository root.
pub const SETTINGS_FILE: &str = "auto_update_config.json";

/// Backup root directory name, relative to the repository root.
pub const BACKUPS_DIR: &str = "backups";

/// Prefix of each snapshot directory inside [`BACKUPS_DIR`].
pub const BACKUP_PREFIX: &str = "backup_";

/// Entries never copied into a snapshot.
pub const BACKUP_EXCLUDES: &[&str] = &[
    ".git",
    BACKUPS_DIR,
    "__pycache__",
    ".pytest_cache",
    "node_modules",
    "target",
];

/// Default project name shown in messages and notifications.
pub const DEFAULT_PROJECT_NAME: &str = "project";

/// Remote whose tracking branches are compared against HEAD.
pub const REMOTE_NAME: &str = "origin";

/// Number of characters of a revision shown in human output.
pub const SHORT_REVISION_LEN: usize = 8;

/// Progress spinner tick interval in milliseconds.
pub const PROGRESS_TICK_MS: u64 = 80;
