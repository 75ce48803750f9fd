//! Persisted auto-update settings.
//!
//! Settings live in a human-editable JSON file at the repository root. Loading
//! never fails: missing keys take their defaults, and an unreadable or
//! malformed file yields pure defaults. Keys the schema does not know about
//! are carried through load/save untouched but are never interpreted.

use crate::constants::{DEFAULT_CHECK_INTERVAL_SECS, DEFAULT_PROJECT_NAME};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub enabled: bool,
    pub check_interval_seconds: u64,
    pub auto_restart: bool,
    pub notify_on_update: bool,
    pub backup_before_update: bool,
    pub last_update_timestamp: Option<DateTime<Local>>,
    pub update_count: u64,
    pub project_name: String,
    /// Unrecognized keys from the file, written back verbatim.
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_seconds: DEFAULT_CHECK_INTERVAL_SECS,
            auto_restart: false,
            notify_on_update: true,
            backup_before_update: true,
            last_update_timestamp: None,
            update_count: 0,
            project_name: DEFAULT_PROJECT_NAME.to_string(),
            extra: Map::new(),
        }
    }
}

impl Settings {
    /// JSON keys of the recognized schema; the allow-list for [`ConfigStore::update`].
    pub const KEYS: &'static [&'static str] = &[
        "enabled",
        "checkIntervalSeconds",
        "autoRestart",
        "notifyOnUpdate",
        "backupBeforeUpdate",
        "lastUpdateTimestamp",
        "updateCount",
        "projectName",
    ];

    #[must_use]
    pub fn is_known_key(key: &str) -> bool {
        Self::KEYS.contains(&key)
    }

    /// Keys preserved from the file that the schema does not recognize.
    pub fn unknown_keys(&self) -> impl Iterator<Item = &str> {
        self.extra.keys().map(String::as_str)
    }
}

/// Reads settings from `path`, filling gaps from [`Settings::default`].
pub fn load_settings(path: &Path) -> Settings {
    if !path.exists() {
        debug!(path = %path.display(), "no settings file, using defaults");
        return Settings::default();
    }
    match read_settings(path) {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "error loading settings, using defaults");
            Settings::default()
        }
    }
}

fn read_settings(path: &Path) -> Result<Settings, SettingsError> {
    let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&text)?)
}

/// Overwrites `path` with the pretty-printed settings.
pub fn save_settings(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    let mut text = serde_json::to_string_pretty(settings)?;
    text.push('\n');
    std::fs::write(path, text).map_err(|source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Owner of the in-memory settings and their backing file.
///
/// All mutations go through one mutex and are saved before the lock is
/// released, so concurrent callers cannot lose each other's writes.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    settings: Mutex<Settings>,
}

impl ConfigStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = load_settings(&path);
        Self {
            path,
            settings: Mutex::new(settings),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Settings> {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn snapshot(&self) -> Settings {
        self.lock().clone()
    }

    /// Persists the current settings. Failures are logged, not raised.
    pub fn save(&self) -> bool {
        let settings = self.lock();
        self.persist(&settings)
    }

    fn persist(&self, settings: &Settings) -> bool {
        match save_settings(&self.path, settings) {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "error saving settings");
                false
            }
        }
    }

    /// Applies recognized keys from `partial`, saves, and returns the keys applied.
    ///
    /// Unknown keys are ignored. A value whose type does not fit its key is
    /// skipped without affecting the other keys.
    pub fn update(&self, partial: &Map<String, Value>) -> Vec<String> {
        let mut settings = self.lock();
        let mut applied = Vec::new();

        let mut current = match serde_json::to_value(&*settings) {
            Ok(value) => value,
            Err(e) => {
                error!(error = %e, "error serializing settings");
                return applied;
            }
        };

        for (key, value) in partial {
            if !Settings::is_known_key(key) {
                debug!(key = %key, "ignoring unknown settings key");
                continue;
            }
            let mut candidate = current.clone();
            candidate[key.as_str()] = value.clone();
            match serde_json::from_value::<Settings>(candidate.clone()) {
                Ok(_) => {
                    current = candidate;
                    applied.push(key.clone());
                }
                Err(e) => warn!(key = %key, error = %e, "rejecting settings value"),
            }
        }

        match serde_json::from_value::<Settings>(current) {
            Ok(updated) => *settings = updated,
            Err(e) => {
                error!(error = %e, "error applying settings update");
                return Vec::new();
            }
        }
        self.persist(&settings);
        info!(keys = ?applied, "settings updated");
        applied
    }

    /// Stamps a successful update and bumps the counter by one.
    pub fn record_update(&self, at: DateTime<Local>) -> Settings {
        let mut settings = self.lock();
        settings.last_update_timestamp = Some(at);
        settings.update_count += 1;
        self.persist(&settings);
        settings.clone()
    }
}
