//! Working-tree snapshots taken before an update is applied.

use crate::constants::{BACKUP_EXCLUDES, BACKUP_PREFIX};
use chrono::{DateTime, Local};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
#[error("backup failed at {path}: {source}")]
pub struct BackupError {
    path: PathBuf,
    #[source]
    source: io::Error,
}

impl BackupError {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

trait AtPath<T> {
    fn at(self, path: &Path) -> Result<T, BackupError>;
}

impl<T> AtPath<T> for io::Result<T> {
    fn at(self, path: &Path) -> Result<T, BackupError> {
        self.map_err(|source| BackupError {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Formats the timestamp used in snapshot directory names.
#[must_use]
pub fn backup_timestamp(now: DateTime<Local>) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

#[must_use]
pub fn is_excluded(name: &str) -> bool {
    BACKUP_EXCLUDES.contains(&name)
}

/// Copies `source_dir` into `dest_root/backup_<timestamp>/`.
///
/// Top-level entries named in the exclusion set are skipped; nested
/// directories with the same names are ordinary content and are copied. An
/// existing snapshot directory with the same name is merged into rather than
/// replaced.
pub fn create_backup(
    source_dir: &Path,
    dest_root: &Path,
    timestamp: &str,
) -> Result<PathBuf, BackupError> {
    let backup_dir = dest_root.join(format!("{}{}", BACKUP_PREFIX, timestamp));
    fs::create_dir_all(&backup_dir).at(&backup_dir)?;
    copy_tree(source_dir, &backup_dir, true)?;
    info!(path = %backup_dir.display(), "backup created");
    Ok(backup_dir)
}

fn copy_tree(from: &Path, to: &Path, top_level: bool) -> Result<(), BackupError> {
    for entry in fs::read_dir(from).at(from)? {
        let entry = entry.at(from)?;
        let name = entry.file_name();
        if top_level && name.to_str().is_some_and(is_excluded) {
            debug!(path = %entry.path().display(), "skipping excluded entry");
            continue;
        }

        let src = entry.path();
        let dst = to.join(&name);
        let file_type = entry.file_type().at(&src)?;

        if file_type.is_dir() {
            fs::create_dir_all(&dst).at(&dst)?;
            copy_tree(&src, &dst, false)?;
        } else if file_type.is_symlink() {
            copy_symlink(&src, &dst)?;
        } else {
            fs::copy(&src, &dst).at(&src)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<(), BackupError> {
    let target = fs::read_link(src).at(src)?;
    if fs::symlink_metadata(dst).is_ok() {
        fs::remove_file(dst).at(dst)?;
    }
    std::os::unix::fs::symlink(&target, dst).at(dst)
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<(), BackupError> {
    if src.is_dir() {
        fs::create_dir_all(dst).at(dst)?;
        copy_tree(src, dst, false)
    } else {
        fs::copy(src, dst).at(src).map(|_| ())
    }
}
