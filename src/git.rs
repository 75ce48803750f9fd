//! Git command wrappers.
//!
//! This module provides a thin wrapper around git CLI commands,
//! handling command execution, timeouts and error formatting.
//! Every call returns a typed [`GitError`] on failure; deciding whether a
//! failure is fatal is left to the caller.

use crate::constants::{
    FETCH_TIMEOUT, MERGE_TIMEOUT, METADATA_TIMEOUT, PROCESS_POLL_INTERVAL, REMOTE_NAME,
    git_program,
};
use std::io::{self, Read};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to execute git {command}: {source}")]
    Io {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("git {command} timed out after {}s", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },
    #[error("git {command} failed ({status}): {stderr}")]
    Failed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("git {command} returned unexpected output: {output:?}")]
    UnexpectedOutput { command: String, output: String },
    #[error("invalid branch name: {0:?}")]
    InvalidBranch(String),
}

impl GitError {
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, GitError::Timeout { .. })
    }
}

fn git_command(repo: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::new(git_program());
    cmd.current_dir(repo)
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null());
    cmd
}

fn finish(command: String, status: ExitStatus, stdout: &[u8], stderr: &[u8]) -> Result<String, GitError> {
    if status.success() {
        Ok(String::from_utf8_lossy(stdout).trim().to_string())
    } else {
        Err(GitError::Failed {
            command,
            status,
            stderr: String::from_utf8_lossy(stderr).trim().to_string(),
        })
    }
}

/// Runs git to completion without a time limit.
///
/// Used for local, non-networked commands such as repository setup.
pub fn run_git(repo: &Path, args: &[&str]) -> Result<String, GitError> {
    let command = args.join(" ");
    let output = git_command(repo, args)
        .output()
        .map_err(|source| GitError::Io {
            command: command.clone(),
            source,
        })?;
    finish(command, output.status, &output.stdout, &output.stderr)
}

/// Runs git, killing the child if it has not exited within `timeout`.
///
/// Output pipes are drained on helper threads so a chatty command cannot
/// block on a full pipe while the timeout is being enforced. The same
/// deadline bounds the wait for end-of-file, since a detached grandchild
/// (an ssh control master, a credential daemon) can hold the pipes open
/// after git itself has exited.
pub fn run_git_with_timeout(
    repo: &Path,
    args: &[&str],
    timeout: Duration,
) -> Result<String, GitError> {
    let command = args.join(" ");
    let mut child = git_command(repo, args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| GitError::Io {
            command: command.clone(),
            source,
        })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());
    let deadline = Instant::now() + timeout;

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(GitError::Timeout { command, timeout });
            }
            Ok(None) => thread::sleep(PROCESS_POLL_INTERVAL),
            Err(source) => {
                let _ = child.kill();
                return Err(GitError::Io { command, source });
            }
        }
    };

    let stdout = stdout.collect(deadline);
    let stderr = stderr.collect(deadline);
    finish(command, status, &stdout, &stderr)
}

/// Output gathered by a pipe reader thread.
struct Drain {
    buf: Arc<Mutex<Vec<u8>>>,
    eof: Receiver<()>,
}

impl Drain {
    /// Waits for end-of-file until `deadline` and returns what was read.
    /// A reader still blocked past the deadline is left detached.
    fn collect(self, deadline: Instant) -> Vec<u8> {
        let remaining = deadline
            .saturating_duration_since(Instant::now())
            .max(PROCESS_POLL_INTERVAL);
        let _ = self.eof.recv_timeout(remaining);
        let mut buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *buf)
    }
}

fn drain<R>(pipe: Option<R>) -> Drain
where
    R: Read + Send + 'static,
{
    let buf = Arc::new(Mutex::new(Vec::new()));
    let (eof_tx, eof) = mpsc::channel();
    let shared = Arc::clone(&buf);
    thread::spawn(move || {
        if let Some(mut pipe) = pipe {
            let mut chunk = [0u8; 8192];
            loop {
                match pipe.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => shared
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend_from_slice(&chunk[..n]),
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(_) => break,
                }
            }
        }
        let _ = eof_tx.send(());
    });
    Drain { buf, eof }
}

fn validate_branch_name(branch: &str) -> Result<(), GitError> {
    if branch.contains('\0') || branch.contains('\n') || branch.contains("..") || branch.is_empty()
    {
        return Err(GitError::InvalidBranch(branch.to_string()));
    }
    Ok(())
}

/// Returns the repository's git directory; fails outside a work tree.
pub fn git_dir(repo: &Path) -> Result<String, GitError> {
    run_git_with_timeout(repo, &["rev-parse", "--git-dir"], METADATA_TIMEOUT)
}

pub fn current_revision(repo: &Path) -> Result<String, GitError> {
    run_git_with_timeout(repo, &["rev-parse", "HEAD"], METADATA_TIMEOUT)
}

/// Returns the checked-out branch, or `None` for a detached HEAD.
pub fn current_branch(repo: &Path) -> Result<Option<String>, GitError> {
    let branch = run_git_with_timeout(repo, &["branch", "--show-current"], METADATA_TIMEOUT)?;
    Ok(Some(branch).filter(|b| !b.is_empty()))
}

pub fn remote_url(repo: &Path) -> Result<String, GitError> {
    let key = format!("remote.{}.url", REMOTE_NAME);
    run_git_with_timeout(repo, &["config", "--get", &key], METADATA_TIMEOUT)
}

/// Downloads remote objects and refs; the local branch is left untouched.
pub fn fetch(repo: &Path) -> Result<(), GitError> {
    run_git_with_timeout(repo, &["fetch", "--quiet"], FETCH_TIMEOUT)?;
    Ok(())
}

/// Counts commits on the remote tracking branch that HEAD does not contain.
pub fn commits_behind(repo: &Path, branch: &str) -> Result<u64, GitError> {
    validate_branch_name(branch)?;
    let range = format!("HEAD..{}/{}", REMOTE_NAME, branch);
    let output = run_git_with_timeout(repo, &["rev-list", "--count", &range], METADATA_TIMEOUT)?;
    output
        .parse::<u64>()
        .map_err(|_| GitError::UnexpectedOutput {
            command: format!("rev-list --count {}", range),
            output,
        })
}

/// Merges the upstream branch into the current checkout.
pub fn pull(repo: &Path) -> Result<(), GitError> {
    run_git_with_timeout(repo, &["pull", "--quiet"], MERGE_TIMEOUT)?;
    Ok(())
}
