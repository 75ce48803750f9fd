//! Git repository auto-update library.
//!
//! This crate keeps a local checkout in sync with its upstream by:
//! - Fetching from the remote and counting commits behind
//! - Snapshotting the working tree before a merge
//! - Pulling and verifying that the revision actually moved
//! - Recording the outcome in a JSON settings file
//! - Repeating on a background timer, with optional notification and restart

pub mod backup;
pub mod config;
pub mod constants;
pub mod git;
pub mod hooks;
pub mod inspector;
pub mod logging;
pub mod output;
pub mod scheduler;
pub mod settings;
pub mod updater;
