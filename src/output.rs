//! Spinners, colored output, and summary formatting.
//!
//! This module provides visual feedback for one-shot checks and renders the
//! status and settings views of the CLI.

use crate::config::Config;
use crate::constants::PROGRESS_TICK_MS;
use crate::settings::Settings;
use crate::updater::{Status, UpdateObserver, UpdateResult, UpdateStep, short_revision};
use chrono::{DateTime, Local};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Map, Value};
use std::time::Duration;

/// Spinner shown while a check runs.
/// Uses `Option` to avoid allocation when progress is hidden (quiet/verbose modes).
pub struct CheckProgress {
    spinner: Option<ProgressBar>,
}

impl CheckProgress {
    /// Clears the spinner before the summary is printed.
    pub fn finish(&self) {
        if let Some(spinner) = &self.spinner {
            spinner.finish_and_clear();
        }
    }
}

impl UpdateObserver for CheckProgress {
    fn on_step(&self, step: UpdateStep) {
        if let Some(spinner) = &self.spinner {
            spinner.set_message(format!("{}...", step));
        }
    }
}

/// Creates the check spinner.
/// Hidden in quiet mode, and in verbose mode where log lines would interleave with it.
#[must_use]
pub fn create_check_progress(config: &Config) -> CheckProgress {
    let spinner = if config.is_quiet() || config.is_verbose() {
        None
    } else {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg}")
        {
            spinner.set_style(style);
        }
        spinner.enable_steady_tick(Duration::from_millis(PROGRESS_TICK_MS));
        Some(spinner)
    };

    CheckProgress { spinner }
}

fn format_time(time: Option<DateTime<Local>>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string())
}

fn yes_no(value: bool) -> colored::ColoredString {
    if value { "yes".green() } else { "no".red() }
}

fn print_section(title: &str) {
    let line = "=".repeat(50).cyan().dimmed();
    let padding = (50 - title.len().min(50)) / 2;
    let centered = format!("{:>width$}", title, width = padding + title.len());
    println!("{}\n{}\n{}", line, centered.cyan().bold(), line);
}

pub fn print_check_result(result: &UpdateResult, config: &Config) {
    if config.is_quiet() {
        if !result.success() {
            eprintln!("error: {}", result.message());
        } else if result.updated() {
            println!("{}", result.message());
        }
        return;
    }

    let symbol = match (result.success(), result.updated()) {
        (true, true) => "✓".green(),
        (true, false) => "•".cyan(),
        (false, _) => "✗".red(),
    };
    println!("{} {}", symbol, result.message());
    if let Some(revision) = result.revision() {
        println!("  {} {}", "Revision:".dimmed(), short_revision(revision).cyan());
    }
    println!(
        "  {} {}",
        "Checked at:".dimmed(),
        format_time(Some(result.timestamp()))
    );
    if result.updated() {
        println!(
            "{}",
            "You may need to restart the application for changes to take effect.".yellow()
        );
    }
}

pub fn print_status(status: &Status) {
    print_section(&status.project_name);
    println!("{:<16} {}", "Repository:".white().bold(), status.repo_path.display());
    println!(
        "{:<16} {}",
        "Remote:".white().bold(),
        status.remote_url.as_deref().unwrap_or("none")
    );
    println!(
        "{:<16} {}",
        "Revision:".white().bold(),
        status
            .last_revision
            .as_deref()
            .map(short_revision)
            .unwrap_or("unknown")
            .cyan()
    );
    println!("{:<16} {}", "Git repository:".white().bold(), yes_no(status.is_repository));
    println!("{:<16} {}", "Enabled:".white().bold(), yes_no(status.enabled));
    println!("{:<16} {}", "Running:".white().bold(), yes_no(status.running));
    println!(
        "{:<16} {}s",
        "Interval:".white().bold(),
        status.check_interval_seconds
    );
    println!("{:<16} {}", "Last check:".white().bold(), format_time(status.last_check));
    println!("{:<16} {}", "Last update:".white().bold(), format_time(status.last_update));
    println!("{:<16} {}", "Update count:".white().bold(), status.update_count);
}

pub fn print_settings(settings: &Settings) {
    print_section("Configuration");
    println!("  Project:              {}", settings.project_name);
    println!("  Enabled:              {}", yes_no(settings.enabled));
    println!("  Check interval:       {} seconds", settings.check_interval_seconds);
    println!("  Auto-restart:         {}", yes_no(settings.auto_restart));
    println!("  Notifications:        {}", yes_no(settings.notify_on_update));
    println!("  Backup before update: {}", yes_no(settings.backup_before_update));
    println!("  Last update:          {}", format_time(settings.last_update_timestamp));
    println!("  Update count:         {}", settings.update_count);
}

/// Keys of `requested` that the settings store did not apply.
#[must_use]
pub fn ignored_keys<'a>(requested: &'a Map<String, Value>, applied: &[String]) -> Vec<&'a str> {
    requested
        .keys()
        .filter(|key| !applied.contains(key))
        .map(String::as_str)
        .collect()
}

pub fn print_applied_keys(applied: &[String], requested: &Map<String, Value>, config: &Config) {
    if config.is_quiet() {
        return;
    }
    for key in applied {
        println!("{} {}", "updated".green(), key);
    }
    for key in ignored_keys(requested, applied) {
        println!(
            "{} {} (unknown key or invalid value)",
            "ignored".yellow(),
            key
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_time_handles_absent_and_present() {
        assert_eq!(format_time(None), "never");
        let at = Local
            .with_ymd_and_hms(2024, 1, 2, 3, 4, 5)
            .single()
            .expect("unambiguous local time");
        assert_eq!(format_time(Some(at)), "2024-01-02 03:04:05");
    }

    #[test]
    fn test_hidden_progress_accepts_steps() {
        let config = Config {
            verbosity: crate::config::Verbosity::Quiet,
        };
        let progress = create_check_progress(&config);
        // Should not panic without a spinner
        progress.on_step(UpdateStep::Fetching);
        progress.finish();
    }

    #[test]
    fn test_ignored_keys_counts_repeated_assignments_once() {
        let requested: Map<String, Value> = [
            ("autoRestart".to_string(), Value::from(1)),
            ("autoRestart".to_string(), Value::Bool(true)),
            ("bogus".to_string(), Value::Bool(true)),
        ]
        .into_iter()
        .collect();
        let applied = vec!["autoRestart".to_string()];

        assert_eq!(ignored_keys(&requested, &applied), vec!["bogus"]);
        assert!(ignored_keys(&requested, &["autoRestart".to_string(), "bogus".to_string()]).is_empty());
    }

    #[test]
    fn test_step_messages_are_human_readable() {
        assert_eq!(UpdateStep::Fetching.to_string(), "Fetching from origin");
        assert_eq!(UpdateStep::Merging.to_string(), "Pulling changes from origin");
        assert_eq!(UpdateStep::BackingUp.to_string(), "Backing up working tree");
    }
}
