use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use git_autoupdate::config::{Config, Verbosity};
use git_autoupdate::hooks::{DesktopNotifier, ExecRestarter, HostProcess, HostRestarter};
use git_autoupdate::scheduler::{Hooks, Scheduler};
use git_autoupdate::updater::Updater;
use git_autoupdate::{logging, output};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Keep a git checkout in sync with its upstream.
#[derive(Parser, Debug)]
#[command(name = "git-autoupdate", version, about)]
struct Cli {
    /// Repository to watch (defaults to the current directory)
    #[arg(long, global = true, value_name = "PATH")]
    repo: Option<PathBuf>,

    /// Only print errors and applied updates
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also append log records to this file
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, and merge if the upstream branch has new commits
    Check {
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show repository and updater status
    Status {
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },
    /// Inspect or change persisted settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Poll in the background, optionally supervising a host command
    Run {
        /// Command to run and restart after updates (after `--`)
        #[arg(last = true, value_name = "HOST_COMMAND")]
        host: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective settings
    Show {
        /// Print the settings as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set one or more settings, e.g. `autoRestart=true checkIntervalSeconds=600`
    Set {
        #[arg(required = true, value_name = "KEY=VALUE", value_parser = parse_assignment)]
        assignments: Vec<(String, Value)>,
    },
}

/// Parses `KEY=VALUE`; VALUE is read as JSON and falls back to a plain string.
fn parse_assignment(s: &str) -> Result<(String, Value), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{}'", s));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config {
        verbosity: Verbosity::from_flags(cli.quiet, cli.verbose),
    };
    logging::init(&config, cli.log_file.as_deref())?;

    let repo = match cli.repo {
        Some(path) => path,
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    let updater = Arc::new(Updater::open(repo));

    match cli.command {
        Command::Check { json } => cmd_check(&updater, &config, json),
        Command::Status { json } => cmd_status(&updater, json),
        Command::Config { action } => cmd_config(&updater, &config, action),
        Command::Run { host } => cmd_run(updater, host),
    }
}

fn cmd_check(updater: &Updater, config: &Config, json: bool) -> anyhow::Result<()> {
    let result = if json {
        updater.check_and_update()
    } else {
        let progress = output::create_check_progress(config);
        let result = updater.check_and_update_with(&progress);
        progress.finish();
        result
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        output::print_check_result(&result, config);
    }

    if !result.success() {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_status(updater: &Updater, json: bool) -> anyhow::Result<()> {
    let status = updater.status(false);
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        output::print_status(&status);
    }
    Ok(())
}

fn cmd_config(updater: &Updater, config: &Config, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show { json } => {
            let settings = updater.settings();
            if json {
                println!("{}", serde_json::to_string_pretty(&settings)?);
            } else {
                output::print_settings(&settings);
            }
        }
        ConfigAction::Set { assignments } => {
            let partial: Map<String, Value> = assignments.into_iter().collect();
            let applied = updater.update_settings(&partial);
            output::print_applied_keys(&applied, &partial, config);
        }
    }
    Ok(())
}

fn cmd_run(updater: Arc<Updater>, host: Vec<String>) -> anyhow::Result<()> {
    let is_repository = updater.inspector().is_repository();
    let restarter = ExecRestarter::current()?;

    if host.is_empty() {
        if !is_repository {
            bail!("Not a Git repository: {}", updater.repo_path().display());
        }
        let scheduler = Scheduler::new(
            updater,
            Hooks {
                notifier: Box::new(DesktopNotifier),
                restarter: Box::new(restarter),
            },
        );
        if !scheduler.start() {
            bail!("Auto-update loop did not start");
        }
        scheduler.wait();
        return Ok(());
    }

    let process = HostProcess::spawn(&host, updater.repo_path())?;
    let scheduler = Scheduler::new(
        Arc::clone(&updater),
        Hooks {
            notifier: Box::new(DesktopNotifier),
            restarter: Box::new(HostRestarter::new(process.clone(), restarter)),
        },
    );

    let started = if is_repository {
        scheduler.start()
    } else {
        warn!("auto-updater disabled: not a git repository");
        false
    };

    let status = process.wait()?;
    info!(status = %status, "host process exited");
    if started {
        scheduler.stop();
    }
    if !status.success() {
        std::process::exit(status.code().unwrap_or(1));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_assignment_reads_json_or_string() {
        assert_eq!(
            parse_assignment("autoRestart=true"),
            Ok(("autoRestart".to_string(), Value::Bool(true)))
        );
        assert_eq!(
            parse_assignment("checkIntervalSeconds=600"),
            Ok(("checkIntervalSeconds".to_string(), Value::from(600)))
        );
        assert_eq!(
            parse_assignment("projectName=My App"),
            Ok(("projectName".to_string(), Value::String("My App".to_string())))
        );
        assert!(parse_assignment("novalue").is_err());
        assert!(parse_assignment("=1").is_err());
    }

    #[test]
    fn test_run_accepts_host_command_after_separator() {
        let cli = Cli::try_parse_from(["git-autoupdate", "--repo", "/tmp/x", "run", "--", "npm", "start"])
            .expect("valid arguments");
        match cli.command {
            Command::Run { host } => assert_eq!(host, vec!["npm", "start"]),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
