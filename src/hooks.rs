//! Side effects triggered after a successful update.
//!
//! The scheduler only knows the [`Notifier`] and [`Restarter`] traits; the
//! implementations here talk to the desktop and to the operating system.

use anyhow::{Context, bail};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Shows a short message to the user.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str) -> anyhow::Result<()>;
}

/// Relaunches the host application so updated code takes effect.
pub trait Restarter: Send + Sync {
    fn restart(&self) -> anyhow::Result<()>;
}

/// Platform desktop notifications via the native command-line helpers.
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopNotifier;

impl DesktopNotifier {
    fn command(title: &str, body: &str) -> Command {
        if cfg!(target_os = "macos") {
            let script = format!(
                "display notification {:?} with title {:?}",
                body, title
            );
            let mut cmd = Command::new("osascript");
            cmd.args(["-e", &script]);
            cmd
        } else if cfg!(windows) {
            let script = format!(
                "[void][System.Reflection.Assembly]::LoadWithPartialName('System.Windows.Forms'); \
                 $n = New-Object System.Windows.Forms.NotifyIcon; \
                 $n.Icon = [System.Drawing.SystemIcons]::Information; $n.Visible = $true; \
                 $n.ShowBalloonTip(5000, '{}', '{}', 'Info'); Start-Sleep -Seconds 5; $n.Dispose()",
                title.replace('\'', "''"),
                body.replace('\'', "''")
            );
            let mut cmd = Command::new("powershell");
            cmd.args(["-NoProfile", "-Command", &script]);
            cmd
        } else {
            let mut cmd = Command::new("notify-send");
            cmd.args([title, body]);
            cmd
        }
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, title: &str, body: &str) -> anyhow::Result<()> {
        let mut cmd = Self::command(title, body);
        let status = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .context("Failed to launch notification helper")?;
        if !status.success() {
            bail!("notification helper exited with {}", status);
        }
        Ok(())
    }
}

/// Replaces the running process with a fresh copy of itself.
#[derive(Debug, Clone)]
pub struct ExecRestarter {
    program: PathBuf,
    args: Vec<OsString>,
}

impl ExecRestarter {
    pub fn new(program: impl Into<PathBuf>, args: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Captures the current executable and its arguments.
    pub fn current() -> anyhow::Result<Self> {
        let program = std::env::current_exe().context("Failed to locate current executable")?;
        Ok(Self::new(program, std::env::args_os().skip(1).collect()))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }
}

impl Restarter for ExecRestarter {
    #[cfg(unix)]
    fn restart(&self) -> anyhow::Result<()> {
        use std::os::unix::process::CommandExt;

        info!(program = %self.program.display(), "restarting application");
        // exec only returns on failure.
        let err = Command::new(&self.program).args(&self.args).exec();
        Err(err).with_context(|| format!("Failed to re-execute {}", self.program.display()))
    }

    #[cfg(not(unix))]
    fn restart(&self) -> anyhow::Result<()> {
        info!(program = %self.program.display(), "restarting application");
        Command::new(&self.program)
            .args(&self.args)
            .spawn()
            .with_context(|| format!("Failed to relaunch {}", self.program.display()))?;
        std::process::exit(0)
    }
}

/// A supervised host application started by `run`.
///
/// Cloning shares the same child; the restarter uses a clone to stop the
/// host before the supervisor re-executes itself.
#[derive(Debug, Clone)]
pub struct HostProcess {
    child: Arc<Mutex<Child>>,
}

impl HostProcess {
    pub fn spawn(command: &[String], dir: &Path) -> anyhow::Result<Self> {
        let (program, args) = command
            .split_first()
            .context("Host command must not be empty")?;
        let child = Command::new(program)
            .args(args)
            .current_dir(dir)
            .spawn()
            .with_context(|| format!("Failed to start host command '{}'", program))?;
        info!(pid = child.id(), command = %command.join(" "), "host process started");
        Ok(Self {
            child: Arc::new(Mutex::new(child)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Child> {
        self.child.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> u32 {
        self.lock().id()
    }

    /// Blocks until the host exits, without holding the lock between polls.
    pub fn wait(&self) -> anyhow::Result<ExitStatus> {
        loop {
            if let Some(status) = self
                .lock()
                .try_wait()
                .context("Failed to poll host process")?
            {
                return Ok(status);
            }
            thread::sleep(Duration::from_millis(200));
        }
    }

    /// Kills the host if it is still running.
    pub fn terminate(&self) {
        let mut child = self.lock();
        match child.try_wait() {
            Ok(Some(_)) => {}
            _ => {
                debug!(pid = child.id(), "terminating host process");
                if let Err(e) = child.kill() {
                    warn!(error = %e, "error terminating host process");
                }
                let _ = child.wait();
            }
        }
    }
}

/// Stops the host process, then re-executes the supervisor.
pub struct HostRestarter<R> {
    host: HostProcess,
    inner: R,
}

impl<R: Restarter> HostRestarter<R> {
    pub fn new(host: HostProcess, inner: R) -> Self {
        Self { host, inner }
    }
}

impl<R: Restarter> Restarter for HostRestarter<R> {
    fn restart(&self) -> anyhow::Result<()> {
        self.host.terminate();
        self.inner.restart()
    }
}
