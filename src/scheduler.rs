//! Background polling loop.
//!
//! A [`Scheduler`] owns at most one worker thread. The thread runs
//! check-and-apply, reacts to an applied update, and then waits on a stop
//! channel for the configured interval. Stopping is cooperative: a request is
//! seen when the worker next waits, never in the middle of a git call.

use crate::constants::{ERROR_RETRY_INTERVAL, MIN_CHECK_INTERVAL, STOP_GRACE_PERIOD};
use crate::hooks::{Notifier, Restarter};
use crate::updater::{Status, Updater};
use anyhow::Context;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Collaborators invoked after an update has been applied.
pub struct Hooks {
    pub notifier: Box<dyn Notifier>,
    pub restarter: Box<dyn Restarter>,
}

struct Worker {
    running: Arc<AtomicBool>,
    stop_tx: Sender<()>,
    done_rx: Receiver<()>,
    handle: JoinHandle<()>,
}

struct LoopContext {
    updater: Arc<Updater>,
    hooks: Arc<Hooks>,
    running: Arc<AtomicBool>,
    retry_interval: Duration,
}

pub struct Scheduler {
    updater: Arc<Updater>,
    hooks: Arc<Hooks>,
    worker: Mutex<Option<Worker>>,
    retry_interval: Duration,
    grace_period: Duration,
}

impl Scheduler {
    pub fn new(updater: Arc<Updater>, hooks: Hooks) -> Self {
        Self {
            updater,
            hooks: Arc::new(hooks),
            worker: Mutex::new(None),
            retry_interval: ERROR_RETRY_INTERVAL,
            grace_period: STOP_GRACE_PERIOD,
        }
    }

    /// Overrides the pause after a failed iteration.
    #[must_use]
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Overrides how long [`Scheduler::stop`] waits for the worker.
    #[must_use]
    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.lock_worker()
            .as_ref()
            .is_some_and(|w| w.running.load(Ordering::SeqCst))
    }

    pub fn status(&self) -> Status {
        self.updater.status(self.is_running())
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<Worker>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawns the worker thread and returns immediately.
    ///
    /// Returns `false` without spawning when a worker thread is still alive,
    /// including one that outlived a timed-out [`Scheduler::stop`], or when
    /// auto-update is disabled in the settings.
    pub fn start(&self) -> bool {
        let mut worker = self.lock_worker();
        if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            warn!("auto-update loop already running");
            return false;
        }

        let settings = self.updater.settings();
        if !settings.enabled {
            info!("auto-update is disabled in settings");
            return false;
        }

        let (stop_tx, stop_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();
        // Each worker owns its flag so a stale thread cannot clear a newer one.
        let running = Arc::new(AtomicBool::new(true));
        let ctx = LoopContext {
            updater: Arc::clone(&self.updater),
            hooks: Arc::clone(&self.hooks),
            running: Arc::clone(&running),
            retry_interval: self.retry_interval,
        };

        let spawned = thread::Builder::new()
            .name("auto-update".to_string())
            .spawn(move || {
                run_loop(&ctx, &stop_rx);
                ctx.running.store(false, Ordering::SeqCst);
                let _ = done_tx.send(());
            });

        match spawned {
            Ok(handle) => {
                *worker = Some(Worker {
                    running,
                    stop_tx,
                    done_rx,
                    handle,
                });
                info!(
                    interval_secs = settings.check_interval_seconds,
                    "auto-update started"
                );
                true
            }
            Err(e) => {
                error!(error = %e, "failed to spawn auto-update thread");
                false
            }
        }
    }

    /// Asks the worker to exit and waits up to the grace period.
    ///
    /// Returns whether the worker exited in time. A worker that is still busy
    /// in a git call is left to finish on its own and keeps its slot, so
    /// [`Scheduler::start`] refuses until it has exited. The slot stays locked
    /// for the wait.
    pub fn stop(&self) -> bool {
        let mut slot = self.lock_worker();
        let Some(worker) = slot.as_ref() else {
            return true;
        };
        worker.running.store(false, Ordering::SeqCst);
        let _ = worker.stop_tx.send(());

        match worker.done_rx.recv_timeout(self.grace_period) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(worker) = slot.take() {
                    let _ = worker.handle.join();
                }
                info!("auto-update stopped");
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    grace_secs = self.grace_period.as_secs_f64(),
                    "auto-update loop did not stop within grace period"
                );
                false
            }
        }
    }

    /// Blocks until the worker exits on its own.
    pub fn wait(&self) {
        let worker = self.lock_worker().take();
        if let Some(worker) = worker {
            let _ = worker.handle.join();
        }
    }
}

fn run_loop(ctx: &LoopContext, stop_rx: &Receiver<()>) {
    while ctx.running.load(Ordering::SeqCst) {
        let pause = match panic::catch_unwind(AssertUnwindSafe(|| iteration(ctx))) {
            Ok(Ok(())) => {
                let secs = ctx.updater.settings().check_interval_seconds;
                Duration::from_secs(secs).max(MIN_CHECK_INTERVAL)
            }
            Ok(Err(e)) => {
                error!("error in auto-update loop: {:#}", e);
                ctx.retry_interval
            }
            Err(_) => {
                error!("auto-update iteration panicked");
                ctx.retry_interval
            }
        };

        match stop_rx.recv_timeout(pause) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("auto-update loop exited");
}

fn iteration(ctx: &LoopContext) -> anyhow::Result<()> {
    let result = ctx.updater.check_and_update();
    if !(result.success() && result.updated()) {
        debug!(
            success = result.success(),
            message = result.message(),
            "no update applied"
        );
        return Ok(());
    }

    info!(message = result.message(), "auto-update applied");
    let settings = ctx.updater.settings();

    if settings.notify_on_update {
        let title = format!("{} Update", settings.project_name);
        let body = format!("{} updated successfully!", settings.project_name);
        if let Err(e) = ctx.hooks.notifier.notify(&title, &body) {
            warn!("error showing notification: {:#}", e);
        }
    }

    if settings.auto_restart {
        info!("auto-restart enabled, restarting application");
        ctx.hooks
            .restarter
            .restart()
            .context("Failed to restart application")?;
    }
    Ok(())
}
