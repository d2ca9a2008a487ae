//! Daemon lifecycle management
//!
//! The daemon is one process per repository: it holds the lock, runs the
//! scheduler loop and maps signals onto scheduler commands
//! (SIGTERM/SIGINT → shutdown, SIGUSR1 → toggle, SIGUSR2 → commit now).

use crate::locks::{self, DaemonLock, LockContent};
use crate::util;
use ac_core::Config;
use anyhow::{Context, Result};
use engine::{Orchestrator, Scheduler, SchedulerHandle};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal::unix::{signal, Signal as SignalStream, SignalKind};
use tracing::{info, warn};
use watcher::{IgnoreConfig, IgnoreRules, SharedIgnore};

/// The daemon serving `repo_root`, if one is alive
pub fn running(repo_root: &Path) -> Option<LockContent> {
    locks::running_daemon(&util::daemon_dir(repo_root))
}

/// Deliver `sig` to the daemon process
pub fn send_signal(daemon: &LockContent, sig: Signal) -> Result<()> {
    let pid = i32::try_from(daemon.pid).context("Invalid daemon pid")?;
    kill(Pid::from_raw(pid), sig)
        .with_context(|| format!("Failed to signal daemon (pid {})", daemon.pid))
}

struct Signals {
    terminate: SignalStream,
    interrupt: SignalStream,
    toggle: SignalStream,
    run_now: SignalStream,
}

impl Signals {
    fn install() -> Result<Self> {
        Ok(Self {
            terminate: signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?,
            interrupt: signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?,
            toggle: signal(SignalKind::user_defined1())
                .context("Failed to install SIGUSR1 handler")?,
            run_now: signal(SignalKind::user_defined2())
                .context("Failed to install SIGUSR2 handler")?,
        })
    }

    /// Forward signals to the scheduler until it is told to stop
    async fn forward(mut self, handle: SchedulerHandle) {
        loop {
            let result = tokio::select! {
                _ = self.terminate.recv() => {
                    info!("SIGTERM received, shutting down");
                    handle.shutdown().await.map(|_| true)
                }
                _ = self.interrupt.recv() => {
                    info!("SIGINT received, shutting down");
                    handle.shutdown().await.map(|_| true)
                }
                _ = self.toggle.recv() => {
                    info!("SIGUSR1 received, toggling");
                    handle.toggle().await.map(|_| false)
                }
                _ = self.run_now.recv() => {
                    info!("SIGUSR2 received, committing now");
                    handle.run_now().await.map(|_| false)
                }
            };

            match result {
                Ok(false) => {}
                Ok(true) => break,
                Err(e) => {
                    warn!("Signal not delivered: {}", e);
                    break;
                }
            }
        }
    }
}

/// Run the daemon in the current process until shut down
pub async fn run(repo_root: PathBuf) -> Result<()> {
    // Before the lock is visible, so an early `ac stop` is never fatal
    let signals = Signals::install()?;
    let lock = DaemonLock::acquire(&util::daemon_dir(&repo_root))?;

    let config = Config::load(&repo_root).context("Failed to load configuration")?;
    info!(
        "Starting daemon for {} (pid {}, ai backend {})",
        repo_root.display(),
        std::process::id(),
        config.ai.provider.as_str()
    );

    let rules = IgnoreRules::load(&repo_root, IgnoreConfig::from(&config.watcher))
        .context("Failed to load ignore rules")?;

    let orchestrator = Orchestrator::builder(&repo_root, config).build();
    orchestrator
        .git()
        .verify_repo()
        .await
        .context("Cannot start daemon")?;

    let (scheduler, handle) = Scheduler::new(
        Arc::clone(&orchestrator),
        Arc::new(SharedIgnore::new(rules)),
    );
    let root = repo_root.clone();
    let scheduler = scheduler
        .with_config_source(move || Config::load(&root).map_err(anyhow::Error::from));

    let forwarder = tokio::spawn(signals.forward(handle));
    let result = scheduler.run().await;
    forwarder.abort();

    lock.release()?;
    info!("Daemon stopped");
    result
}
