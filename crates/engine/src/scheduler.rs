//! Dispatch loop
//!
//! A single task consumes every input of the engine: watcher events,
//! reconciliation batches, timer ticks, commands and run completions.
//! Pipeline runs are spawned; the run token in the orchestrator keeps at
//! most one in flight and triggers arriving meanwhile are dropped.

use crate::orchestrator::{Orchestrator, RunState};
use crate::outcome::AttemptOutcome;
use ac_core::{Config, PathFilter, Severity, TriggerKind};
use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Interval};
use tracing::{debug, info, warn};
use watcher::{FsWatcher, IgnoreConfig, PeriodicReconciler, SharedIgnore, WatchEvent};

/// Requests sent to a running scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start a manual commit attempt now
    RunNow,
    /// Flip enabled/disabled
    Toggle,
    Shutdown,
}

/// Reported by a spawned run when it completes
#[derive(Debug, Clone)]
pub struct RunFinished {
    pub trigger: TriggerKind,
    pub outcome: AttemptOutcome,
    pub summary: String,
    pub elapsed: Duration,
}

/// Cloneable handle for sending commands
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<Command>,
}

impl SchedulerHandle {
    pub async fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| anyhow!("scheduler is not running"))
    }

    pub async fn run_now(&self) -> Result<()> {
        self.send(Command::RunNow).await
    }

    pub async fn toggle(&self) -> Result<()> {
        self.send(Command::Toggle).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown).await
    }
}

/// Periods of the interval trigger and the health check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TickPeriods {
    interval: Duration,
    health: Duration,
}

impl From<&Config> for TickPeriods {
    fn from(config: &Config) -> Self {
        Self {
            interval: Duration::from_secs(u64::from(config.triggers.interval_minutes.max(1)) * 60),
            health: Duration::from_secs(config.watcher.health_check_interval_secs.max(1)),
        }
    }
}

impl TickPeriods {
    fn interval_timer(&self) -> Interval {
        interval_at(tokio::time::Instant::now() + self.interval, self.interval)
    }

    fn health_timer(&self) -> Interval {
        interval_at(tokio::time::Instant::now() + self.health, self.health)
    }
}

type ConfigSource = Arc<dyn Fn() -> Result<Config> + Send + Sync>;

pub struct Scheduler {
    orchestrator: Arc<Orchestrator>,
    ignore: Arc<SharedIgnore>,
    config_source: Option<ConfigSource>,
    commands: Option<mpsc::Receiver<Command>>,
    watch_tx: mpsc::Sender<WatchEvent>,
    reconcile_tx: mpsc::Sender<Vec<PathBuf>>,
    finished_tx: mpsc::Sender<RunFinished>,
    receivers: Option<Receivers>,
    watcher: Option<FsWatcher>,
    reconciler: Option<JoinHandle<Result<()>>>,
    stall_warned: bool,
}

struct Receivers {
    watch: mpsc::Receiver<WatchEvent>,
    reconcile: mpsc::Receiver<Vec<PathBuf>>,
    finished: mpsc::Receiver<RunFinished>,
}

impl Scheduler {
    pub fn new(orchestrator: Arc<Orchestrator>, ignore: Arc<SharedIgnore>) -> (Self, SchedulerHandle) {
        let (command_tx, command_rx) = mpsc::channel(16);
        let (watch_tx, watch_rx) = mpsc::channel(1024);
        let (reconcile_tx, reconcile_rx) = mpsc::channel(16);
        let (finished_tx, finished_rx) = mpsc::channel(4);

        orchestrator.set_filter(Arc::clone(&ignore) as Arc<dyn PathFilter>);

        let scheduler = Self {
            orchestrator,
            ignore,
            config_source: None,
            commands: Some(command_rx),
            watch_tx,
            reconcile_tx,
            finished_tx,
            receivers: Some(Receivers {
                watch: watch_rx,
                reconcile: reconcile_rx,
                finished: finished_rx,
            }),
            watcher: None,
            reconciler: None,
            stall_warned: false,
        };

        (scheduler, SchedulerHandle { tx: command_tx })
    }

    /// Re-read configuration from `source` whenever the engine is enabled
    pub fn with_config_source<F>(mut self, source: F) -> Self
    where
        F: Fn() -> Result<Config> + Send + Sync + 'static,
    {
        self.config_source = Some(Arc::new(source));
        self
    }

    /// Run until `Command::Shutdown` or every handle is dropped
    pub async fn run(mut self) -> Result<()> {
        let (Some(mut commands), Some(receivers)) = (self.commands.take(), self.receivers.take())
        else {
            return Err(anyhow!("scheduler already ran"));
        };
        let Receivers {
            watch: mut watch_rx,
            reconcile: mut reconcile_rx,
            finished: mut finished_rx,
        } = receivers;

        if self.orchestrator.is_enabled() {
            self.start_sources();
        }

        let mut periods = TickPeriods::from(self.orchestrator.config().as_ref());
        let mut interval_tick = periods.interval_timer();
        let mut health_tick = periods.health_timer();

        info!("Scheduler started for {}", self.orchestrator.repo_root().display());

        loop {
            tokio::select! {
                Some(event) = watch_rx.recv() => self.on_watch_event(event),
                Some(paths) = reconcile_rx.recv() => self.on_missed_changes(paths),
                Some(finished) = finished_rx.recv() => self.on_run_finished(finished),
                _ = interval_tick.tick() => self.on_interval(),
                _ = health_tick.tick() => self.health_check(),
                command = commands.recv() => match command {
                    Some(Command::RunNow) => self.fire(TriggerKind::Manual),
                    Some(Command::Toggle) => {
                        self.toggle();
                        // A reload may have changed either period
                        let reloaded = TickPeriods::from(self.orchestrator.config().as_ref());
                        if reloaded != periods {
                            debug!("Re-arming timers: {:?}", reloaded);
                            periods = reloaded;
                            interval_tick = periods.interval_timer();
                            health_tick = periods.health_timer();
                        }
                    }
                    Some(Command::Shutdown) | None => break,
                },
            }
        }

        self.stop_sources();

        if matches!(self.orchestrator.run_state(), RunState::Running { .. }) {
            info!("Waiting for the running commit attempt to finish");
            if let Some(finished) = finished_rx.recv().await {
                self.on_run_finished(finished);
            }
        }

        info!("Scheduler stopped");
        Ok(())
    }

    fn on_watch_event(&mut self, event: WatchEvent) {
        if event.is_gitignore_change() {
            match self.ignore.reload() {
                Ok(()) => info!("Reloaded ignore rules"),
                Err(e) => warn!("Failed to reload ignore rules: {}", e),
            }
        }

        let triggers = self.orchestrator.config().triggers.clone();

        if event.is_head_change() {
            if triggers.on_branch_switch {
                self.evaluate_and_fire("branch switch");
            }
            return;
        }

        if self.orchestrator.record_change(&event.path) && triggers.on_save {
            self.evaluate_and_fire("save");
        }
    }

    fn on_missed_changes(&mut self, paths: Vec<PathBuf>) {
        let added = self.orchestrator.record_missed(&paths);
        if added > 0 {
            info!("Reconciliation added {} missed changes", added);
            if self.orchestrator.config().triggers.on_save {
                self.evaluate_and_fire("reconciliation");
            }
        }
    }

    fn on_interval(&mut self) {
        if self.orchestrator.config().triggers.on_interval {
            self.evaluate_and_fire("interval");
        }
    }

    fn on_run_finished(&mut self, finished: RunFinished) {
        self.stall_warned = false;
        info!(
            "{} run finished in {:?}: {}",
            finished.trigger, finished.elapsed, finished.summary
        );
    }

    fn evaluate_and_fire(&mut self, reason: &str) {
        if !self.orchestrator.is_enabled() {
            return;
        }

        let decision = self.orchestrator.evaluate(Instant::now());
        debug!("Trigger evaluation on {}: {}", reason, decision);
        if decision.fire() {
            info!("Trigger fired on {} ({})", reason, decision);
            self.fire(TriggerKind::Auto);
        }
    }

    /// Spawn a run unless one is active
    fn fire(&mut self, trigger: TriggerKind) {
        let Some(guard) = self.orchestrator.try_begin(trigger) else {
            debug!("Commit attempt in progress, dropping {} trigger", trigger);
            return;
        };

        self.stall_warned = false;
        let orchestrator = Arc::clone(&self.orchestrator);
        let finished_tx = self.finished_tx.clone();

        tokio::spawn(async move {
            let started = Instant::now();
            let attempt = orchestrator.run_guarded(guard).await;
            let finished = RunFinished {
                trigger,
                summary: attempt.summary(),
                outcome: attempt.outcome,
                elapsed: started.elapsed(),
            };
            if finished_tx.send(finished).await.is_err() {
                debug!("Scheduler gone before run finished");
            }
        });
    }

    fn toggle(&mut self) {
        if self.orchestrator.toggle() {
            self.reload_config();
            self.start_sources();
            self.orchestrator
                .notifier()
                .notify(Severity::Info, "Auto-commit enabled");
        } else {
            self.stop_sources();
            self.orchestrator
                .notifier()
                .notify(Severity::Info, "Auto-commit disabled");
        }
    }

    fn reload_config(&mut self) {
        let Some(source) = &self.config_source else {
            return;
        };

        match source() {
            Ok(config) => {
                if let Err(e) = self.ignore.update_config(IgnoreConfig::from(&config.watcher)) {
                    warn!("Failed to apply ignore settings: {}", e);
                }
                self.orchestrator.set_config(config);
                info!("Configuration reloaded");
            }
            Err(e) => warn!("Keeping previous configuration: {:#}", e),
        }
    }

    fn health_check(&mut self) {
        if self.orchestrator.is_enabled() {
            if !self.watcher.as_ref().is_some_and(FsWatcher::is_healthy) {
                warn!("File watcher is not running, restarting");
                self.start_watcher();
            }
            if !self.reconciler.as_ref().is_some_and(|h| !h.is_finished()) {
                warn!("Reconciler is not running, restarting");
                self.start_reconciler();
            }
        }

        if let RunState::Running { since, trigger } = self.orchestrator.run_state() {
            let threshold =
                Duration::from_secs(self.orchestrator.config().watcher.stall_warning_secs);
            let elapsed = since.elapsed();
            if elapsed >= threshold && !self.stall_warned {
                self.stall_warned = true;
                self.orchestrator.notifier().notify(
                    Severity::Warning,
                    &format!(
                        "{} commit attempt has been running for {}s",
                        trigger,
                        elapsed.as_secs()
                    ),
                );
            }
        }
    }

    fn start_sources(&mut self) {
        self.start_watcher();
        self.start_reconciler();
    }

    fn stop_sources(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            watcher.stop();
        }
        if let Some(handle) = self.reconciler.take() {
            handle.abort();
        }
    }

    fn start_watcher(&mut self) {
        self.watcher = None;
        let root = self.orchestrator.repo_root().to_path_buf();
        match FsWatcher::start(&root, self.watch_tx.clone()) {
            Ok(watcher) => self.watcher = Some(watcher),
            Err(e) => warn!("Failed to start file watcher: {:#}", e),
        }
    }

    fn start_reconciler(&mut self) {
        if let Some(handle) = self.reconciler.take() {
            handle.abort();
        }

        let interval = Duration::from_secs(
            self.orchestrator
                .config()
                .watcher
                .reconcile_interval_secs
                .max(1),
        );
        let reconciler = PeriodicReconciler::new(
            self.orchestrator.repo_root().to_path_buf(),
            interval,
            Arc::clone(&self.ignore) as Arc<dyn PathFilter>,
            self.reconcile_tx.clone(),
        );
        self.reconciler = Some(tokio::spawn(reconciler.run()));
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop_sources();
    }
}
