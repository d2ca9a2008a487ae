//! Orchestrator context
//!
//! Owns the process-wide state of the engine: the change tracker, the time
//! of the last successful commit, the enabled flag and the run token. It is
//! shared by `Arc` between the scheduler and spawned pipeline runs.

use crate::outcome::{AttemptOutcome, CommitAttempt, PipelineError};
use crate::pipeline::{CommitPipeline, RetryPolicy};
use crate::stage::{SelectAll, StageSelector};
use ac_core::{
    ChangeMark, ChangeTracker, Config, NoFilter, Notifier, PathFilter, Severity, TracingNotifier,
    TriggerDecision, TriggerKind,
};
use git::{Git, ProcessRunner, VcsExecutor};
use message::{MessageGenerator, TextGenerator};
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Whether a commit attempt is in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running { since: Instant, trigger: TriggerKind },
}

/// Held for the lifetime of one pipeline run; releases the token on drop
///
/// Also remembers the tracker position at acquisition; a successful run only
/// clears changes recorded before it.
pub struct RunGuard {
    orchestrator: Arc<Orchestrator>,
    trigger: TriggerKind,
    mark: ChangeMark,
}

impl RunGuard {
    pub fn trigger(&self) -> TriggerKind {
        self.trigger
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        *self.orchestrator.state.lock() = RunState::Idle;
    }
}

pub struct Orchestrator {
    repo_root: PathBuf,
    config: RwLock<Arc<Config>>,
    git: Git,
    backend: RwLock<Arc<dyn TextGenerator>>,
    backend_override: bool,
    selector: Arc<dyn StageSelector>,
    notifier: Arc<dyn Notifier>,
    policy: RetryPolicy,
    tracker: Mutex<ChangeTracker>,
    last_commit: Mutex<Option<Instant>>,
    state: Mutex<RunState>,
    enabled: AtomicBool,
}

impl Orchestrator {
    pub fn builder(repo_root: impl Into<PathBuf>, config: Config) -> OrchestratorBuilder {
        OrchestratorBuilder::new(repo_root.into(), config)
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn git(&self) -> &Git {
        &self.git
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config.read())
    }

    /// Replace the configuration; runs already started keep their snapshot
    pub fn set_config(&self, config: Config) {
        if !self.backend_override {
            *self.backend.write() = message::from_config(&config.ai);
        }
        *self.config.write() = Arc::new(config);
    }

    pub fn set_filter(&self, filter: Arc<dyn PathFilter>) {
        self.tracker.lock().set_filter(filter);
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    // Lifecycle

    /// Enable automatic commits
    pub fn start(&self) {
        if !self.enabled.swap(true, Ordering::SeqCst) {
            info!("Auto-commit enabled for {}", self.repo_root.display());
        }
    }

    /// Disable automatic commits and forget pending state
    pub fn stop(&self) {
        if self.enabled.swap(false, Ordering::SeqCst) {
            info!("Auto-commit disabled for {}", self.repo_root.display());
        }
        self.tracker.lock().clear();
        *self.last_commit.lock() = None;
    }

    /// Flip the enabled flag; returns the new state
    pub fn toggle(&self) -> bool {
        if self.is_enabled() {
            self.stop();
            false
        } else {
            self.start();
            true
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    // Change tracking

    /// Record a changed path; ignored paths and a disabled engine drop it
    pub fn record_change(&self, path: &Path) -> bool {
        self.is_enabled() && self.tracker.lock().record(path)
    }

    /// Record paths found by reconciliation, skipping ones already tracked
    pub fn record_missed(&self, paths: &[PathBuf]) -> usize {
        if !self.is_enabled() {
            return 0;
        }
        let mut tracker = self.tracker.lock();
        let mut added = 0;
        for path in paths {
            if !tracker.contains(path) && tracker.record(path) {
                added += 1;
            }
        }
        added
    }

    /// (distinct paths, raw events) pending
    pub fn pending(&self) -> (usize, usize) {
        let tracker = self.tracker.lock();
        (tracker.len(), tracker.events())
    }

    pub fn last_commit(&self) -> Option<Instant> {
        *self.last_commit.lock()
    }

    // Triggering

    /// Evaluate the trigger rules against the current state
    pub fn evaluate(&self, now: Instant) -> TriggerDecision {
        let config = self.config();
        let last_commit = self.last_commit();
        let tracker = self.tracker.lock();
        TriggerDecision::evaluate(&tracker, &config.triggers, last_commit, now)
    }

    pub fn run_state(&self) -> RunState {
        *self.state.lock()
    }

    /// Take the run token, or `None` if a run is active
    pub fn try_begin(self: &Arc<Self>, trigger: TriggerKind) -> Option<RunGuard> {
        let mut state = self.state.lock();
        if let RunState::Running { .. } = *state {
            return None;
        }
        *state = RunState::Running {
            since: Instant::now(),
            trigger,
        };
        let mark = self.tracker.lock().mark();
        Some(RunGuard {
            orchestrator: Arc::clone(self),
            trigger,
            mark,
        })
    }

    /// Acquire the token and run one attempt
    pub async fn execute(self: &Arc<Self>, trigger: TriggerKind) -> Result<CommitAttempt, PipelineError> {
        let guard = self.try_begin(trigger).ok_or_else(|| {
            debug!("Run in progress, dropping {} trigger", trigger);
            PipelineError::Busy
        })?;
        Ok(self.run_guarded(guard).await)
    }

    /// Run one attempt while holding `guard`
    pub async fn run_guarded(&self, guard: RunGuard) -> CommitAttempt {
        let config = self.config();
        let pipeline = CommitPipeline::new(
            self.git.clone(),
            MessageGenerator::new(Arc::clone(&self.backend.read()), config.message.clone()),
            Arc::clone(&self.selector),
            Arc::clone(&config),
            self.policy,
        );

        let attempt = pipeline.run(guard.trigger()).await;
        self.apply(&attempt, &config, guard.mark);
        drop(guard);
        attempt
    }

    /// Update shared state and notify after a run
    fn apply(&self, attempt: &CommitAttempt, config: &Config, mark: ChangeMark) {
        match &attempt.outcome {
            AttemptOutcome::Committed => {
                let cleared = self.tracker.lock().clear_through(mark);
                *self.last_commit.lock() = Some(Instant::now());
                info!("{} ({} tracked files cleared)", attempt.summary(), cleared.len());
                if config.notifications.show_success || attempt.trigger == TriggerKind::Manual {
                    self.notifier.notify(Severity::Info, &attempt.summary());
                }
            }
            AttemptOutcome::NothingToCommit => {
                self.tracker.lock().clear_through(mark);
                debug!("Nothing to commit, tracker cleared");
            }
            AttemptOutcome::Failed(e) => {
                self.notifier.notify(Severity::Error, &e.to_string());
            }
        }

        if config.notifications.show_warnings {
            for degradation in &attempt.degradations {
                self.notifier.notify(Severity::Warning, &degradation.to_string());
            }
        }
    }
}

/// Assembles an [`Orchestrator`]; every collaborator has a production default
pub struct OrchestratorBuilder {
    repo_root: PathBuf,
    config: Config,
    runner: Option<Arc<dyn ProcessRunner>>,
    backend: Option<Arc<dyn TextGenerator>>,
    selector: Arc<dyn StageSelector>,
    notifier: Arc<dyn Notifier>,
    filter: Arc<dyn PathFilter>,
    policy: RetryPolicy,
    enabled: Option<bool>,
}

impl OrchestratorBuilder {
    fn new(repo_root: PathBuf, config: Config) -> Self {
        Self {
            repo_root,
            config,
            runner: None,
            backend: None,
            selector: Arc::new(SelectAll),
            notifier: Arc::new(TracingNotifier),
            filter: Arc::new(NoFilter),
            policy: RetryPolicy::default(),
            enabled: None,
        }
    }

    pub fn runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Fixed backend instead of the one selected by configuration
    pub fn backend(mut self, backend: Arc<dyn TextGenerator>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn selector(mut self, selector: Arc<dyn StageSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn filter(mut self, filter: Arc<dyn PathFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Initial enabled state (defaults to `config.enabled`)
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn build(self) -> Arc<Orchestrator> {
        let executor = match self.runner {
            Some(runner) => VcsExecutor::with_runner(&self.repo_root, runner),
            None => VcsExecutor::new(&self.repo_root),
        };
        let backend_override = self.backend.is_some();
        let backend = self
            .backend
            .unwrap_or_else(|| message::from_config(&self.config.ai));
        let enabled = self.enabled.unwrap_or(self.config.enabled);

        Arc::new(Orchestrator {
            git: Git::new(executor),
            repo_root: self.repo_root,
            config: RwLock::new(Arc::new(self.config)),
            backend: RwLock::new(backend),
            backend_override,
            selector: self.selector,
            notifier: self.notifier,
            policy: self.policy,
            tracker: Mutex::new(ChangeTracker::new(self.filter)),
            last_commit: Mutex::new(None),
            state: Mutex::new(RunState::Idle),
            enabled: AtomicBool::new(enabled),
        })
    }
}
