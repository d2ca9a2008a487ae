//! Auto-commit orchestration
//!
//! This crate provides:
//! - `CommitPipeline`: one commit attempt (stage, describe, commit, push)
//!   with per-step fallback and bounded retries
//! - `Orchestrator`: the shared context (tracker, last commit time, run
//!   token, enabled flag) with explicit start/stop
//! - `Scheduler`: the dispatch loop over watcher events, timers and commands

pub mod orchestrator;
pub mod outcome;
pub mod pipeline;
pub mod scheduler;
pub mod stage;

pub use orchestrator::{Orchestrator, OrchestratorBuilder, RunGuard, RunState};
pub use outcome::{
    AttemptOutcome, CommitAttempt, Degradation, DegradationKind, PipelineError, PushStatus,
    RetryCounts, Step, StepOutcome,
};
pub use pipeline::{CommitPipeline, RetryPolicy};
pub use scheduler::{Command, RunFinished, Scheduler, SchedulerHandle};
pub use stage::{SelectAll, StageSelector};
