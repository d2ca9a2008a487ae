//! Results of a commit attempt
//!
//! Each pipeline step ends in a [`StepOutcome`]. Only three things are
//! fatal (missing repository, a manual run with nothing to commit, commit
//! retries exhausted); every other failure is recorded as a [`Degradation`]
//! and the attempt carries on.

use ac_core::TriggerKind;
use message::GeneratedMessage;
use std::fmt;
use std::time::SystemTime;
use thiserror::Error;

/// Pipeline steps, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    VerifyRepo,
    Stage,
    Status,
    EmptyCheck,
    Diff,
    Message,
    BranchReconcile,
    Commit,
    Push,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::VerifyRepo => "verify-repo",
            Step::Stage => "stage",
            Step::Status => "status",
            Step::EmptyCheck => "empty-check",
            Step::Diff => "diff",
            Step::Message => "message",
            Step::BranchReconcile => "branch",
            Step::Commit => "commit",
            Step::Push => "push",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    Degraded(String),
    Fatal(String),
}

/// Fatal pipeline errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("not a git repository: {0}")]
    RepoNotFound(String),

    #[error("no changes to commit")]
    NothingToCommit,

    #[error("commit failed after {attempts} attempts: {reason}")]
    CommitFailure { attempts: u32, reason: String },

    #[error("a commit attempt is already running")]
    Busy,
}

/// Category of a non-fatal failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradationKind {
    StageFailure,
    StatusUnavailable,
    DiffUnavailable,
    GenerationFailure,
    BranchFailure,
    PushFailure,
}

impl fmt::Display for DegradationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DegradationKind::StageFailure => "staging",
            DegradationKind::StatusUnavailable => "status",
            DegradationKind::DiffUnavailable => "diff",
            DegradationKind::GenerationFailure => "message generation",
            DegradationKind::BranchFailure => "branch",
            DegradationKind::PushFailure => "push",
        };
        f.write_str(name)
    }
}

/// A warning surfaced to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Degradation {
    pub kind: DegradationKind,
    pub detail: String,
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} degraded: {}", self.kind, self.detail)
    }
}

/// Result of the push step
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PushStatus {
    /// `auto_push` is off, or nothing was committed
    #[default]
    Skipped,
    Pushed {
        /// Transient-failure retries used
        retries: u32,
        /// Set when a rejected push needed `pull --rebase` first
        note: Option<String>,
    },
    Failed { reason: String },
}

/// Bounded retry counters, one per retrying step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryCounts {
    pub stage: u32,
    pub commit: u32,
    pub push: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Committed,
    NothingToCommit,
    Failed(PipelineError),
}

/// Record of one pipeline run (never persisted)
#[derive(Debug, Clone)]
pub struct CommitAttempt {
    pub trigger: TriggerKind,
    pub started_at: SystemTime,
    pub finished_at: Option<SystemTime>,
    pub steps: Vec<(Step, StepOutcome)>,
    pub retries: RetryCounts,
    pub degradations: Vec<Degradation>,
    pub message: Option<GeneratedMessage>,
    pub branch: Option<String>,
    pub commit_summary: Option<String>,
    pub push: PushStatus,
    pub outcome: AttemptOutcome,
}

impl CommitAttempt {
    pub fn new(trigger: TriggerKind) -> Self {
        Self {
            trigger,
            started_at: SystemTime::now(),
            finished_at: None,
            steps: Vec::new(),
            retries: RetryCounts::default(),
            degradations: Vec::new(),
            message: None,
            branch: None,
            commit_summary: None,
            push: PushStatus::Skipped,
            // Replaced by `finish`
            outcome: AttemptOutcome::NothingToCommit,
        }
    }

    pub(crate) fn succeed(&mut self, step: Step) {
        self.steps.push((step, StepOutcome::Success));
    }

    pub(crate) fn degrade(&mut self, step: Step, kind: DegradationKind, detail: impl Into<String>) {
        let detail = detail.into();
        self.steps.push((step, StepOutcome::Degraded(detail.clone())));
        self.degradations.push(Degradation { kind, detail });
    }

    pub(crate) fn fail(&mut self, step: Step, error: &PipelineError) {
        self.steps.push((step, StepOutcome::Fatal(error.to_string())));
    }

    pub(crate) fn finish(&mut self, outcome: AttemptOutcome) {
        self.outcome = outcome;
        self.finished_at = Some(SystemTime::now());
    }

    pub fn is_committed(&self) -> bool {
        self.outcome == AttemptOutcome::Committed
    }

    pub fn error(&self) -> Option<&PipelineError> {
        match &self.outcome {
            AttemptOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn outcome_of(&self, step: Step) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .rev()
            .find(|(s, _)| *s == step)
            .map(|(_, outcome)| outcome)
    }

    /// One-line human summary
    pub fn summary(&self) -> String {
        match &self.outcome {
            AttemptOutcome::Committed => {
                let message = self
                    .message
                    .as_ref()
                    .map(|m| m.text.as_str())
                    .unwrap_or_default();
                let mut line = format!("Committed: {}", message);
                match &self.push {
                    PushStatus::Pushed { note: Some(note), .. } => {
                        line.push_str(&format!(" (pushed after {})", note))
                    }
                    PushStatus::Pushed { note: None, .. } => line.push_str(" (pushed)"),
                    PushStatus::Failed { .. } => line.push_str(" (push failed)"),
                    PushStatus::Skipped => {}
                }
                line
            }
            AttemptOutcome::NothingToCommit => "Nothing to commit".to_string(),
            AttemptOutcome::Failed(e) => format!("Commit attempt failed: {}", e),
        }
    }
}
