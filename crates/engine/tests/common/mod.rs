//! Shared fakes for engine integration tests

#![allow(dead_code)]

use ac_core::{Config, Notifier, Severity};
use async_trait::async_trait;
use engine::{Orchestrator, RetryPolicy};
use git::{ProcessOutput, ProcessRunner, VcsError};
use message::{GenerationError, TextGenerator};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const REPO: &str = "/work/repo";

pub fn ok(stdout: &str) -> ProcessOutput {
    ProcessOutput {
        code: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

pub fn fail(stderr: &str) -> ProcessOutput {
    ProcessOutput {
        code: Some(1),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

/// Git stand-in answering by command prefix
///
/// Scripted outputs are consumed in order; once a prefix runs dry (or has
/// none) a healthy default answer is returned.
type Hook = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
pub struct ScriptedGit {
    scripts: Mutex<Vec<(String, VecDeque<ProcessOutput>)>>,
    hooks: Mutex<Vec<(String, Hook)>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedGit {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, prefix: &str, outputs: Vec<ProcessOutput>) {
        self.scripts
            .lock()
            .push((prefix.to_string(), outputs.into()));
    }

    /// Run `hook` whenever a command with this prefix executes
    pub fn on_call(&self, prefix: &str, hook: impl Fn() + Send + Sync + 'static) {
        self.hooks.lock().push((prefix.to_string(), Box::new(hook)));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    fn default_output(command: &str) -> ProcessOutput {
        if command.starts_with("rev-parse --is-inside-work-tree") {
            ok("true\n")
        } else if command.starts_with("symbolic-ref") {
            ok("main\n")
        } else if command.starts_with("rev-parse --abbrev-ref") {
            ok("origin/main\n")
        } else if command.starts_with("status") {
            ok(" M src/lib.rs\n?? notes.md\n")
        } else if command.starts_with("commit") {
            ok("[main 1a2b3c4] scripted\n 2 files changed\n")
        } else {
            ok("")
        }
    }
}

#[async_trait]
impl ProcessRunner for ScriptedGit {
    async fn run(
        &self,
        _cwd: &Path,
        args: &[String],
        _timeout: Duration,
    ) -> Result<ProcessOutput, VcsError> {
        // Give concurrent tasks a chance to interleave
        tokio::task::yield_now().await;

        let command = args.join(" ");
        self.calls.lock().push(command.clone());

        for (prefix, hook) in self.hooks.lock().iter() {
            if command.starts_with(prefix.as_str()) {
                hook();
            }
        }

        let scripted = self
            .scripts
            .lock()
            .iter_mut()
            .filter(|(prefix, _)| command.starts_with(prefix.as_str()))
            .find_map(|(_, outputs)| outputs.pop_front());

        Ok(scripted.unwrap_or_else(|| Self::default_output(&command)))
    }
}

/// Backend returning a fixed answer
pub struct FixedBackend(pub Result<String, GenerationError>);

#[async_trait]
impl TextGenerator for FixedBackend {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        self.0.clone()
    }
}

pub fn ai_backend() -> Arc<dyn TextGenerator> {
    Arc::new(FixedBackend(Ok("feat: scripted change".to_string())))
}

pub fn offline_backend() -> Arc<dyn TextGenerator> {
    Arc::new(FixedBackend(Err(GenerationError::Network(
        "connection refused".to_string(),
    ))))
}

/// Notifier that remembers everything
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<(Severity, String)>>,
}

impl RecordingNotifier {
    pub fn with(&self, severity: Severity) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|(s, _)| *s == severity)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        self.events.lock().push((severity, message.to_string()));
    }
}

pub struct Harness {
    pub git: Arc<ScriptedGit>,
    pub notifier: Arc<RecordingNotifier>,
    pub orchestrator: Arc<Orchestrator>,
}

pub fn harness(config: Config, backend: Arc<dyn TextGenerator>) -> Harness {
    harness_at(REPO, config, backend)
}

pub fn harness_at(
    repo: impl AsRef<Path>,
    config: Config,
    backend: Arc<dyn TextGenerator>,
) -> Harness {
    let git = ScriptedGit::new();
    let notifier = Arc::new(RecordingNotifier::default());
    let orchestrator = Orchestrator::builder(repo.as_ref(), config)
        .runner(git.clone())
        .backend(backend)
        .notifier(notifier.clone())
        .policy(RetryPolicy::default())
        .enabled(true)
        .build();

    Harness {
        git,
        notifier,
        orchestrator,
    }
}
