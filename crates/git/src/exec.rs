//! Git process execution
//!
//! Every git invocation goes through [`VcsExecutor::run`]. The executor owns
//! two policies: a hard ceiling on captured output (overflow is an error, never
//! a silent truncation) and healing of a stale `index.lock` left behind by a
//! crashed git process.

use async_trait::async_trait;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

/// Per-stream output ceiling (50 MiB)
pub const MAX_OUTPUT_BYTES: usize = 50 * 1024 * 1024;

/// Default timeout for one git invocation
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Pause between removing a stale lock and retrying
pub const LOCK_HEAL_DELAY: Duration = Duration::from_millis(500);

/// An `index.lock` younger than this belongs to a live git process
pub const STALE_LOCK_AGE: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("not a git repository: {}", .path.display())]
    RepoNotFound { path: PathBuf },

    #[error("git output exceeded {limit} bytes")]
    OutputTooLarge { limit: usize },

    #[error("git index is locked (`{command}`): {}", .stderr.trim())]
    LockContention { command: String, stderr: String },

    #[error("`{command}` failed ({}): {}", exit_label(.code), .stderr.trim())]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("`{command}` timed out after {after:?}")]
    Timeout { command: String, after: Duration },

    #[error("failed to run git: {0}")]
    Io(#[from] io::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit {}", code),
        None => "killed by signal".to_string(),
    }
}

impl VcsError {
    /// Combined stdout and stderr of a failed command, lowercased
    ///
    /// Git prints some refusals (e.g. "nothing to commit") on stdout.
    pub fn output_text(&self) -> String {
        match self {
            VcsError::CommandFailed { stdout, stderr, .. } => {
                format!("{}\n{}", stdout, stderr).to_lowercase()
            }
            VcsError::LockContention { stderr, .. } => stderr.to_lowercase(),
            other => other.to_string().to_lowercase(),
        }
    }
}

/// Raw result of one process run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Spawns git processes
///
/// A non-zero exit is an `Ok` output; errors are reserved for spawn
/// failures, timeouts and output overflow.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        cwd: &Path,
        args: &[String],
        timeout: Duration,
    ) -> Result<ProcessOutput, VcsError>;
}

/// Production runner backed by `tokio::process`
#[derive(Debug, Clone)]
pub struct GitProcess {
    program: PathBuf,
    max_output: usize,
}

impl GitProcess {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("git"),
            max_output: MAX_OUTPUT_BYTES,
        }
    }

    /// Override the per-stream output ceiling
    pub fn with_max_output(mut self, bytes: usize) -> Self {
        self.max_output = bytes;
        self
    }
}

impl Default for GitProcess {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessRunner for GitProcess {
    async fn run(
        &self,
        cwd: &Path,
        args: &[String],
        timeout: Duration,
    ) -> Result<ProcessOutput, VcsError> {
        let mut child = tokio::process::Command::new(&self.program)
            .args(args)
            .current_dir(cwd)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "stderr not captured"))?;

        let limit = self.max_output;
        let collect = async {
            let (out, err) =
                tokio::try_join!(read_capped(stdout, limit), read_capped(stderr, limit))?;
            let status = child.wait().await?;
            Ok::<_, VcsError>(ProcessOutput {
                code: status.code(),
                stdout: String::from_utf8_lossy(&out).into_owned(),
                stderr: String::from_utf8_lossy(&err).into_owned(),
            })
        };

        // Dropping the child on any early return kills it
        match tokio::time::timeout(timeout, collect).await {
            Ok(result) => result,
            Err(_) => Err(VcsError::Timeout {
                command: format!("git {}", args.join(" ")),
                after: timeout,
            }),
        }
    }
}

async fn read_capped<R: AsyncRead + Unpin>(mut reader: R, limit: usize) -> Result<Vec<u8>, VcsError> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(buf);
        }
        if buf.len() + n > limit {
            return Err(VcsError::OutputTooLarge { limit });
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Runs git subcommands against one repository
#[derive(Clone)]
pub struct VcsExecutor {
    repo_root: PathBuf,
    runner: Arc<dyn ProcessRunner>,
    timeout: Duration,
    heal_delay: Duration,
    stale_after: Duration,
}

impl VcsExecutor {
    /// Executor using the real `git` binary
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self::with_runner(repo_root, Arc::new(GitProcess::new()))
    }

    pub fn with_runner(repo_root: impl Into<PathBuf>, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            repo_root: repo_root.into(),
            runner,
            timeout: DEFAULT_TIMEOUT,
            heal_delay: LOCK_HEAL_DELAY,
            stale_after: STALE_LOCK_AGE,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Run `git <args>` and return its stdout
    ///
    /// A failure carrying a lock signature is healed at most once. Only
    /// `<git-dir>/index.lock` is ever removed, and only when it is older than
    /// the stale age; the command is then retried after a short delay. Any
    /// other lock named by git is left alone and reported as contention.
    pub async fn run(&self, args: &[&str]) -> Result<String, VcsError> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        let command = format!("git {}", args.join(" "));

        let output = self.spawn(&command, &args).await?;
        if output.success() {
            return Ok(output.stdout);
        }

        if !is_lock_error(&output.stderr) {
            return Err(failed(command, output));
        }

        let Some(lock) = self.stale_index_lock(&output.stderr) else {
            return Err(VcsError::LockContention {
                command,
                stderr: output.stderr,
            });
        };

        warn!(
            "Removing stale git lock {} (repo: {})",
            lock.display(),
            self.repo_root.display()
        );
        if let Err(e) = std::fs::remove_file(&lock) {
            warn!("Failed to remove {}: {}", lock.display(), e);
            return Err(VcsError::LockContention {
                command,
                stderr: output.stderr,
            });
        }
        tokio::time::sleep(self.heal_delay).await;

        let retry = self.spawn(&command, &args).await?;
        if retry.success() {
            return Ok(retry.stdout);
        }
        if is_lock_error(&retry.stderr) {
            return Err(VcsError::LockContention {
                command,
                stderr: retry.stderr,
            });
        }
        Err(failed(command, retry))
    }

    async fn spawn(&self, command: &str, args: &[String]) -> Result<ProcessOutput, VcsError> {
        debug!("{} (in {})", command, self.repo_root.display());
        self.runner.run(&self.repo_root, args, self.timeout).await
    }

    /// `<git-dir>/index.lock`, if git complained about it and it is stale
    fn stale_index_lock(&self, stderr: &str) -> Option<PathBuf> {
        if let Some(named) = quoted_lock_path(stderr) {
            if named.file_name() != Some(OsStr::new("index.lock")) {
                debug!("Not healing foreign lock {}", named.display());
                return None;
            }
        }

        let lock = git_dir(&self.repo_root).join("index.lock");
        let modified = match std::fs::metadata(&lock).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(_) => {
                debug!("Lock signature without artifact at {}", lock.display());
                return None;
            }
        };

        // A clock skewed into the future counts as fresh
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age < self.stale_after {
            debug!("{} is {:?} old, leaving it to its owner", lock.display(), age);
            return None;
        }
        Some(lock)
    }
}

fn failed(command: String, output: ProcessOutput) -> VcsError {
    VcsError::CommandFailed {
        command,
        code: output.code,
        stdout: output.stdout,
        stderr: output.stderr,
    }
}

/// Check stderr for a git lock signature
pub fn is_lock_error(stderr: &str) -> bool {
    let text = stderr.to_lowercase();
    text.contains("index.lock")
        || (text.contains("unable to create") && text.contains("file exists"))
        || text.contains("another git process")
}

fn quoted_lock_path(stderr: &str) -> Option<PathBuf> {
    stderr
        .split('\'')
        .skip(1)
        .step_by(2)
        .find(|quoted| quoted.ends_with(".lock"))
        .map(PathBuf::from)
}

/// Resolve the git directory of a working tree
///
/// Follows the `gitdir:` indirection used by worktrees and submodules.
pub fn git_dir(repo_root: &Path) -> PathBuf {
    let dot_git = repo_root.join(".git");
    if dot_git.is_file() {
        if let Ok(content) = std::fs::read_to_string(&dot_git) {
            if let Some(dir) = content.trim().strip_prefix("gitdir:") {
                let dir = PathBuf::from(dir.trim());
                return if dir.is_absolute() {
                    dir
                } else {
                    repo_root.join(dir)
                };
            }
        }
    }
    dot_git
}
