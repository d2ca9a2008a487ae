//! Typed git operations used by the commit pipeline
//!
//! Thin wrappers over [`VcsExecutor`]: each builds an argv vector (no shell,
//! so messages and paths need no escaping) and interprets the output.

use crate::exec::{VcsError, VcsExecutor};
use crate::status::{parse_porcelain, StatusEntry};
use std::path::Path;

/// Result of `git commit`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitResult {
    /// A commit was created; `summary` is git's first output line
    Committed { summary: String },
    /// The index had nothing to record
    NothingToCommit,
}

/// How a failed push should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushFailureKind {
    /// Network trouble; worth retrying with backoff
    Transient,
    /// Remote has commits we don't (non-fast-forward)
    Rejected,
    /// Anything else (auth, hooks, missing remote)
    Other,
}

const TRANSIENT_SIGNATURES: &[&str] = &[
    "timed out",
    "timeout",
    "could not resolve host",
    "connection refused",
    "connection reset",
    "network is unreachable",
    "network unreachable",
];

const REJECTED_SIGNATURES: &[&str] = &[
    "non-fast-forward",
    "[rejected]",
    "fetch first",
    "tip of your current branch is behind",
    "updates were rejected",
];

/// Classify a push failure from its error text
pub fn classify_push_failure(err: &VcsError) -> PushFailureKind {
    if matches!(err, VcsError::Timeout { .. }) {
        return PushFailureKind::Transient;
    }

    let text = err.output_text();
    if REJECTED_SIGNATURES.iter().any(|s| text.contains(s)) {
        PushFailureKind::Rejected
    } else if TRANSIENT_SIGNATURES.iter().any(|s| text.contains(s)) {
        PushFailureKind::Transient
    } else {
        PushFailureKind::Other
    }
}

fn is_nothing_to_commit(err: &VcsError) -> bool {
    if !matches!(err, VcsError::CommandFailed { .. }) {
        return false;
    }
    let text = err.output_text();
    text.contains("nothing to commit")
        || text.contains("nothing added to commit")
        || text.contains("no changes added to commit")
}

/// Git operations against one repository
#[derive(Clone)]
pub struct Git {
    exec: VcsExecutor,
}

impl Git {
    pub fn new(exec: VcsExecutor) -> Self {
        Self { exec }
    }

    /// Operations backed by the real `git` binary
    pub fn open(repo_root: &Path) -> Self {
        Self::new(VcsExecutor::new(repo_root))
    }

    pub fn executor(&self) -> &VcsExecutor {
        &self.exec
    }

    pub fn repo_root(&self) -> &Path {
        self.exec.repo_root()
    }

    /// `git rev-parse --is-inside-work-tree`
    pub async fn verify_repo(&self) -> Result<(), VcsError> {
        let not_found = || VcsError::RepoNotFound {
            path: self.repo_root().to_path_buf(),
        };

        match self.exec.run(&["rev-parse", "--is-inside-work-tree"]).await {
            Ok(out) if out.trim() == "true" => Ok(()),
            Ok(_) | Err(VcsError::CommandFailed { .. }) => Err(not_found()),
            Err(e) => Err(e),
        }
    }

    /// `git add -A`
    pub async fn add_all(&self) -> Result<(), VcsError> {
        self.exec.run(&["add", "-A"]).await.map(|_| ())
    }

    /// `git add -- <paths...>`
    pub async fn add_paths<S: AsRef<str>>(&self, paths: &[S]) -> Result<(), VcsError> {
        let mut args = vec!["add", "--"];
        args.extend(paths.iter().map(|p| p.as_ref()));
        self.exec.run(&args).await.map(|_| ())
    }

    /// Raw `git status --porcelain` output
    pub async fn status_porcelain(&self) -> Result<String, VcsError> {
        self.exec.run(&["status", "--porcelain"]).await
    }

    /// Parsed porcelain status
    pub async fn status_entries(&self) -> Result<Vec<StatusEntry>, VcsError> {
        Ok(parse_porcelain(&self.status_porcelain().await?))
    }

    /// `git diff --cached`
    pub async fn diff_cached(&self) -> Result<String, VcsError> {
        self.exec.run(&["diff", "--cached"]).await
    }

    /// `git diff --cached --name-only`
    pub async fn diff_cached_names(&self) -> Result<String, VcsError> {
        self.exec.run(&["diff", "--cached", "--name-only"]).await
    }

    /// Name of the checked-out branch (works on an unborn branch)
    pub async fn current_branch(&self) -> Result<String, VcsError> {
        let out = self.exec.run(&["symbolic-ref", "--short", "-q", "HEAD"]).await?;
        Ok(out.trim().to_string())
    }

    /// Whether `refs/heads/<branch>` exists
    pub async fn branch_exists(&self, branch: &str) -> Result<bool, VcsError> {
        let reference = format!("refs/heads/{}", branch);
        match self
            .exec
            .run(&["rev-parse", "--verify", "--quiet", &reference])
            .await
        {
            Ok(_) => Ok(true),
            Err(VcsError::CommandFailed { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn checkout(&self, branch: &str) -> Result<(), VcsError> {
        self.exec.run(&["checkout", branch]).await.map(|_| ())
    }

    pub async fn checkout_new(&self, branch: &str) -> Result<(), VcsError> {
        self.exec.run(&["checkout", "-b", branch]).await.map(|_| ())
    }

    /// `git commit -m <message>`
    pub async fn commit(&self, message: &str) -> Result<CommitResult, VcsError> {
        match self.exec.run(&["commit", "-m", message]).await {
            Ok(stdout) => Ok(CommitResult::Committed {
                summary: stdout.lines().next().unwrap_or_default().trim().to_string(),
            }),
            Err(e) if is_nothing_to_commit(&e) => Ok(CommitResult::NothingToCommit),
            Err(e) => Err(e),
        }
    }

    /// Whether `<branch>` has an upstream configured
    pub async fn has_upstream(&self, branch: &str) -> Result<bool, VcsError> {
        let spec = format!("{}@{{upstream}}", branch);
        match self
            .exec
            .run(&["rev-parse", "--abbrev-ref", "--symbolic-full-name", &spec])
            .await
        {
            Ok(_) => Ok(true),
            Err(VcsError::CommandFailed { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// `git pull --rebase <remote> <branch>`
    pub async fn pull_rebase(&self, remote: &str, branch: &str) -> Result<(), VcsError> {
        self.exec
            .run(&["pull", "--rebase", remote, branch])
            .await
            .map(|_| ())
    }

    /// Undo a `pull --rebase` that stopped on conflicts
    pub async fn rebase_abort(&self) -> Result<(), VcsError> {
        self.exec.run(&["rebase", "--abort"]).await.map(|_| ())
    }

    /// `git push [-u] [options...] <remote> <branch>`
    ///
    /// `options` are passed through verbatim as extra arguments.
    pub async fn push(
        &self,
        remote: &str,
        branch: &str,
        set_upstream: bool,
        options: &[String],
    ) -> Result<(), VcsError> {
        let mut args = vec!["push"];
        if set_upstream {
            args.push("-u");
        }
        args.extend(options.iter().map(String::as_str));
        args.push(remote);
        args.push(branch);
        self.exec.run(&args).await.map(|_| ())
    }
}
