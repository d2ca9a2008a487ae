//! The commit pipeline
//!
//! One attempt runs these steps strictly in order:
//!
//! ```text
//! verify-repo -> stage -> status -> empty-check -> diff -> message
//!             -> branch -> commit -> push
//! ```
//!
//! Steps fall back instead of failing wherever they can. The only re-entry
//! is the bounded retry inside the commit and push steps.

use crate::outcome::{
    AttemptOutcome, CommitAttempt, DegradationKind, PipelineError, PushStatus, Step,
};
use crate::stage::StageSelector;
use ac_core::{Config, StageMode, TriggerKind};
use git::{classify_push_failure, parse_porcelain, CommitResult, Git, PushFailureKind, StatusEntry};
use message::{MessageGenerator, MessageSource};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Used when the generator somehow yields nothing
const LAST_RESORT_MESSAGE: &str = "chore: update files";

/// Note attached to a push that needed a rebase first
pub const PULL_AND_PUSH_NOTE: &str = "pull & push";

/// Retry bounds and delays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total commit attempts, including the first
    pub commit_attempts: u32,
    /// Fixed delay between commit attempts
    pub commit_delay: Duration,
    /// First push backoff; doubles on each retry
    pub push_base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            commit_attempts: 3,
            commit_delay: Duration::from_secs(1),
            push_base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// 2s, 4s, 8s, ...
    pub fn push_delay(&self, retry: u32) -> Duration {
        self.push_base_delay.saturating_mul(2u32.saturating_pow(retry))
    }
}

/// One configured pipeline; cheap to build per run
pub struct CommitPipeline {
    git: Git,
    generator: MessageGenerator,
    selector: Arc<dyn StageSelector>,
    config: Arc<Config>,
    policy: RetryPolicy,
}

impl CommitPipeline {
    pub fn new(
        git: Git,
        generator: MessageGenerator,
        selector: Arc<dyn StageSelector>,
        config: Arc<Config>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            git,
            generator,
            selector,
            config,
            policy,
        }
    }

    /// Run one attempt to completion
    pub async fn run(&self, trigger: TriggerKind) -> CommitAttempt {
        let mut attempt = CommitAttempt::new(trigger);
        info!("Commit attempt started ({} trigger)", trigger);

        let outcome = self.execute(&mut attempt).await;
        if let AttemptOutcome::Failed(e) = &outcome {
            error!(
                "Commit attempt failed in {}: {}",
                self.git.repo_root().display(),
                e
            );
        }
        attempt.finish(outcome);
        attempt
    }

    async fn execute(&self, attempt: &mut CommitAttempt) -> AttemptOutcome {
        // 1. VerifyRepo
        if let Err(e) = self.git.verify_repo().await {
            let error = PipelineError::RepoNotFound(e.to_string());
            attempt.fail(Step::VerifyRepo, &error);
            return AttemptOutcome::Failed(error);
        }
        attempt.succeed(Step::VerifyRepo);

        // 2. Stage
        self.stage(attempt).await;

        // 3. Status
        let entries = match self.git.status_porcelain().await {
            Ok(output) => {
                attempt.succeed(Step::Status);
                Some(parse_porcelain(&output))
            }
            Err(e) => {
                warn!("git status failed, continuing without a file list: {}", e);
                attempt.degrade(Step::Status, DegradationKind::StatusUnavailable, e.to_string());
                None
            }
        };

        // 4. EmptyCheck (only meaningful when status is known)
        if entries.as_ref().is_some_and(|e| e.is_empty()) {
            return self.nothing_to_commit(attempt, Step::EmptyCheck);
        }
        attempt.succeed(Step::EmptyCheck);
        let entries = entries.unwrap_or_default();

        // 5. Diff
        let diff = self.diff(attempt).await;

        // 6. Message
        let mut message = self.generator.generate(&entries, &diff).await;
        if message.text.trim().is_empty() {
            message.text = LAST_RESORT_MESSAGE.to_string();
        }
        match &message.source {
            MessageSource::Fallback { reason } => attempt.degrade(
                Step::Message,
                DegradationKind::GenerationFailure,
                format!("using fallback message ({})", reason),
            ),
            MessageSource::Ai { .. } => attempt.succeed(Step::Message),
        }
        let text = message.text.clone();
        attempt.message = Some(message);

        // 7. BranchReconcile
        self.reconcile_branch(attempt).await;

        // 8. Commit
        match self.commit(attempt, &text).await {
            Ok(CommitResult::Committed { summary }) => {
                attempt.succeed(Step::Commit);
                info!("Committed: {}", text);
                attempt.commit_summary = Some(summary);
            }
            Ok(CommitResult::NothingToCommit) => {
                return self.nothing_to_commit(attempt, Step::Commit);
            }
            Err(error) => {
                attempt.fail(Step::Commit, &error);
                return AttemptOutcome::Failed(error);
            }
        }

        // 9. Push
        if self.config.git.auto_push {
            let status = self.push(attempt).await;
            match &status {
                PushStatus::Failed { reason } => {
                    warn!("Push failed: {}", reason);
                    attempt.degrade(Step::Push, DegradationKind::PushFailure, reason.clone());
                }
                _ => attempt.succeed(Step::Push),
            }
            attempt.push = status;
        }

        AttemptOutcome::Committed
    }

    /// Empty index: a no-op for automatic runs, an error for manual ones
    fn nothing_to_commit(&self, attempt: &mut CommitAttempt, step: Step) -> AttemptOutcome {
        match attempt.trigger {
            TriggerKind::Auto => {
                debug!("Nothing to commit");
                attempt.succeed(step);
                AttemptOutcome::NothingToCommit
            }
            TriggerKind::Manual => {
                let error = PipelineError::NothingToCommit;
                attempt.fail(step, &error);
                AttemptOutcome::Failed(error)
            }
        }
    }

    async fn stage(&self, attempt: &mut CommitAttempt) {
        let git_settings = &self.config.git;

        let staged = match git_settings.stage_mode {
            StageMode::All => self.git.add_all().await.map_err(|e| e.to_string()),
            StageMode::Specific => self.stage_patterns(&git_settings.stage_patterns).await,
            StageMode::Prompt => self.stage_selected().await,
        };

        let Err(reason) = staged else {
            attempt.succeed(Step::Stage);
            return;
        };

        if git_settings.stage_mode == StageMode::All {
            warn!("git add -A failed, continuing: {}", reason);
            attempt.degrade(Step::Stage, DegradationKind::StageFailure, reason);
            return;
        }

        warn!("Staging failed ({}), falling back to git add -A", reason);
        attempt.retries.stage += 1;
        match self.git.add_all().await {
            Ok(()) => attempt.degrade(
                Step::Stage,
                DegradationKind::StageFailure,
                format!("{}; staged all changes instead", reason),
            ),
            Err(e) => {
                warn!("Fallback git add -A failed, continuing: {}", e);
                attempt.degrade(
                    Step::Stage,
                    DegradationKind::StageFailure,
                    format!("{}; git add -A also failed: {}", reason, e),
                );
            }
        }
    }

    /// `git add -- <pattern>` per pattern; errors only if none succeeded
    async fn stage_patterns(&self, patterns: &[String]) -> Result<(), String> {
        if patterns.is_empty() {
            return Err("no stage patterns configured".to_string());
        }

        let mut staged = 0;
        for pattern in patterns {
            match self.git.add_paths(&[pattern]).await {
                Ok(()) => staged += 1,
                Err(e) => warn!("Failed to stage '{}': {}", pattern, e),
            }
        }

        if staged == 0 {
            Err("no stage pattern could be added".to_string())
        } else {
            Ok(())
        }
    }

    async fn stage_selected(&self) -> Result<(), String> {
        let candidates: Vec<StatusEntry> =
            self.git.status_entries().await.map_err(|e| e.to_string())?;
        if candidates.is_empty() {
            return Ok(());
        }

        let selected = self
            .selector
            .select(&candidates)
            .await
            .map_err(|e| format!("file selection failed: {}", e))?;
        if selected.is_empty() {
            info!("No files selected for staging");
            return Ok(());
        }

        self.git.add_paths(&selected[..]).await.map_err(|e| e.to_string())
    }

    async fn diff(&self, attempt: &mut CommitAttempt) -> String {
        match self.git.diff_cached().await {
            Ok(diff) => {
                attempt.succeed(Step::Diff);
                return diff;
            }
            Err(e) => warn!("git diff --cached failed: {}", e),
        }

        match self.git.diff_cached_names().await {
            Ok(names) => {
                attempt.degrade(Step::Diff, DegradationKind::DiffUnavailable, "using file names only");
                names
            }
            Err(e) => {
                attempt.degrade(Step::Diff, DegradationKind::DiffUnavailable, e.to_string());
                String::new()
            }
        }
    }

    async fn reconcile_branch(&self, attempt: &mut CommitAttempt) {
        let target = self.config.git.target_branch.as_str();
        let current = self.git.current_branch().await.ok();

        if target.is_empty() || current.as_deref() == Some(target) {
            attempt.branch = current;
            attempt.succeed(Step::BranchReconcile);
            return;
        }

        let switched = match self.git.branch_exists(target).await {
            Ok(true) => self.git.checkout(target).await,
            Ok(false) => {
                info!("Creating branch {}", target);
                self.git.checkout_new(target).await
            }
            Err(e) => Err(e),
        };

        match switched {
            Ok(()) => {
                info!("Switched to branch {}", target);
                attempt.branch = Some(target.to_string());
                attempt.succeed(Step::BranchReconcile);
            }
            Err(e) => {
                warn!("Could not switch to {}: {}", target, e);
                attempt.branch = current;
                attempt.degrade(
                    Step::BranchReconcile,
                    DegradationKind::BranchFailure,
                    format!("staying on current branch: {}", e),
                );
            }
        }
    }

    async fn commit(
        &self,
        attempt: &mut CommitAttempt,
        message: &str,
    ) -> Result<CommitResult, PipelineError> {
        let max = self.policy.commit_attempts.max(1);
        let mut tries = 0;

        loop {
            tries += 1;
            match self.git.commit(message).await {
                Ok(result) => return Ok(result),
                Err(e) if tries < max => {
                    warn!("Commit attempt {}/{} failed: {}", tries, max, e);
                    attempt.retries.commit += 1;
                    tokio::time::sleep(self.policy.commit_delay).await;
                }
                Err(e) => {
                    return Err(PipelineError::CommitFailure {
                        attempts: tries,
                        reason: e.to_string(),
                    })
                }
            }
        }
    }

    async fn push(&self, attempt: &mut CommitAttempt) -> PushStatus {
        let settings = &self.config.git;
        let remote = settings.remote.as_str();

        let branch = match self.git.current_branch().await {
            Ok(branch) if !branch.is_empty() => branch,
            Ok(_) => {
                return PushStatus::Failed {
                    reason: "HEAD is detached".to_string(),
                }
            }
            Err(e) => {
                return PushStatus::Failed {
                    reason: format!("cannot determine current branch: {}", e),
                }
            }
        };

        if settings.pull_before_push {
            if let Err(e) = self.git.pull_rebase(remote, &branch).await {
                warn!("pull --rebase before push failed: {}", e);
                self.abort_rebase().await;
            }
        }

        let set_upstream = !self.git.has_upstream(&branch).await.unwrap_or(false);
        let mut retries = 0;
        let mut pulled = false;

        loop {
            let err = match self
                .git
                .push(remote, &branch, set_upstream, &settings.push_options)
                .await
            {
                Ok(()) => {
                    info!("Pushed {} to {}", branch, remote);
                    return PushStatus::Pushed {
                        retries,
                        note: pulled.then(|| PULL_AND_PUSH_NOTE.to_string()),
                    };
                }
                Err(e) => e,
            };

            match classify_push_failure(&err) {
                PushFailureKind::Transient if retries < settings.push_retries => {
                    let delay = self.policy.push_delay(retries);
                    retries += 1;
                    attempt.retries.push = retries;
                    warn!("Push failed ({}), retrying in {:?}", err, delay);
                    tokio::time::sleep(delay).await;
                }
                PushFailureKind::Rejected if !pulled => {
                    pulled = true;
                    info!("Push rejected, pulling with rebase first");
                    if let Err(e) = self.git.pull_rebase(remote, &branch).await {
                        self.abort_rebase().await;
                        return PushStatus::Failed {
                            reason: format!("push rejected and pull --rebase failed: {}", e),
                        };
                    }
                }
                _ => {
                    return PushStatus::Failed {
                        reason: err.to_string(),
                    }
                }
            }
        }
    }

    async fn abort_rebase(&self) {
        // Fails harmlessly when no rebase is in progress
        if let Err(e) = self.git.rebase_abort().await {
            debug!("rebase --abort: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.push_delay(0), Duration::from_secs(2));
        assert_eq!(policy.push_delay(1), Duration::from_secs(4));
        assert_eq!(policy.push_delay(2), Duration::from_secs(8));
    }

    #[test]
    fn test_default_commit_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.commit_attempts, 3);
        assert_eq!(policy.commit_delay, Duration::from_secs(1));
    }
}
