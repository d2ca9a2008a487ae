//! End-to-end pipeline scenarios against a scripted git

mod common;

use ac_core::{Config, Severity, StageMode, TriggerKind};
use common::{ai_backend, fail, harness, offline_backend, ok};
use engine::{AttemptOutcome, DegradationKind, PipelineError, PushStatus, Step, StepOutcome};
use std::path::Path;

fn pushing_config() -> Config {
    let mut config = Config::default();
    config.git.auto_push = true;
    config
}

#[tokio::test(start_paused = true)]
async fn test_auto_run_with_clean_tree_is_a_noop() {
    let h = harness(Config::default(), ai_backend());
    h.git.script("status", vec![ok("")]);
    h.orchestrator.record_change(Path::new("/work/repo/src/lib.rs"));

    let attempt = h.orchestrator.execute(TriggerKind::Auto).await.unwrap();

    assert_eq!(attempt.outcome, AttemptOutcome::NothingToCommit);
    assert_eq!(h.orchestrator.pending(), (0, 0));
    assert_eq!(h.orchestrator.last_commit(), None);
    assert_eq!(h.git.count("commit"), 0);
    assert!(h.notifier.with(Severity::Error).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_edit_during_commit_stays_tracked() {
    let h = harness(Config::default(), ai_backend());
    h.orchestrator.record_change(Path::new("/work/repo/src/lib.rs"));

    let orchestrator = h.orchestrator.clone();
    h.git.on_call("commit", move || {
        orchestrator.record_change(Path::new("/work/repo/edited_during_commit.rs"));
    });

    let attempt = h.orchestrator.execute(TriggerKind::Auto).await.unwrap();

    assert!(attempt.is_committed());
    assert_eq!(h.orchestrator.pending(), (1, 1));
    assert!(h.orchestrator.last_commit().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_manual_run_with_clean_tree_reports_error() {
    let h = harness(Config::default(), ai_backend());
    h.git.script("status", vec![ok("")]);

    let attempt = h.orchestrator.execute(TriggerKind::Manual).await.unwrap();

    assert_eq!(attempt.error(), Some(&PipelineError::NothingToCommit));
    assert!(attempt.summary().contains("no changes to commit"));
    assert_eq!(
        attempt.outcome_of(Step::EmptyCheck),
        Some(&StepOutcome::Fatal("no changes to commit".to_string()))
    );
    assert_eq!(h.git.count("commit"), 0);
    assert_eq!(h.notifier.with(Severity::Error), vec!["no changes to commit"]);
}

#[tokio::test(start_paused = true)]
async fn test_commit_retries_until_success() {
    let h = harness(Config::default(), ai_backend());
    h.git.script(
        "commit",
        vec![fail("error: cannot lock ref"), fail("error: cannot lock ref")],
    );
    h.orchestrator.record_change(Path::new("/work/repo/src/lib.rs"));

    let attempt = h.orchestrator.execute(TriggerKind::Auto).await.unwrap();

    assert!(attempt.is_committed());
    assert_eq!(attempt.retries.commit, 2);
    assert_eq!(h.git.count("commit"), 3);
    assert_eq!(h.orchestrator.pending(), (0, 0));
    assert!(h.orchestrator.last_commit().is_some());
    assert_eq!(
        attempt.commit_summary.as_deref(),
        Some("[main 1a2b3c4] scripted")
    );
}

#[tokio::test(start_paused = true)]
async fn test_commit_failure_keeps_pending_changes() {
    let h = harness(Config::default(), ai_backend());
    h.git.script(
        "commit",
        vec![
            fail("fatal: hook declined"),
            fail("fatal: hook declined"),
            fail("fatal: hook declined"),
        ],
    );
    h.orchestrator.record_change(Path::new("/work/repo/src/lib.rs"));

    let attempt = h.orchestrator.execute(TriggerKind::Auto).await.unwrap();

    match attempt.error() {
        Some(PipelineError::CommitFailure { attempts, reason }) => {
            assert_eq!(*attempts, 3);
            assert!(reason.contains("hook declined"));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(h.orchestrator.pending(), (1, 1));
    assert_eq!(h.orchestrator.last_commit(), None);
    assert_eq!(h.git.count("push"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_push_pulls_then_pushes() {
    let h = harness(pushing_config(), ai_backend());
    h.git.script(
        "push",
        vec![fail(
            " ! [rejected]        main -> main (fetch first)\nerror: failed to push some refs",
        )],
    );

    let attempt = h.orchestrator.execute(TriggerKind::Auto).await.unwrap();

    assert!(attempt.is_committed());
    assert_eq!(
        attempt.push,
        PushStatus::Pushed {
            retries: 0,
            note: Some("pull & push".to_string()),
        }
    );
    assert_eq!(attempt.summary(), "Committed: feat: scripted change (pushed after pull & push)");
    assert_eq!(h.git.count("pull --rebase origin main"), 1);
    assert_eq!(h.git.count("push"), 2);
    assert_eq!(h.git.count("rebase --abort"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_pull_after_rejection_aborts_rebase() {
    let h = harness(pushing_config(), ai_backend());
    h.git.script("push", vec![fail("! [rejected] main -> main (non-fast-forward)")]);
    h.git.script("pull", vec![fail("CONFLICT (content): Merge conflict in a.txt")]);

    let attempt = h.orchestrator.execute(TriggerKind::Auto).await.unwrap();

    // The commit stands; the push is a warning
    assert!(attempt.is_committed());
    assert!(matches!(attempt.push, PushStatus::Failed { .. }));
    assert!(attempt
        .degradations
        .iter()
        .any(|d| d.kind == DegradationKind::PushFailure));
    assert_eq!(h.git.count("rebase --abort"), 1);
    assert_eq!(h.git.count("push"), 1);
    assert!(!h.notifier.with(Severity::Warning).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_transient_push_failures_back_off() {
    let h = harness(pushing_config(), ai_backend());
    h.git.script(
        "push",
        vec![
            fail("fatal: unable to access: Could not resolve host: example.com"),
            fail("fatal: unable to access: Connection refused"),
        ],
    );

    let started = tokio::time::Instant::now();
    let attempt = h.orchestrator.execute(TriggerKind::Auto).await.unwrap();

    assert_eq!(attempt.push, PushStatus::Pushed { retries: 2, note: None });
    assert_eq!(attempt.retries.push, 2);
    // 2s then 4s
    assert!(started.elapsed() >= std::time::Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn test_push_sets_upstream_when_missing() {
    let h = harness(pushing_config(), ai_backend());
    h.git.script(
        "rev-parse --abbrev-ref",
        vec![fail("fatal: no upstream configured for branch 'main'")],
    );

    let attempt = h.orchestrator.execute(TriggerKind::Auto).await.unwrap();

    assert!(matches!(attempt.push, PushStatus::Pushed { .. }));
    assert_eq!(h.git.count("push -u origin main"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_offline_backend_falls_back_to_status_message() {
    let h = harness(Config::default(), offline_backend());
    h.git.script("status", vec![ok(" M src/lib.rs\n M src/main.rs\n")]);

    let attempt = h.orchestrator.execute(TriggerKind::Auto).await.unwrap();

    assert!(attempt.is_committed());
    let message = attempt.message.as_ref().unwrap();
    assert!(message.is_fallback());
    assert_eq!(message.text, "chore: update 2 files");
    assert_eq!(h.git.count("commit -m chore: update 2 files"), 1);
    assert!(attempt
        .degradations
        .iter()
        .any(|d| d.kind == DegradationKind::GenerationFailure));
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_runs_are_rejected() {
    let h = harness(Config::default(), ai_backend());

    let (first, second) = tokio::join!(
        h.orchestrator.execute(TriggerKind::Auto),
        h.orchestrator.execute(TriggerKind::Manual),
    );

    let busy = [&first, &second]
        .iter()
        .filter(|r| matches!(r, Err(PipelineError::Busy)))
        .count();
    assert_eq!(busy, 1);
    assert!(first.is_ok());
    assert_eq!(h.git.count("commit"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_missing_repository_stops_before_staging() {
    let h = harness(Config::default(), ai_backend());
    h.git.script(
        "rev-parse --is-inside-work-tree",
        vec![fail("fatal: not a git repository (or any of the parent directories): .git")],
    );

    let attempt = h.orchestrator.execute(TriggerKind::Auto).await.unwrap();

    assert!(matches!(attempt.error(), Some(PipelineError::RepoNotFound(_))));
    assert_eq!(h.git.count("add"), 0);
    assert_eq!(h.git.count("commit"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_specific_staging_tolerates_partial_failure() {
    let mut config = Config::default();
    config.git.stage_mode = StageMode::Specific;
    config.git.stage_patterns = vec!["src".to_string(), "missing".to_string()];
    let h = harness(config, ai_backend());
    h.git.script(
        "add -- missing",
        vec![fail("fatal: pathspec 'missing' did not match any files")],
    );

    let attempt = h.orchestrator.execute(TriggerKind::Auto).await.unwrap();

    assert!(attempt.is_committed());
    assert_eq!(attempt.outcome_of(Step::Stage), Some(&StepOutcome::Success));
    assert_eq!(h.git.count("add -A"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_specific_staging_falls_back_to_all() {
    let mut config = Config::default();
    config.git.stage_mode = StageMode::Specific;
    config.git.stage_patterns = vec!["missing".to_string()];
    let h = harness(config, ai_backend());
    h.git.script("add --", vec![fail("fatal: pathspec 'missing' did not match any files")]);

    let attempt = h.orchestrator.execute(TriggerKind::Auto).await.unwrap();

    assert!(attempt.is_committed());
    assert_eq!(attempt.retries.stage, 1);
    assert_eq!(h.git.count("add -A"), 1);
    assert!(matches!(
        attempt.outcome_of(Step::Stage),
        Some(StepOutcome::Degraded(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_target_branch_is_created_before_commit() {
    let mut config = Config::default();
    config.git.target_branch = "autocommit".to_string();
    let h = harness(config, ai_backend());
    h.git.script("rev-parse --verify", vec![fail("")]);

    let attempt = h.orchestrator.execute(TriggerKind::Auto).await.unwrap();

    assert!(attempt.is_committed());
    assert_eq!(attempt.branch.as_deref(), Some("autocommit"));
    assert_eq!(h.git.count("checkout -b autocommit"), 1);

    let calls = h.git.calls();
    let checkout = calls.iter().position(|c| c.starts_with("checkout")).unwrap();
    let commit = calls.iter().position(|c| c.starts_with("commit")).unwrap();
    assert!(checkout < commit);
}

#[tokio::test(start_paused = true)]
async fn test_failed_branch_switch_commits_on_current_branch() {
    let mut config = Config::default();
    config.git.target_branch = "autocommit".to_string();
    let h = harness(config, ai_backend());
    h.git.script(
        "checkout",
        vec![fail("error: Your local changes would be overwritten by checkout")],
    );

    let attempt = h.orchestrator.execute(TriggerKind::Auto).await.unwrap();

    assert!(attempt.is_committed());
    assert_eq!(attempt.branch.as_deref(), Some("main"));
    assert!(attempt
        .degradations
        .iter()
        .any(|d| d.kind == DegradationKind::BranchFailure));
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_status_skips_empty_check() {
    let h = harness(Config::default(), offline_backend());
    h.git.script("status", vec![fail("fatal: index file corrupt")]);

    let attempt = h.orchestrator.execute(TriggerKind::Auto).await.unwrap();

    assert!(attempt.is_committed());
    assert_eq!(attempt.message.as_ref().unwrap().text, "chore: update files");
    assert!(attempt
        .degradations
        .iter()
        .any(|d| d.kind == DegradationKind::StatusUnavailable));
}

#[tokio::test(start_paused = true)]
async fn test_success_notification_respects_settings() {
    let mut config = Config::default();
    config.notifications.show_success = false;
    let h = harness(config, ai_backend());

    h.orchestrator.execute(TriggerKind::Auto).await.unwrap();
    assert!(h.notifier.with(Severity::Info).is_empty());

    // Manual runs always report
    h.orchestrator.execute(TriggerKind::Manual).await.unwrap();
    assert_eq!(
        h.notifier.with(Severity::Info),
        vec!["Committed: feat: scripted change"]
    );
}
