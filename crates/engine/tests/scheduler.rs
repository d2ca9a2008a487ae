//! Scheduler loop driven by real file events and a scripted git

mod common;

use ac_core::Config;
use common::{ai_backend, harness_at, Harness};
use engine::Scheduler;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use watcher::{IgnoreConfig, IgnoreRules, SharedIgnore};

fn eager_config() -> Config {
    let mut config = Config::default();
    config.triggers.min_change_count = 1;
    config.triggers.file_count_threshold = 1;
    config
}

fn scheduler_for(temp_dir: &TempDir, config: Config) -> (Harness, Scheduler, engine::SchedulerHandle) {
    let h = harness_at(temp_dir.path(), config, ai_backend());
    let rules = IgnoreRules::load(temp_dir.path(), IgnoreConfig::default()).unwrap();
    let (scheduler, handle) = Scheduler::new(
        Arc::clone(&h.orchestrator),
        Arc::new(SharedIgnore::new(rules)),
    );
    (h, scheduler, handle)
}

async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_file_change_triggers_commit() {
    let temp_dir = TempDir::new().unwrap();
    let (h, scheduler, handle) = scheduler_for(&temp_dir, eager_config());
    let task = tokio::spawn(scheduler.run());

    // Let the watcher settle before producing events
    tokio::time::sleep(Duration::from_millis(200)).await;
    fs::write(temp_dir.path().join("notes.txt"), "hello").unwrap();

    assert!(wait_until(|| h.git.count("commit") >= 1).await);
    assert!(wait_until(|| h.orchestrator.last_commit().is_some()).await);

    handle.shutdown().await.unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_now_commits_without_tracked_changes() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = eager_config();
    config.triggers.on_save = false;
    let (h, scheduler, handle) = scheduler_for(&temp_dir, config);
    let task = tokio::spawn(scheduler.run());

    handle.run_now().await.unwrap();
    assert!(wait_until(|| h.git.count("commit") == 1).await);

    handle.shutdown().await.unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_toggle_disables_and_reenables() {
    let temp_dir = TempDir::new().unwrap();
    let (h, scheduler, handle) = scheduler_for(&temp_dir, Config::default());
    let task = tokio::spawn(scheduler.run());

    handle.toggle().await.unwrap();
    assert!(wait_until(|| !h.orchestrator.is_enabled()).await);
    assert!(wait_until(|| h
        .notifier
        .with(ac_core::Severity::Info)
        .contains(&"Auto-commit disabled".to_string()))
    .await);

    handle.toggle().await.unwrap();
    assert!(wait_until(|| h.orchestrator.is_enabled()).await);

    handle.shutdown().await.unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dropping_every_handle_stops_the_loop() {
    let temp_dir = TempDir::new().unwrap();
    let (_h, scheduler, handle) = scheduler_for(&temp_dir, Config::default());
    let task = tokio::spawn(scheduler.run());

    drop(handle);
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_reenable_rearms_interval_from_reloaded_config() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.triggers.on_save = false;
    config.triggers.interval_minutes = 60;
    config.watcher.reconcile_interval_secs = 24 * 3600;
    let (h, scheduler, handle) = scheduler_for(&temp_dir, config);

    let mut reloaded = eager_config();
    reloaded.triggers.on_save = false;
    reloaded.triggers.interval_minutes = 1;
    reloaded.watcher.reconcile_interval_secs = 24 * 3600;
    let scheduler = scheduler.with_config_source(move || Ok(reloaded.clone()));
    let task = tokio::spawn(scheduler.run());

    handle.toggle().await.unwrap();
    assert!(wait_until(|| !h.orchestrator.is_enabled()).await);
    handle.toggle().await.unwrap();
    assert!(wait_until(|| h.orchestrator.is_enabled()).await);
    assert_eq!(h.orchestrator.config().triggers.interval_minutes, 1);

    h.orchestrator
        .record_change(&temp_dir.path().join("notes.txt"));

    // Well short of the original hour
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(wait_until(|| h.git.count("commit") == 1).await);

    handle.shutdown().await.unwrap();
    task.await.unwrap().unwrap();
}
