//! Periodic reconciliation scanner
//!
//! Periodically scans the working tree for changes that may have been missed
//! by the file watcher (due to overflow, race conditions, a restart, etc.)

use ac_core::PathFilter;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Periodic reconciliation scanner
///
/// Each scan reports files whose mtime is newer than the previous scan and
/// then advances its baseline, so every missed change is reported once.
pub struct PeriodicReconciler {
    /// Repository root directory
    repo_root: PathBuf,

    /// Scan interval (default: 5 minutes)
    interval: Duration,

    /// Files modified after this instant are reported
    baseline: SystemTime,

    /// Ignore policy shared with the watcher
    filter: Arc<dyn PathFilter>,

    /// Sender for detected changes (absolute paths)
    change_tx: mpsc::Sender<Vec<PathBuf>>,
}

impl PeriodicReconciler {
    /// Create new periodic reconciler
    pub fn new(
        repo_root: PathBuf,
        interval: Duration,
        filter: Arc<dyn PathFilter>,
        change_tx: mpsc::Sender<Vec<PathBuf>>,
    ) -> Self {
        Self {
            repo_root,
            interval,
            baseline: SystemTime::now(),
            filter,
            change_tx,
        }
    }

    /// Start from an explicit baseline instead of "now"
    pub fn with_baseline(mut self, baseline: SystemTime) -> Self {
        self.baseline = baseline;
        self
    }

    /// Run periodic reconciliation loop
    ///
    /// Runs until the receiving side of the channel is dropped.
    pub async fn run(mut self) -> Result<()> {
        let mut timer = interval(self.interval);

        info!("Starting periodic reconciliation (interval: {:?})", self.interval);

        loop {
            timer.tick().await;

            let scan_started = SystemTime::now();
            let root = self.repo_root.clone();
            let filter = Arc::clone(&self.filter);
            let baseline = self.baseline;

            let scan = tokio::task::spawn_blocking(move || {
                scan_for_changes(&root, filter.as_ref(), baseline)
            })
            .await?;

            match scan {
                Ok(changed) => {
                    self.baseline = scan_started;

                    if changed.is_empty() {
                        debug!("Periodic reconciliation: no missed changes");
                        continue;
                    }

                    info!("Periodic reconciliation found {} missed changes", changed.len());
                    if self.change_tx.send(changed).await.is_err() {
                        debug!("Reconciliation receiver closed, stopping");
                        return Ok(());
                    }
                }
                Err(e) => {
                    warn!("Periodic reconciliation scan failed: {}", e);
                }
            }

            if self.change_tx.is_closed() {
                return Ok(());
            }
        }
    }
}

/// Walk the tree and collect files modified after `since`
pub fn scan_for_changes(
    repo_root: &std::path::Path,
    filter: &dyn PathFilter,
    since: SystemTime,
) -> Result<Vec<PathBuf>> {
    let mut changed = Vec::new();

    for entry in WalkDir::new(repo_root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !filter.is_ignored(e.path()))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                // Files can vanish mid-walk
                debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let mtime = entry.metadata()?.modified()?;
        if mtime > since {
            changed.push(entry.into_path());
        }
    }

    Ok(changed)
}
