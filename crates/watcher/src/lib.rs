//! File system watching for autocommit
//!
//! This crate provides:
//! - Recursive watching of the working tree (via `notify`)
//! - Ignore rules (built-in, .gitignore, configured globs)
//! - Periodic reconciliation for changes the watcher missed

pub mod ignore;
pub mod reconcile;

pub use crate::ignore::{IgnoreConfig, IgnoreRules, SharedIgnore};
pub use crate::reconcile::PeriodicReconciler;

use anyhow::{Context, Result};
use notify::event::ModifyKind;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// File system event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// Path that changed
    pub path: PathBuf,
    /// Type of change
    pub kind: EventKind,
}

/// Type of file system event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// File created
    Create,
    /// File modified
    Modify,
    /// File deleted
    Delete,
    /// File renamed
    Rename,
}

impl WatchEvent {
    /// The checked-out branch may have changed
    pub fn is_head_change(&self) -> bool {
        self.path.ends_with(".git/HEAD")
    }

    /// The repository ignore file changed
    pub fn is_gitignore_change(&self) -> bool {
        self.path.file_name().is_some_and(|name| name == ".gitignore")
    }
}

/// Recursive file system watcher feeding a tokio channel
///
/// Events are forwarded unfiltered; the consumer applies the ignore policy.
pub struct FsWatcher {
    root: PathBuf,
    watcher: Option<RecommendedWatcher>,
    healthy: Arc<AtomicBool>,
}

impl FsWatcher {
    /// Start watching `root` recursively
    pub fn start(root: &Path, tx: mpsc::Sender<WatchEvent>) -> Result<Self> {
        let healthy = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&healthy);

        let mut watcher = notify::recommended_watcher(
            move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    for watch_event in translate(event) {
                        // Runs on the notify thread, outside the runtime
                        if tx.blocking_send(watch_event).is_err() {
                            flag.store(false, Ordering::SeqCst);
                            return;
                        }
                    }
                }
                Err(e) => {
                    warn!("File watcher error: {}", e);
                    flag.store(false, Ordering::SeqCst);
                }
            },
        )
        .context("Failed to create file watcher")?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", root.display()))?;

        info!("Watching {}", root.display());

        Ok(Self {
            root: root.to_path_buf(),
            watcher: Some(watcher),
            healthy,
        })
    }

    /// False once the backend reported an error or the receiver went away
    pub fn is_healthy(&self) -> bool {
        self.watcher.is_some() && self.healthy.load(Ordering::SeqCst)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stop watching
    pub fn stop(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            if let Err(e) = watcher.unwatch(&self.root) {
                debug!("Unwatch failed (already gone?): {}", e);
            }
            info!("Stopped watching {}", self.root.display());
        }
    }
}

impl Drop for FsWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Convert a notify event into zero or more watch events
fn translate(event: notify::Event) -> Vec<WatchEvent> {
    let kind = match event.kind {
        notify::EventKind::Create(_) => EventKind::Create,
        notify::EventKind::Remove(_) => EventKind::Delete,
        notify::EventKind::Modify(ModifyKind::Name(_)) => EventKind::Rename,
        notify::EventKind::Modify(_) | notify::EventKind::Any => EventKind::Modify,
        notify::EventKind::Access(_) | notify::EventKind::Other => return Vec::new(),
    };

    event
        .paths
        .into_iter()
        .map(|path| WatchEvent { path, kind })
        .collect()
}
