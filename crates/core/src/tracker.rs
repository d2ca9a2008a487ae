//! Change tracking between commits
//!
//! Accumulates the set of changed paths reported by the watcher. The set is
//! only cleared by the orchestrator once a commit attempt has succeeded, so a
//! failed attempt keeps the changes for the next one. Only changes recorded
//! before the attempt started are cleared; see [`ChangeMark`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Decides which paths never enter the tracker
pub trait PathFilter: Send + Sync {
    fn is_ignored(&self, path: &Path) -> bool;
}

/// Filter that accepts every path
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFilter;

impl PathFilter for NoFilter {
    fn is_ignored(&self, _path: &Path) -> bool {
        false
    }
}

/// Deduplicating set of changed paths plus a raw event counter
///
/// Each path remembers the sequence number of its latest event, so a
/// partial clear can keep paths touched after a [`ChangeMark`].
pub struct ChangeTracker {
    filter: Arc<dyn PathFilter>,
    paths: BTreeMap<PathBuf, u64>,
    events: usize,
    seq: u64,
}

/// Position in the event stream taken when a commit attempt starts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeMark {
    seq: u64,
}

/// Contents of the tracker at the moment it was cleared
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSnapshot {
    pub paths: Vec<PathBuf>,
    pub events: usize,
}

impl ChangeSnapshot {
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }
}

impl ChangeTracker {
    pub fn new(filter: Arc<dyn PathFilter>) -> Self {
        Self {
            filter,
            paths: BTreeMap::new(),
            events: 0,
            seq: 0,
        }
    }

    /// Tracker without an ignore policy
    pub fn unfiltered() -> Self {
        Self::new(Arc::new(NoFilter))
    }

    /// Record a change; returns false if the path is ignored
    pub fn record(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        if self.filter.is_ignored(path) {
            return false;
        }

        self.events += 1;
        self.seq += 1;
        self.paths.insert(path.to_path_buf(), self.seq);
        true
    }

    /// Record a batch; returns how many paths were accepted
    pub fn record_all<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        paths.into_iter().filter(|p| self.record(p)).count()
    }

    /// Number of distinct changed paths
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Number of recorded change events, including repeats
    pub fn events(&self) -> usize {
        self.events
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.paths.keys().map(PathBuf::as_path)
    }

    /// Current position; pass it to [`ChangeTracker::clear_through`] later
    pub fn mark(&self) -> ChangeMark {
        ChangeMark { seq: self.seq }
    }

    /// Take the current contents and empty the tracker
    pub fn snapshot_and_clear(&mut self) -> ChangeSnapshot {
        let paths = std::mem::take(&mut self.paths).into_keys().collect();
        let events = std::mem::replace(&mut self.events, 0);
        ChangeSnapshot { paths, events }
    }

    /// Remove what was recorded up to `mark`
    ///
    /// Paths with an event after the mark stay tracked, along with the
    /// events counted since.
    pub fn clear_through(&mut self, mark: ChangeMark) -> ChangeSnapshot {
        let mut cleared = Vec::new();
        self.paths.retain(|path, seq| {
            if *seq <= mark.seq {
                cleared.push(path.clone());
                false
            } else {
                true
            }
        });
        let since = usize::try_from(self.seq - mark.seq).unwrap_or(usize::MAX);
        let kept = self.events.min(since);
        let events = self.events - kept;
        self.events = kept;
        ChangeSnapshot {
            paths: cleared,
            events,
        }
    }

    /// Discard everything (watcher teardown, feature disabled)
    pub fn clear(&mut self) {
        self.paths.clear();
        self.events = 0;
    }

    /// Swap the ignore policy, dropping tracked paths it now rejects
    pub fn set_filter(&mut self, filter: Arc<dyn PathFilter>) {
        self.paths.retain(|p, _| !filter.is_ignored(p));
        self.filter = filter;
    }
}

impl std::fmt::Debug for ChangeTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeTracker")
            .field("paths", &self.paths.len())
            .field("events", &self.events)
            .finish()
    }
}
