//! Trigger evaluation
//!
//! Decides whether enough has changed to start an automatic commit attempt.
//! The time threshold acts as a rate limiter; the other predicates are
//! alternative "enough happened" signals:
//!
//! ```text
//! fire = time_ok && (specific_match || events >= min_change_count || files >= file_count_threshold)
//! ```
//!
//! Evaluation is pure: the caller injects `now`.

use crate::config::TriggerRules;
use crate::tracker::ChangeTracker;
use glob::Pattern;
use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};

/// Who started a commit attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// Explicit user request ("commit now")
    Manual,
    /// Trigger evaluator fired
    Auto,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerKind::Manual => write!(f, "manual"),
            TriggerKind::Auto => write!(f, "auto"),
        }
    }
}

/// Outcome of each predicate, kept for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TriggerDecision {
    pub time_ok: bool,
    pub specific_match: bool,
    pub min_changes_met: bool,
    pub file_count_met: bool,
}

impl TriggerDecision {
    /// Evaluate every predicate against the tracker
    pub fn evaluate(
        tracker: &ChangeTracker,
        rules: &TriggerRules,
        last_commit: Option<Instant>,
        now: Instant,
    ) -> Self {
        if tracker.is_empty() {
            return Self::default();
        }

        let threshold = Duration::from_secs(u64::from(rules.time_threshold_minutes) * 60);
        let time_ok = match last_commit {
            None => true,
            Some(at) => now.saturating_duration_since(at) >= threshold,
        };

        Self {
            time_ok: time_ok || !rules.require_time_threshold,
            specific_match: matches_specific(tracker, rules),
            min_changes_met: tracker.events() >= rules.min_change_count as usize,
            file_count_met: tracker.len() >= rules.file_count_threshold as usize,
        }
    }

    pub fn fire(&self) -> bool {
        self.time_ok && (self.specific_match || self.min_changes_met || self.file_count_met)
    }
}

impl fmt::Display for TriggerDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "time={} specific={} min_changes={} file_count={}",
            self.time_ok, self.specific_match, self.min_changes_met, self.file_count_met
        )
    }
}

/// Whether an automatic commit attempt should begin
pub fn should_fire(
    tracker: &ChangeTracker,
    rules: &TriggerRules,
    last_commit: Option<Instant>,
    now: Instant,
) -> bool {
    TriggerDecision::evaluate(tracker, rules, last_commit, now).fire()
}

fn matches_specific(tracker: &ChangeTracker, rules: &TriggerRules) -> bool {
    if rules.specific_files.is_empty() && rules.file_patterns.is_empty() {
        return false;
    }

    let patterns: Vec<Pattern> = rules
        .file_patterns
        .iter()
        .filter_map(|p| Pattern::new(p).ok())
        .collect();

    tracker.paths().any(|path| {
        rules
            .specific_files
            .iter()
            .any(|file| path == Path::new(file) || path.ends_with(file))
            || suffixes(path).any(|suffix| patterns.iter().any(|p| p.matches_path(suffix)))
    })
}

/// `a/b/c.rs`, `b/c.rs`, `c.rs`: lets relative globs match absolute paths
fn suffixes(path: &Path) -> impl Iterator<Item = &Path> {
    let mut rest = Some(path);
    std::iter::from_fn(move || {
        let current = rest?;
        let mut components = current.components();
        components.next();
        let next = components.as_path();
        rest = if next.as_os_str().is_empty() {
            None
        } else {
            Some(next)
        };
        Some(current)
    })
}
