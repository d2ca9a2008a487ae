//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use git::VcsExecutor;
use std::path::{Path, PathBuf};

/// Find the working tree root containing the current directory
pub async fn find_repo_root() -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;

    let toplevel = VcsExecutor::new(&cwd)
        .run(&["rev-parse", "--show-toplevel"])
        .await
        .map_err(|_| anyhow::anyhow!("Not a git repository: {}", cwd.display()))?;

    Ok(PathBuf::from(toplevel.trim()))
}

/// Per-repository state directory (`<git-dir>/autocommit`)
///
/// Lives inside the git directory so it is never watched or committed.
pub fn daemon_dir(repo_root: &Path) -> PathBuf {
    git::git_dir(repo_root).join("autocommit")
}

pub fn log_dir(repo_root: &Path) -> PathBuf {
    daemon_dir(repo_root).join("logs")
}

/// Format a duration in seconds as "1h 02m", "3m 05s" or "12s"
pub fn format_uptime(secs: u64) -> String {
    if secs >= 3600 {
        format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}
