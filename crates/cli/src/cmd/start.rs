//! Start the daemon

use crate::{daemon, util};
use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Command, ExitCode, Stdio};
use std::time::Duration;

const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn run(foreground: bool) -> Result<ExitCode> {
    let repo_root = util::find_repo_root().await?;

    if let Some(running) = daemon::running(&repo_root) {
        anyhow::bail!("Daemon already running (pid {})", running.pid);
    }

    if foreground {
        daemon::run(repo_root).await?;
    } else {
        start_background(&repo_root).await?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Re-exec ourselves detached, logging to the daemon log directory
async fn start_background(repo_root: &Path) -> Result<()> {
    let exe = std::env::current_exe().context("Failed to get current executable path")?;

    let mut child = Command::new(&exe)
        .args(["start", "--foreground", "--log-file"])
        .current_dir(repo_root)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("Failed to spawn daemon process")?;

    let log_dir = util::log_dir(repo_root);
    let deadline = tokio::time::Instant::now() + STARTUP_TIMEOUT;

    loop {
        if let Some(running) = daemon::running(repo_root) {
            println!("Daemon started (pid {})", running.pid);
            println!("Logs: {}", log_dir.display());
            return Ok(());
        }

        if let Some(status) = child.try_wait()? {
            anyhow::bail!(
                "Daemon exited during startup ({}); check logs in {}",
                status,
                log_dir.display()
            );
        }

        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!(
                "Daemon failed to start (check logs in {})",
                log_dir.display()
            );
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}
