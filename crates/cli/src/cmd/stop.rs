//! Stop the daemon

use crate::{daemon, util};
use anyhow::Result;
use nix::sys::signal::Signal;
use owo_colors::OwoColorize;
use std::process::ExitCode;
use std::time::Duration;

/// How long to wait for the daemon to finish an in-flight commit
const STOP_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn run() -> Result<ExitCode> {
    let repo_root = util::find_repo_root().await?;

    let Some(running) = daemon::running(&repo_root) else {
        println!("{}", "Daemon is not running".yellow());
        return Ok(ExitCode::SUCCESS);
    };

    daemon::send_signal(&running, Signal::SIGTERM)?;

    let deadline = tokio::time::Instant::now() + STOP_TIMEOUT;
    while daemon::running(&repo_root).is_some() {
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!(
                "Daemon (pid {}) did not stop within {}s",
                running.pid,
                STOP_TIMEOUT.as_secs()
            );
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    println!("Daemon stopped");
    Ok(ExitCode::SUCCESS)
}
