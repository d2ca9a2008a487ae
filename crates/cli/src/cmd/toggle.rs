//! Enable or disable the running daemon

use crate::{daemon, util};
use anyhow::Result;
use nix::sys::signal::Signal;
use std::process::ExitCode;

pub async fn run() -> Result<ExitCode> {
    let repo_root = util::find_repo_root().await?;

    let Some(running) = daemon::running(&repo_root) else {
        anyhow::bail!("Daemon is not running (start it with 'ac start')");
    };

    daemon::send_signal(&running, Signal::SIGUSR1)?;
    println!("Toggle sent to daemon (pid {})", running.pid);
    Ok(ExitCode::SUCCESS)
}
