//! Tracing setup
//!
//! One-shot commands log to stderr. The background daemon has no terminal,
//! so it writes to a daily-rolling file under the daemon directory.

use crate::util;
use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const LOG_FILE_NAME: &str = "daemon.log";

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install the global subscriber
///
/// `RUST_LOG` overrides `default_level`. The returned guard must live until
/// the process exits when logging to a file.
pub fn init(default_level: &str, to_file: bool) -> Result<Option<WorkerGuard>> {
    if !to_file {
        tracing_subscriber::fmt()
            .with_env_filter(filter(default_level))
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    }

    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let log_dir = util::log_dir(&cwd);
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter(default_level))
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Ok(Some(guard))
}
