//! Lock file management for daemon exclusivity
//!
//! The daemon holds an exclusive `flock` on `<daemon-dir>/daemon.lock` for
//! its whole life and records its PID there. The kernel drops the lock when
//! the process dies, so a leftover file from a crash is simply reclaimed.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const LOCK_FILE_NAME: &str = "daemon.lock";

/// Daemon lock file structure
pub struct DaemonLock {
    path: PathBuf,
    // Keeps the flock alive
    #[allow(dead_code)]
    file: File,
}

/// Lock file content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockContent {
    pub pid: u32,
    pub started_at: u64,
}

impl LockContent {
    /// Seconds since the daemon started
    pub fn uptime_secs(&self) -> u64 {
        current_timestamp_ms().saturating_sub(self.started_at) / 1000
    }
}

impl DaemonLock {
    /// Acquire exclusive daemon lock
    ///
    /// Fails if another live daemon holds it.
    pub fn acquire(daemon_dir: &Path) -> Result<Self> {
        let lock_path = daemon_dir.join(LOCK_FILE_NAME);

        std::fs::create_dir_all(daemon_dir).context("Failed to create daemon directory")?;

        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&lock_path)
            .context("Failed to open lock file")?;

        if !try_flock_exclusive(&file)? {
            let holder = read_lock_content(&mut file)
                .map(|c| c.pid.to_string())
                .unwrap_or_else(|_| "unknown".to_string());
            anyhow::bail!("Daemon already running (pid {})", holder);
        }

        if let Ok(previous) = read_lock_content(&mut file) {
            if previous.pid != std::process::id() {
                tracing::warn!("Reclaiming stale daemon lock (pid {})", previous.pid);
            }
        }

        write_lock_content(&mut file)?;

        Ok(Self {
            path: lock_path,
            file,
        })
    }

    /// Release the daemon lock
    pub fn release(self) -> Result<()> {
        // The flock goes away with the file handle
        std::fs::remove_file(&self.path).context("Failed to remove lock file")?;
        Ok(())
    }
}

impl Drop for DaemonLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// The running daemon for `daemon_dir`, if any
pub fn running_daemon(daemon_dir: &Path) -> Option<LockContent> {
    let mut file = File::open(daemon_dir.join(LOCK_FILE_NAME)).ok()?;
    let content = read_lock_content(&mut file).ok()?;
    is_process_alive(content.pid).then_some(content)
}

/// Write lock content (PID + timestamp)
fn write_lock_content(file: &mut File) -> Result<()> {
    let content = LockContent {
        pid: std::process::id(),
        started_at: current_timestamp_ms(),
    };

    let serialized =
        serde_json::to_string(&content).context("Failed to serialize lock content")?;

    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(serialized.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

/// Read lock content from file
fn read_lock_content(file: &mut File) -> Result<LockContent> {
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    let content: LockContent =
        serde_json::from_str(&contents).context("Failed to deserialize lock content")?;
    Ok(content)
}

/// Try to acquire exclusive file lock (non-blocking)
fn try_flock_exclusive(file: &File) -> Result<bool> {
    use nix::fcntl::{flock, FlockArg};
    use std::os::unix::io::AsRawFd;

    match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
        Ok(_) => Ok(true),
        Err(nix::errno::Errno::EWOULDBLOCK) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Check if process is alive
fn is_process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };

    // Null signal: existence check only
    match kill(Pid::from_raw(raw), None) {
        Ok(_) => true,
        Err(nix::errno::Errno::ESRCH) => false,
        // EPERM: exists but belongs to someone else
        Err(_) => true,
    }
}

fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
