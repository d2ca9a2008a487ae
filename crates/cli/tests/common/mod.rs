//! Common utilities for integration tests

#![allow(dead_code)]

pub mod cli;

pub use cli::{AcCommand, CommandResult};

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Repo config pointing the AI backend at a closed port, so every run
/// exercises the fallback message quickly and deterministically
const OFFLINE_CONFIG: &str = r#"
[ai]
provider = "ollama"
ollama_url = "http://127.0.0.1:9"
timeout_secs = 2
"#;

/// A throwaway git repository with its own HOME
pub struct TestRepo {
    pub dir: TempDir,
    home: TempDir,
}

impl TestRepo {
    /// Initialised repository with one commit and an offline AI backend
    pub fn new() -> Result<Self> {
        let repo = Self {
            dir: TempDir::new()?,
            home: TempDir::new()?,
        };

        repo.git(&["init", "-q", "-b", "main"])?;
        repo.git(&["config", "user.name", "Test User"])?;
        repo.git(&["config", "user.email", "test@example.com"])?;
        repo.git(&["config", "commit.gpgsign", "false"])?;

        repo.write(".autocommit.toml", OFFLINE_CONFIG)?;
        repo.write(".gitignore", ".autocommit.toml\n")?;
        repo.git(&["add", "-A"])?;
        repo.git(&["commit", "-q", "-m", "initial"])?;

        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, relative: &str, content: &str) -> Result<()> {
        let path = self.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content).with_context(|| format!("writing {}", relative))
    }

    /// Run git in the repository and return trimmed stdout
    pub fn git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .output()
            .context("Failed to run git")?;
        if !output.status.success() {
            anyhow::bail!(
                "git {:?} failed: {}",
                args,
                String::from_utf8_lossy(&output.stderr)
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Subject of the latest commit
    pub fn last_subject(&self) -> Result<String> {
        self.git(&["log", "-1", "--format=%s"])
    }

    /// `ac <args>` inside the repository, isolated from the user's config
    pub fn ac(&self, args: &[&str]) -> AcCommand {
        let mut cmd = AcCommand::new(self.path());
        cmd.args(args)
            .env("HOME", self.home.path().to_string_lossy())
            .env(
                "XDG_CONFIG_HOME",
                self.home.path().join(".config").to_string_lossy(),
            );
        cmd
    }
}
