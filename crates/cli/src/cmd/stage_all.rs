//! Stage every change

use crate::util;
use anyhow::{Context, Result};
use git::Git;
use owo_colors::OwoColorize;
use std::process::ExitCode;

pub async fn run() -> Result<ExitCode> {
    let repo_root = util::find_repo_root().await?;
    let git = Git::open(&repo_root);

    git.add_all().await.context("git add -A failed")?;

    let staged = git.diff_cached_names().await.unwrap_or_default();
    let count = staged.lines().filter(|l| !l.trim().is_empty()).count();
    println!("{} Staged {} file(s)", "✓".green(), count);

    Ok(ExitCode::SUCCESS)
}
