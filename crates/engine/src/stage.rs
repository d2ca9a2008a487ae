//! File selection for the `prompt` staging mode

use async_trait::async_trait;
use git::StatusEntry;

/// Chooses which changed files to stage
#[async_trait]
pub trait StageSelector: Send + Sync {
    /// Return the paths to stage; an error makes the pipeline stage everything
    async fn select(&self, candidates: &[StatusEntry]) -> anyhow::Result<Vec<String>>;
}

/// Selects every candidate (used by the unattended daemon)
#[derive(Debug, Default, Clone, Copy)]
pub struct SelectAll;

#[async_trait]
impl StageSelector for SelectAll {
    async fn select(&self, candidates: &[StatusEntry]) -> anyhow::Result<Vec<String>> {
        Ok(candidates.iter().map(|entry| entry.path.clone()).collect())
    }
}
