//! Git command-line integration
//!
//! This crate provides:
//! - `VcsExecutor`: runs git subcommands with an output ceiling, a per-call
//!   timeout and stale index-lock healing
//! - `Git`: the typed operations the commit pipeline needs
//! - Porcelain status parsing

pub mod exec;
pub mod ops;
pub mod status;

pub use exec::{git_dir, is_lock_error, GitProcess, ProcessOutput, ProcessRunner, VcsError, VcsExecutor};
pub use ops::{classify_push_failure, CommitResult, Git, PushFailureKind};
pub use status::{parse_porcelain, ChangeKind, StatusEntry};
