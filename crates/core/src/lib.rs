//! Core types for autocommit
//!
//! This crate provides:
//! - Layered TOML configuration (trigger rules, git, message, AI settings)
//! - The change tracker fed by the filesystem watcher
//! - The pure trigger evaluator deciding when a commit attempt starts
//! - The notification sink used to surface outcomes

pub mod config;
pub mod error;
pub mod notify;
pub mod tracker;
pub mod trigger;

// Re-exports
pub use config::{
    AiSettings, CommitStyle, Config, GitSettings, MessageSettings, NotificationSettings,
    ProviderKind, StageMode, TriggerRules, WatcherSettings,
};
pub use error::ConfigError;
pub use notify::{Notifier, Severity, TracingNotifier};
pub use tracker::{ChangeMark, ChangeSnapshot, ChangeTracker, NoFilter, PathFilter};
pub use trigger::{should_fire, TriggerDecision, TriggerKind};
