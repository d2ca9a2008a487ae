//! Commit message generation
//!
//! This crate provides:
//! - Prompt building from porcelain status and the staged diff
//! - Interchangeable AI backends (Ollama, OpenAI, Anthropic)
//! - Output cleanup and a deterministic, localized fallback

pub mod error;
pub mod fallback;
pub mod generator;
pub mod postprocess;
pub mod prompt;
pub mod providers;

pub use error::GenerationError;
pub use fallback::fallback_message;
pub use generator::{GeneratedMessage, MessageGenerator, MessageSource};
pub use postprocess::MAX_MESSAGE_CHARS;
pub use providers::{from_config, TextGenerator};
