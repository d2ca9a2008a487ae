//! Commit message generation with deterministic fallback

use crate::fallback::fallback_message;
use crate::postprocess::{cap, clean};
use crate::prompt::{build_prompt, status_digest};
use crate::providers::{from_config, TextGenerator};
use ac_core::{Config, MessageSettings};
use git::StatusEntry;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Where a commit message came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageSource {
    /// Produced by the named backend
    Ai { provider: &'static str },
    /// Backend failed; `reason` says why
    Fallback { reason: String },
}

impl fmt::Display for MessageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageSource::Ai { provider } => write!(f, "{}", provider),
            MessageSource::Fallback { reason } => write!(f, "fallback ({})", reason),
        }
    }
}

/// A non-empty commit subject of at most 72 characters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedMessage {
    pub text: String,
    pub source: MessageSource,
}

impl GeneratedMessage {
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, MessageSource::Fallback { .. })
    }
}

pub struct MessageGenerator {
    backend: Arc<dyn TextGenerator>,
    settings: MessageSettings,
}

impl MessageGenerator {
    pub fn new(backend: Arc<dyn TextGenerator>, settings: MessageSettings) -> Self {
        Self { backend, settings }
    }

    /// Generator using the backend selected in `config.ai`
    pub fn from_config(config: &Config) -> Self {
        Self::new(from_config(&config.ai), config.message.clone())
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Produce a commit message for the staged changes
    ///
    /// Never fails: any backend problem yields the fallback message.
    pub async fn generate(&self, entries: &[StatusEntry], diff: &str) -> GeneratedMessage {
        let digest = status_digest(entries);
        let prompt = build_prompt(&self.settings, &digest, diff);

        let started = Instant::now();
        let reason = match self.backend.generate(&prompt).await {
            Ok(raw) => match clean(&raw) {
                Some(text) => {
                    info!(
                        "Message from {} in {:?}",
                        self.backend.name(),
                        started.elapsed()
                    );
                    return GeneratedMessage {
                        text,
                        source: MessageSource::Ai {
                            provider: self.backend.name(),
                        },
                    };
                }
                None => "backend returned no usable text".to_string(),
            },
            Err(e) => e.to_string(),
        };

        warn!("{} failed, using fallback message: {}", self.backend.name(), reason);
        let text = fallback_message(entries, &self.settings.language, self.settings.style);
        GeneratedMessage {
            text: cap(&text),
            source: MessageSource::Fallback { reason },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use crate::postprocess::MAX_MESSAGE_CHARS;
    use ac_core::{AiSettings, ProviderKind};
    use async_trait::async_trait;
    use git::parse_porcelain;

    struct Canned(Result<String, GenerationError>);

    #[async_trait]
    impl TextGenerator for Canned {
        fn name(&self) -> &'static str {
            "canned"
        }

        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            self.0.clone()
        }
    }

    fn generator(response: Result<String, GenerationError>) -> MessageGenerator {
        MessageGenerator::new(Arc::new(Canned(response)), MessageSettings::default())
    }

    #[tokio::test]
    async fn test_ai_message_is_cleaned() {
        let generated = generator(Ok("```\n\"feat: add retry\"\n```".into()))
            .generate(&parse_porcelain(" M a.rs\n"), "")
            .await;
        assert_eq!(generated.text, "feat: add retry");
        assert_eq!(generated.source, MessageSource::Ai { provider: "canned" });
    }

    #[tokio::test]
    async fn test_backend_error_falls_back() {
        let entries = parse_porcelain(" M a.rs\n M b.rs\n?? c.rs\n");
        let generated = generator(Err(GenerationError::Network("refused".into())))
            .generate(&entries, "")
            .await;
        assert_eq!(generated.text, "chore: update 3 files");
        assert!(generated.is_fallback());
    }

    #[tokio::test]
    async fn test_blank_output_falls_back() {
        let generated = generator(Ok("  \n```\n```".into())).generate(&[], "").await;
        assert_eq!(generated.text, "chore: update files");
        assert!(generated.is_fallback());
    }

    #[tokio::test]
    async fn test_output_never_empty_and_capped() {
        let responses = vec![
            Ok("x".repeat(500)),
            Ok(String::new()),
            Ok("\"\"".into()),
            Err(GenerationError::Empty),
            Err(GenerationError::Http {
                status: 500,
                body: "boom".into(),
            }),
        ];
        for response in responses {
            let generated = generator(response)
                .generate(&parse_porcelain(" M a.rs\n"), "diff")
                .await;
            assert!(!generated.text.trim().is_empty());
            assert!(generated.text.chars().count() <= MAX_MESSAGE_CHARS);
        }
    }

    #[tokio::test]
    async fn test_unreachable_ollama_uses_fallback() {
        let mut config = Config::default();
        config.ai = AiSettings {
            provider: ProviderKind::Ollama,
            ollama_url: "http://127.0.0.1:9".into(),
            timeout_secs: 5,
            ..AiSettings::default()
        };

        let generator = MessageGenerator::from_config(&config);
        assert_eq!(generator.backend_name(), "ollama");

        let generated = generator
            .generate(&parse_porcelain(" M a.rs\n D b.rs\n"), "")
            .await;
        assert_eq!(generated.text, "chore: update 2 files");
        assert!(generated.is_fallback());
    }
}
