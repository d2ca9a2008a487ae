//! AI text-generation backends
//!
//! Every backend implements [`TextGenerator`]. [`from_config`] is the only
//! place that knows the concrete types, so adding a backend means adding a
//! module here and one match arm.

mod anthropic;
mod ollama;
mod openai;

pub use anthropic::AnthropicProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

use crate::error::GenerationError;
use ac_core::{AiSettings, ProviderKind};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// A backend that turns a prompt into text
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Short identifier used in logs and outcome reports
    fn name(&self) -> &'static str;

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Build the backend selected by `settings.provider`
///
/// Construction problems are deferred: the returned backend reports them on
/// every call so the generator falls back instead of failing to start.
pub fn from_config(settings: &AiSettings) -> Arc<dyn TextGenerator> {
    let timeout = Duration::from_secs(settings.timeout_secs.max(1));

    let built: Result<Arc<dyn TextGenerator>, GenerationError> = match settings.provider {
        ProviderKind::Ollama => {
            OllamaProvider::new(&settings.ollama_url, &settings.ollama_model, timeout)
                .map(|p| Arc::new(p) as Arc<dyn TextGenerator>)
        }
        ProviderKind::OpenAi => OpenAiProvider::new(
            &settings.openai_base_url,
            &settings.openai_api_key,
            &settings.openai_model,
            timeout,
        )
        .map(|p| Arc::new(p) as Arc<dyn TextGenerator>),
        ProviderKind::Anthropic => AnthropicProvider::new(
            &settings.anthropic_api_key,
            &settings.anthropic_model,
            timeout,
        )
        .map(|p| Arc::new(p) as Arc<dyn TextGenerator>),
    };

    built.unwrap_or_else(|e| {
        warn!("AI provider {} unavailable: {}", settings.provider.as_str(), e);
        Arc::new(Unavailable {
            name: settings.provider.as_str(),
            error: e,
        })
    })
}

/// Stand-in for a backend that could not be constructed
struct Unavailable {
    name: &'static str,
    error: GenerationError,
}

#[async_trait]
impl TextGenerator for Unavailable {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        Err(self.error.clone())
    }
}

pub(crate) fn http_client(timeout: Duration) -> Result<Client, GenerationError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| GenerationError::NotConfigured(format!("HTTP client: {}", e)))
}

/// Send a request, check the status and decode the JSON body
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: &str,
    request: RequestBuilder,
) -> Result<T, GenerationError> {
    let started = Instant::now();
    let response = request.send().await.map_err(GenerationError::from_reqwest)?;
    let status = response.status();
    debug!("{} responded {} in {:?}", provider, status, started.elapsed());

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GenerationError::Http {
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|e| GenerationError::InvalidResponse(e.to_string()))
}

pub(crate) fn trim_base(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
