//! Ollama (local) provider

use super::{http_client, send_json, trim_base, TextGenerator};
use crate::error::GenerationError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Local model served by Ollama, no key required
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self, GenerationError> {
        let base_url = trim_base(base_url);
        if base_url.is_empty() {
            return Err(GenerationError::NotConfigured("ollama url is empty".into()));
        }

        Ok(Self {
            client: http_client(timeout)?,
            base_url,
            model: model.to_string(),
        })
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[async_trait]
impl TextGenerator for OllamaProvider {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions { temperature: 0.2 },
        };

        let response: GenerateResponse =
            send_json(self.name(), self.client.post(self.generate_url()).json(&body)).await?;

        if response.response.trim().is_empty() {
            return Err(GenerationError::Empty);
        }
        Ok(response.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generate_response() {
        let parsed: GenerateResponse =
            serde_json::from_str(r#"{"model":"llama3.2","response":"feat: add parser","done":true}"#)
                .unwrap();
        assert_eq!(parsed.response, "feat: add parser");
    }

    #[test]
    fn test_request_shape() {
        let body = GenerateRequest {
            model: "llama3.2",
            prompt: "p",
            stream: false,
            options: GenerateOptions { temperature: 0.2 },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["model"], "llama3.2");
    }

    #[tokio::test]
    async fn test_closed_port_is_network_error() {
        let provider =
            OllamaProvider::new("http://127.0.0.1:9", "llama3.2", Duration::from_secs(5)).unwrap();
        assert_eq!(provider.generate_url(), "http://127.0.0.1:9/api/generate");

        let err = provider.generate("hello").await.unwrap_err();
        assert!(matches!(err, GenerationError::Network(_)), "{err:?}");
    }
}
