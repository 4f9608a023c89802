//! Thin adapter over the external text-generation service.
//!
//! One prompt in, one free-form text response out. The adapter knows nothing
//! about the domain schemas it is asked to produce, and it never retries —
//! per-item retry decisions belong to the pipeline.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::GenerationSettings;
use crate::errors::GenerationError;

#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// HTTP client for an Anthropic-style messages endpoint.
pub struct HttpGenerationClient {
    http: reqwest::Client,
    settings: GenerationSettings,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

impl HttpGenerationClient {
    pub fn new(settings: GenerationSettings) -> Self {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .unwrap_or_default();
        Self { http, settings }
    }
}

#[async_trait]
impl GenerationClient for HttpGenerationClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}/v1/messages", self.settings.base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.settings.model,
            "max_tokens": 4096,
            "messages": [{"role": "user", "content": prompt}],
        });

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.settings.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(GenerationError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message: crate::domain::truncate_str(&message, 500).to_string(),
            });
        }

        let parsed: MessagesResponse =
            response.json().await.map_err(GenerationError::Transport)?;
        let text: String = parsed
            .content
            .iter()
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(GenerationError::Empty);
        }
        Ok(text)
    }
}
