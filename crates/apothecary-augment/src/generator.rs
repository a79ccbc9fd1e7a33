//! Generative augmenters.
//!
//! [`OllamaGenerator`] talks to an Ollama-compatible `/api/generate`
//! endpoint. [`DisabledGenerator`] is used when generation is switched off in
//! configuration and always fails, which sends the orchestrator down its
//! fallback path.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use apothecary_core::config::GenerationConfig;

use crate::error::AugmentError;

/// Produces free text from a prompt.
#[async_trait]
pub trait GenerativeAugmenter: Send + Sync {
    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, AugmentError>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

/// Client for an Ollama-compatible text generation server.
pub struct OllamaGenerator {
    client: reqwest::Client,
    url_generate: String,
    model: String,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: f32,
}

impl OllamaGenerator {
    /// Create a client from the generation settings.
    ///
    /// Fails if the endpoint is not an `http://` or `https://` URL.
    pub fn new(config: &GenerationConfig) -> Result<Self, AugmentError> {
        let endpoint = config.endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(AugmentError::Generation(format!(
                "invalid generation endpoint: {:?}",
                config.endpoint
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            url_generate: format!("{}/api/generate", endpoint.trim_end_matches('/')),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    pub fn url(&self) -> &str {
        &self.url_generate
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                num_predict: self.max_tokens,
                temperature: self.temperature,
            },
        }
    }
}

impl std::fmt::Debug for OllamaGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaGenerator")
            .field("url", &self.url_generate)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait]
impl GenerativeAugmenter for OllamaGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, AugmentError> {
        debug!(
            url = %self.url_generate,
            model = %self.model,
            prompt_len = prompt.len(),
            "Requesting generation"
        );

        let mut request = self.client.post(&self.url_generate).json(&self.request_body(prompt));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let resp = request.send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(240).collect();
            return Err(AugmentError::Generation(format!(
                "unexpected HTTP status {} from {}: {}",
                status, self.url_generate, snippet
            )));
        }

        let out: GenerateResponse = resp.json().await.map_err(|e| {
            AugmentError::Generation(format!("failed to decode generation response: {}", e))
        })?;
        debug!(response_len = out.response.len(), "Generation complete");
        Ok(out.response)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Augmenter used when generation is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledGenerator;

#[async_trait]
impl GenerativeAugmenter for DisabledGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, AugmentError> {
        Err(AugmentError::Generation("generation is disabled".to_string()))
    }

    fn name(&self) -> &str {
        "disabled"
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}
