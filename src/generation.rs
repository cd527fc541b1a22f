//! Text generation providers.
//!
//! Defines the [`Generator`] trait (prompt in, text out) and concrete
//! implementations:
//! - **[`GeminiGenerator`]** — Google Generative Language `generateContent`.
//!   Requires `GEMINI_API_KEY`.
//! - **[`OllamaGenerator`]** — a local Ollama instance's `/api/generate`.
//! - **[`DisabledGenerator`]** — always errors; for deployments that only ingest.
//!
//! Sampling parameters (temperature, top-p, top-k, output token cap) come
//! from `[generation]` in the config. Each prompt is one request; there is
//! no retry.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::GenerationConfig;

/// Output of a generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    /// The provider reported stopping at the output token limit.
    pub truncated: bool,
}

#[async_trait]
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<Generation>;
}

// ============ Gemini ============

const GEMINI_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiGenerator {
    config: GenerationConfig,
    api_key: String,
    url: String,
    client: reqwest::Client,
}

impl GeminiGenerator {
    /// # Errors
    ///
    /// Returns an error if `GEMINI_API_KEY` is not in the environment.
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow::anyhow!("GEMINI_API_KEY environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config: config.clone(),
            api_key,
            url: config.url.clone().unwrap_or_else(|| GEMINI_URL.to_string()),
            client,
        })
    }
}

/// Build the request body for the Gemini `generateContent` API.
fn gemini_request_body(config: &GenerationConfig, prompt: &str) -> serde_json::Value {
    serde_json::json!({
        "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        "generationConfig": {
            "temperature": config.temperature,
            "topP": config.top_p,
            "topK": config.top_k,
            "maxOutputTokens": config.max_output_tokens,
            "responseMimeType": "text/plain",
        }
    })
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, prompt: &str) -> Result<Generation> {
        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.url, self.config.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&gemini_request_body(&self.config, prompt))
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Gemini request failed: {}", e))?;
        tracing::debug!(model = %self.config.model, "gemini request sent");

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Gemini API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_gemini_response(&json)
    }
}

/// Concatenate the text parts of the first candidate.
///
/// A response without text (blocked prompt, safety stop) is an error, so the
/// caller never passes an empty answer off as a real one.
fn parse_gemini_response(json: &serde_json::Value) -> Result<Generation> {
    let candidate = match json
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
    {
        Some(c) => c,
        None => {
            let reason = json
                .pointer("/promptFeedback/blockReason")
                .and_then(|r| r.as_str())
                .unwrap_or("no candidates returned");
            bail!("Gemini returned no answer: {}", reason);
        }
    };

    let finish_reason = candidate
        .get("finishReason")
        .and_then(|r| r.as_str())
        .unwrap_or("");

    let text: String = candidate
        .pointer("/content/parts")
        .and_then(|p| p.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        bail!(
            "Gemini returned no text (finish reason: {})",
            if finish_reason.is_empty() { "unknown" } else { finish_reason }
        );
    }

    Ok(Generation {
        text,
        truncated: finish_reason == "MAX_TOKENS",
    })
}

// ============ Ollama ============

pub struct OllamaGenerator {
    config: GenerationConfig,
    url: String,
    client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            config: config.clone(),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            client,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, prompt: &str) -> Result<Generation> {
        let body = serde_json::json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.config.temperature,
                "top_p": self.config.top_p,
                "top_k": self.config.top_k,
                "num_predict": self.config.max_output_tokens,
            }
        });

        let response = self
            .client
            .post(format!("{}/api/generate", self.url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                anyhow::anyhow!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    self.url,
                    e
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Ollama API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        let text = json
            .get("response")
            .and_then(|r| r.as_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing response text"))?;

        Ok(Generation {
            text: text.to_string(),
            truncated: json.get("done_reason").and_then(|r| r.as_str()) == Some("length"),
        })
    }
}

// ============ Disabled ============

pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _prompt: &str) -> Result<Generation> {
        bail!("Generation provider is disabled. Set [generation] provider in config.")
    }
}

/// Create the [`Generator`] named by `config.provider`.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiGenerator::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        other => bail!("Unknown generation provider: {}", other),
    }
}
