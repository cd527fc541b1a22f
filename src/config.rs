//! TOML configuration.
//!
//! Every section has defaults, so an empty file (or no file at all, see
//! [`load_or_default`]) yields a working configuration that mirrors the
//! reference deployment: 3000/500 character chunks, top-7 retrieval, a
//! 4000 character translation window, and a three-attempt upload cleanup.
//!
//! # Embeddings
//!
//! `[embedding] provider` defaults to `local` (a sentence-transformer run
//! through fastembed, `all-minilm-l6-v2` unless `model` says otherwise) when
//! the crate is built with the `local-embeddings` feature, and to `hash`
//! otherwise. The `hash` embedder is lexical: a feature-hashed bag of words
//! with no model behind it. Retrieval then matches shared words, not
//! meaning. Set `provider = "openai"` or `"ollama"` for semantic search in a
//! build without the feature.
//!
//! Secrets never live in this file. Providers read their API keys from the
//! environment (`GEMINI_API_KEY`, `OPENAI_API_KEY`), which `main` seeds from
//! a `.env` file when present.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub translation: TranslationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum accepted request body for `/upload/`, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_max_upload_bytes() -> usize {
    100 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    #[serde(default = "default_clear_attempts")]
    pub clear_attempts: u32,
    #[serde(default = "default_clear_backoff_ms")]
    pub clear_backoff_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            clear_attempts: default_clear_attempts(),
            clear_backoff_ms: default_clear_backoff_ms(),
        }
    }
}

impl StorageConfig {
    pub fn clear_backoff(&self) -> Duration {
        Duration::from_millis(self.clear_backoff_ms)
    }
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}
fn default_clear_attempts() -> u32 {
    3
}
fn default_clear_backoff_ms() -> u64 {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Target chunk length in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Maximum characters shared between consecutive chunks.
    #[serde(default = "default_chunk_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    3000
}
fn default_chunk_overlap() -> usize {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    7
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[cfg(feature = "local-embeddings")]
fn default_embedding_provider() -> String {
    "local".to_string()
}
#[cfg(not(feature = "local-embeddings"))]
fn default_embedding_provider() -> String {
    "hash".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_generation_top_k")]
    pub top_k: u32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: default_generation_model(),
            url: None,
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_generation_top_k(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_generation_provider() -> String {
    "gemini".to_string()
}
fn default_generation_model() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_top_p() -> f32 {
    0.95
}
fn default_generation_top_k() -> u32 {
    64
}
fn default_max_output_tokens() -> u32 {
    2048
}

#[derive(Debug, Deserialize, Clone)]
pub struct TranslationConfig {
    #[serde(default = "default_translation_provider")]
    pub provider: String,
    #[serde(default)]
    pub url: Option<String>,
    /// Longest text handed to the translator in a single call.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_translation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: default_translation_provider(),
            url: None,
            max_chars: default_max_chars(),
            timeout_secs: default_translation_timeout_secs(),
        }
    }
}

fn default_translation_provider() -> String {
    "google".to_string()
}
fn default_max_chars() -> usize {
    4000
}
fn default_translation_timeout_secs() -> u64 {
    30
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

/// Loads `path` when it exists, otherwise returns validated defaults.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            anyhow::bail!("chunking.chunk_size must be > 0");
        }
        if self.chunking.overlap >= self.chunking.chunk_size {
            anyhow::bail!("chunking.overlap must be smaller than chunking.chunk_size");
        }

        if self.retrieval.top_k == 0 {
            anyhow::bail!("retrieval.top_k must be >= 1");
        }

        if self.storage.clear_attempts == 0 {
            anyhow::bail!("storage.clear_attempts must be >= 1");
        }

        if self.translation.max_chars == 0 {
            anyhow::bail!("translation.max_chars must be > 0");
        }

        if self.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be > 0");
        }

        match self.embedding.provider.as_str() {
            "hash" | "local" => {}
            "openai" | "ollama" => {
                if self.embedding.model.is_none() {
                    anyhow::bail!(
                        "embedding.model must be specified when provider is '{}'",
                        self.embedding.provider
                    );
                }
            }
            other => anyhow::bail!(
                "Unknown embedding provider: '{}'. Must be hash, openai, ollama, or local.",
                other
            ),
        }
        if self.embedding.dims == Some(0) {
            anyhow::bail!("embedding.dims must be > 0");
        }

        match self.generation.provider.as_str() {
            "gemini" | "ollama" | "disabled" => {}
            other => anyhow::bail!(
                "Unknown generation provider: '{}'. Must be gemini, ollama, or disabled.",
                other
            ),
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            anyhow::bail!("generation.temperature must be in [0.0, 2.0]");
        }
        if !(0.0..=1.0).contains(&self.generation.top_p) {
            anyhow::bail!("generation.top_p must be in [0.0, 1.0]");
        }

        match self.translation.provider.as_str() {
            "google" | "disabled" => {}
            other => anyhow::bail!(
                "Unknown translation provider: '{}'. Must be google or disabled.",
                other
            ),
        }

        Ok(())
    }
}
