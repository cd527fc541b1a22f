//! Machine translation between English and Nepali.
//!
//! The [`Translator`] trait is the provider seam; [`translate_segmented`]
//! sits on top of it and keeps every provider call under a character limit
//! by splitting long text at sentence boundaries.
//!
//! # Segmentation
//!
//! Text no longer than `max_chars` goes out in one call. Longer text is cut
//! into sentence units on `". "` (each unit keeps its period), the units are
//! packed greedily into segments joined by a single space, and the
//! translated segments are joined back with a space. A unit that alone
//! exceeds the limit is sent whole rather than split mid-sentence.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::TranslationConfig;
use crate::models::Language;

#[async_trait]
pub trait Translator: Send + Sync {
    fn name(&self) -> &str;

    async fn translate(&self, text: &str, source: Language, target: Language) -> Result<String>;
}

// ============ Google (keyless web endpoint) ============

const GOOGLE_URL: &str = "https://translate.googleapis.com/translate_a/single";

pub struct GoogleTranslator {
    url: String,
    client: reqwest::Client,
}

impl GoogleTranslator {
    pub fn new(config: &TranslationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            url: config.url.clone().unwrap_or_else(|| GOOGLE_URL.to_string()),
            client,
        })
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    fn name(&self) -> &str {
        "google"
    }

    async fn translate(&self, text: &str, source: Language, target: Language) -> Result<String> {
        let response = self
            .client
            .post(&self.url)
            .query(&[
                ("client", "gtx"),
                ("sl", source.code()),
                ("tl", target.code()),
                ("dt", "t"),
            ])
            .form(&[("q", text)])
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Translation request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Translation API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_google_response(&json)
    }
}

/// The endpoint answers with `[[["translated", "source", ...], ...], ...]`,
/// one inner entry per sentence it translated.
fn parse_google_response(json: &serde_json::Value) -> Result<String> {
    let sentences = json
        .get(0)
        .and_then(|s| s.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid translation response: missing sentences"))?;

    Ok(sentences
        .iter()
        .filter_map(|s| s.get(0).and_then(|t| t.as_str()))
        .collect())
}

// ============ Disabled ============

pub struct DisabledTranslator;

#[async_trait]
impl Translator for DisabledTranslator {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn translate(&self, _text: &str, source: Language, target: Language) -> Result<String> {
        bail!(
            "Translation provider is disabled; cannot translate {} to {}",
            source,
            target
        )
    }
}

pub fn create_translator(config: &TranslationConfig) -> Result<Arc<dyn Translator>> {
    match config.provider.as_str() {
        "google" => Ok(Arc::new(GoogleTranslator::new(config)?)),
        "disabled" => Ok(Arc::new(DisabledTranslator)),
        other => bail!("Unknown translation provider: {}", other),
    }
}

// ============ Segmentation ============

const SENTENCE_BREAK: &str = ". ";

/// Split `text` into segments of at most `max_chars` characters each,
/// breaking only between sentences.
///
/// Returns a single segment when the text already fits. Segments are never
/// empty; a sentence longer than `max_chars` becomes a segment on its own.
/// Only the space of each `". "` break is consumed, so line and paragraph
/// breaks after it stay in the text and joining the segments with `" "`
/// gives back the input.
pub fn segment(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    let units = text
        .split_inclusive(SENTENCE_BREAK)
        .map(|u| u.strip_suffix(' ').unwrap_or(u))
        .filter(|u| !u.trim().is_empty());

    for unit in units {
        let unit_len = unit.chars().count();
        let joined_len = if current.is_empty() {
            unit_len
        } else {
            current_len + 1 + unit_len
        };

        if joined_len > max_chars && !current.is_empty() {
            segments.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(unit);
        current_len += unit_len;
    }

    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

/// Translate `text`, splitting it first when it exceeds `max_chars`.
///
/// Blank input comes back unchanged without a provider call. Segments are
/// translated in order and their outputs joined with a single space.
pub async fn translate_segmented(
    translator: &dyn Translator,
    text: &str,
    source: Language,
    target: Language,
    max_chars: usize,
) -> Result<String> {
    if text.trim().is_empty() || source == target {
        return Ok(text.to_string());
    }

    let segments = segment(text, max_chars);
    tracing::debug!(
        from = %source,
        to = %target,
        chars = text.chars().count(),
        segments = segments.len(),
        "translating"
    );

    let mut translated = Vec::with_capacity(segments.len());
    for piece in &segments {
        translated.push(translator.translate(piece, source, target).await?);
    }
    Ok(translated.join(" "))
}
