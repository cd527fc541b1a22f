//! Query routing: general mode versus document mode.
//!
//! The router takes one snapshot of the [`IndexHolder`] per query. That
//! snapshot both selects the mode and serves retrieval, so a concurrent
//! upload or clear can never make a query start in one mode and finish in
//! the other.
//!
//! Nepali queries are translated to English on the way in and the answer is
//! translated back on the way out; retrieval and generation always run in
//! English.

use std::sync::Arc;

use thiserror::Error;

use crate::config::Config;
use crate::embedding::Embedder;
use crate::generation::Generator;
use crate::index::{IndexError, IndexHolder};
use crate::models::{Answer, Language, Mode, Query, RetrievedChunk};
use crate::translate::{translate_segmented, Translator};

/// Text a generator appends when it knows its answer was cut short.
pub const INCOMPLETE_MARKER: &str = "Note: The response may be incomplete.";

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Translation failed: {0:#}")]
    Translation(anyhow::Error),
    #[error("Retrieval failed: {0}")]
    Retrieval(#[from] IndexError),
    #[error("Generation failed: {0:#}")]
    Generation(anyhow::Error),
}

pub struct QueryRouter {
    holder: Arc<IndexHolder>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    translator: Arc<dyn Translator>,
    top_k: usize,
    max_translation_chars: usize,
}

impl QueryRouter {
    pub fn new(
        config: &Config,
        holder: Arc<IndexHolder>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        translator: Arc<dyn Translator>,
    ) -> Self {
        Self {
            holder,
            embedder,
            generator,
            translator,
            top_k: config.retrieval.top_k,
            max_translation_chars: config.translation.max_chars,
        }
    }

    /// Route one query. Any text, blank included, is answered in the mode
    /// the holder snapshot selects.
    pub async fn answer(&self, query: &Query) -> Result<Answer, QueryError> {
        let english_query = if query.language.needs_translation() {
            translate_segmented(
                self.translator.as_ref(),
                &query.query,
                query.language,
                Language::En,
                self.max_translation_chars,
            )
            .await
            .map_err(QueryError::Translation)?
        } else {
            query.query.clone()
        };

        let snapshot = self.holder.current().await;
        let (mode, prompt) = match snapshot {
            None => (Mode::General, general_prompt(&english_query)),
            Some(index) => {
                let hits = index
                    .query(self.embedder.as_ref(), &english_query, self.top_k)
                    .await?;
                tracing::debug!(hits = hits.len(), "retrieved context");
                (
                    Mode::Document,
                    document_prompt(&assemble_context(&hits), &english_query),
                )
            }
        };

        let generation = self
            .generator
            .generate(&prompt)
            .await
            .map_err(QueryError::Generation)?;
        if generation.truncated {
            tracing::warn!(model = self.generator.model_name(), "generation hit token limit");
        }

        let response = if query.language.needs_translation() {
            translate_segmented(
                self.translator.as_ref(),
                &generation.text,
                Language::En,
                query.language,
                self.max_translation_chars,
            )
            .await
            .map_err(QueryError::Translation)?
        } else {
            generation.text
        };

        tracing::info!(
            mode = ?mode,
            language = %query.language,
            chars = response.chars().count(),
            "answered query"
        );

        Ok(Answer {
            complete: !is_marked_incomplete(&response),
            response,
            mode,
            truncated: generation.truncated,
        })
    }
}

pub fn general_prompt(query: &str) -> String {
    format!(
        "Please respond to the following question or statement in a helpful and informative way:\n\nQuestion: {}",
        query
    )
}

pub fn document_prompt(context: &str, query: &str) -> String {
    format!(
        "Based on the following content from the documents, please provide a detailed and relevant answer:\n\nContent:\n{}\n\nQuestion: {}\n\nPlease provide a clear and comprehensive response based on the available information.",
        context, query
    )
}

/// Trim each hit, drop the empty ones, and join the rest in rank order.
pub fn assemble_context(hits: &[RetrievedChunk]) -> String {
    hits.iter()
        .map(|h| h.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn is_marked_incomplete(response: &str) -> bool {
    response.ends_with(INCOMPLETE_MARKER)
}
