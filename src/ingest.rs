//! Ingestion pipeline orchestration.
//!
//! Coordinates one upload batch: reset → validate names → persist →
//! extract pages → normalize → chunk → embed → publish.
//!
//! Every batch replaces the previous one. The index and the upload
//! directory are cleared before anything else happens, so a failed batch
//! leaves the service in general mode with an empty upload directory rather
//! than serving a stale corpus.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

use crate::chunk::chunk_corpus;
use crate::config::{ChunkingConfig, Config};
use crate::embedding::Embedder;
use crate::extract::{extract_pages, ExtractError};
use crate::index::{IndexError, IndexHolder, SemanticIndex};
use crate::models::{IngestReport, UploadedFile};
use crate::normalize::{normalize, PARAGRAPH_SEPARATOR};
use crate::retry::RetryPolicy;
use crate::storage::{ClearOutcome, UploadStore};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("No files uploaded")]
    NoFiles,
    #[error("Invalid filename: {0:?}")]
    InvalidFilename(String),
    #[error("File {0} is not a PDF")]
    NotPdf(String),
    #[error("Failed to store {file}: {source}")]
    Storage {
        file: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Extraction(#[from] ExtractError),
    #[error("No text could be extracted from the uploaded PDFs")]
    NoText,
    #[error("Failed to build index: {0}")]
    Index(#[from] IndexError),
}

impl IngestError {
    /// True for problems with the request itself rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            IngestError::NoFiles | IngestError::InvalidFilename(_) | IngestError::NotPdf(_)
        )
    }
}

pub struct Ingestor {
    store: UploadStore,
    holder: Arc<IndexHolder>,
    embedder: Arc<dyn Embedder>,
    chunking: ChunkingConfig,
    batch_size: usize,
    clear_policy: RetryPolicy,
    // Serializes ingest and clear so two batches never interleave on disk.
    lock: Mutex<()>,
}

impl Ingestor {
    pub fn new(config: &Config, holder: Arc<IndexHolder>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            store: UploadStore::new(config.storage.upload_dir.clone()),
            holder,
            embedder,
            chunking: config.chunking.clone(),
            batch_size: config.embedding.batch_size,
            clear_policy: RetryPolicy::new(
                config.storage.clear_attempts,
                config.storage.clear_backoff(),
            ),
            lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &UploadStore {
        &self.store
    }

    /// Replace the current corpus with the PDFs in `files`.
    pub async fn ingest(&self, files: Vec<UploadedFile>) -> Result<IngestReport, IngestError> {
        let _guard = self.lock.lock().await;

        // Reset happens even for batches that turn out to be invalid.
        self.reset().await;

        if files.is_empty() {
            return Err(IngestError::NoFiles);
        }

        let names = files
            .iter()
            .map(|f| validate_filename(&f.filename))
            .collect::<Result<Vec<_>, _>>()?;

        match self.build(&names, &files).await {
            Ok((index, report)) => {
                self.holder.publish(index).await;
                tracing::info!(
                    files = report.files,
                    pages = report.pages,
                    chunks = report.chunks,
                    "index published"
                );
                Ok(report)
            }
            Err(e) => {
                tracing::error!(error = %e, "ingestion failed");
                self.store.clear(self.clear_policy).await;
                Err(e)
            }
        }
    }

    /// Drop the index and empty the upload directory.
    pub async fn clear(&self) -> ClearOutcome {
        let _guard = self.lock.lock().await;
        self.reset().await
    }

    async fn reset(&self) -> ClearOutcome {
        if self.holder.clear().await.is_some() {
            tracing::info!("previous index dropped");
        }
        self.store.clear(self.clear_policy).await
    }

    async fn build(
        &self,
        names: &[String],
        files: &[UploadedFile],
    ) -> Result<(SemanticIndex, IngestReport), IngestError> {
        let mut documents = Vec::with_capacity(files.len());
        let mut pages = 0;

        for (name, file) in names.iter().zip(files) {
            let path = self
                .store
                .save(name, &file.bytes)
                .await
                .map_err(|source| IngestError::Storage {
                    file: name.clone(),
                    source,
                })?;

            let raw_pages = extract_pages(&path).await?;
            pages += raw_pages.len();
            tracing::info!(file = %name, pages = raw_pages.len(), "extracted");
            documents.push(raw_pages);
        }

        let corpus = aggregate_corpus(&documents);
        let chunks = chunk_corpus(&corpus, &self.chunking);
        if chunks.is_empty() {
            return Err(IngestError::NoText);
        }
        tracing::info!(
            corpus_chars = corpus.chars().count(),
            chunks = chunks.len(),
            "corpus chunked"
        );

        let chunk_count = chunks.len();
        let index = SemanticIndex::build(self.embedder.as_ref(), chunks, self.batch_size).await?;

        Ok((
            index,
            IngestReport {
                files: files.len(),
                pages,
                chunks: chunk_count,
            },
        ))
    }
}

/// Reduce an uploaded name to its final path component and require a
/// `.pdf` extension (any case).
pub fn validate_filename(raw: &str) -> Result<String, IngestError> {
    let name = raw.rsplit(&['/', '\\'][..]).next().unwrap_or("").trim();
    if name.is_empty() || name == "." || name == ".." {
        return Err(IngestError::InvalidFilename(raw.to_string()));
    }
    if !name.to_ascii_lowercase().ends_with(".pdf") {
        return Err(IngestError::NotPdf(name.to_string()));
    }
    Ok(name.to_string())
}

/// Normalize every page and join them into one corpus, skipping pages that
/// normalize to nothing. Pages and documents are separated by a paragraph break.
pub fn aggregate_corpus(documents: &[Vec<String>]) -> String {
    documents
        .iter()
        .flatten()
        .map(|page| normalize(page))
        .filter(|page| !page.is_empty())
        .collect::<Vec<_>>()
        .join(PARAGRAPH_SEPARATOR)
}
