//! Semantic index over the ingested chunks.
//!
//! Three layers:
//!
//! - [`SimilarityIndex`] — nearest-neighbour search over raw vectors.
//!   [`FlatIndex`] is the built-in implementation: brute-force cosine
//!   similarity, which is exact and fast enough for a single upload batch.
//! - [`SemanticIndex`] — the chunks, their vectors, and the model that
//!   produced them. Built in one go from a chunk list; immutable afterwards.
//! - [`IndexHolder`] — the service's single slot for the current index.
//!   A new index is fully built before [`IndexHolder::publish`] swaps it in,
//!   so a reader either gets the previous index or the new one.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;

use crate::embedding::{cosine_similarity, embed_query, Embedder};
use crate::models::{Chunk, RetrievedChunk};

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("cannot build an index from zero chunks")]
    EmptyCorpus,
    #[error("embedding failed: {0:#}")]
    Embedding(anyhow::Error),
    #[error("embedding provider returned {got} vectors for {expected} texts")]
    CountMismatch { expected: usize, got: usize },
    #[error("embedding dimension mismatch: index has {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// A search hit: position of the vector in insertion order, and its score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub position: usize,
    pub score: f32,
}

/// k-nearest-neighbour search over a fixed set of vectors.
pub trait SimilarityIndex: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn dims(&self) -> usize;

    /// Returns up to `k` hits, most similar first.
    fn search(&self, query: &[f32], k: usize) -> Vec<Hit>;
}

/// Exact cosine-similarity search over every stored vector.
pub struct FlatIndex {
    dims: usize,
    vectors: Vec<Vec<f32>>,
}

impl FlatIndex {
    pub fn from_vectors(vectors: Vec<Vec<f32>>) -> Result<Self, IndexError> {
        let dims = vectors.first().map(Vec::len).ok_or(IndexError::EmptyCorpus)?;
        if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
            return Err(IndexError::DimensionMismatch {
                expected: dims,
                got: bad.len(),
            });
        }
        Ok(Self { dims, vectors })
    }
}

impl SimilarityIndex for FlatIndex {
    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn search(&self, query: &[f32], k: usize) -> Vec<Hit> {
        let mut hits: Vec<Hit> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(position, v)| Hit {
                position,
                score: cosine_similarity(query, v),
            })
            .collect();
        // Stable sort: equal scores keep corpus order.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        hits
    }
}

/// Chunks plus their vectors, ready for retrieval.
pub struct SemanticIndex {
    chunks: Vec<Chunk>,
    vectors: Box<dyn SimilarityIndex>,
    model: String,
}

impl std::fmt::Debug for SemanticIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticIndex")
            .field("chunks", &self.chunks.len())
            .field("dims", &self.vectors.dims())
            .field("model", &self.model)
            .finish()
    }
}

impl SemanticIndex {
    /// Embed every chunk (in batches of `batch_size`) and index the vectors.
    ///
    /// Fails on an empty chunk list; document mode needs at least one chunk.
    pub async fn build(
        embedder: &dyn Embedder,
        chunks: Vec<Chunk>,
        batch_size: usize,
    ) -> Result<Self, IndexError> {
        if chunks.is_empty() {
            return Err(IndexError::EmptyCorpus);
        }

        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedded = embedder
                .embed(&texts)
                .await
                .map_err(IndexError::Embedding)?;
            if embedded.len() != texts.len() {
                return Err(IndexError::CountMismatch {
                    expected: texts.len(),
                    got: embedded.len(),
                });
            }
            vectors.extend(embedded);
        }

        Ok(Self {
            chunks,
            vectors: Box::new(FlatIndex::from_vectors(vectors)?),
            model: embedder.model_name().to_string(),
        })
    }

    /// Embed `text` and return the `k` most similar chunks.
    pub async fn query(
        &self,
        embedder: &dyn Embedder,
        text: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, IndexError> {
        let query_vec = embed_query(embedder, text)
            .await
            .map_err(IndexError::Embedding)?;
        if query_vec.len() != self.vectors.dims() {
            return Err(IndexError::DimensionMismatch {
                expected: self.vectors.dims(),
                got: query_vec.len(),
            });
        }

        Ok(self
            .vectors
            .search(&query_vec, k)
            .into_iter()
            .filter_map(|hit| {
                self.chunks.get(hit.position).map(|c| RetrievedChunk {
                    index: c.index,
                    text: c.text.clone(),
                    score: hit.score,
                })
            })
            .collect())
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }
}

/// The single current index, absent until the first successful ingestion.
#[derive(Debug, Default)]
pub struct IndexHolder {
    current: RwLock<Option<Arc<SemanticIndex>>>,
}

impl IndexHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current index. The snapshot stays valid even if the
    /// holder is cleared or replaced while the caller is still using it.
    pub async fn current(&self) -> Option<Arc<SemanticIndex>> {
        self.current.read().await.clone()
    }

    pub async fn is_present(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// Swap in a fully built index, returning the one it replaced.
    pub async fn publish(&self, index: SemanticIndex) -> Option<Arc<SemanticIndex>> {
        self.current.write().await.replace(Arc::new(index))
    }

    pub async fn clear(&self) -> Option<Arc<SemanticIndex>> {
        self.current.write().await.take()
    }
}
