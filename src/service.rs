//! Wiring of providers, index holder, ingestor, and router.
//!
//! [`QaService`] is what both the HTTP server and the `ask` command drive.
//! Providers are injected through [`Providers`]; [`QaService::from_config`]
//! builds them from the `[embedding]`, `[generation]`, and `[translation]`
//! sections.

use std::sync::Arc;

use anyhow::Result;

use crate::config::Config;
use crate::embedding::{create_embedder, Embedder};
use crate::generation::{create_generator, Generator};
use crate::index::IndexHolder;
use crate::ingest::{IngestError, Ingestor};
use crate::models::{Answer, IngestReport, Query, UploadedFile};
use crate::query::{QueryError, QueryRouter};
use crate::storage::ClearOutcome;
use crate::translate::{create_translator, Translator};

#[derive(Clone)]
pub struct Providers {
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<dyn Generator>,
    pub translator: Arc<dyn Translator>,
}

impl Providers {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            embedder: create_embedder(&config.embedding)?,
            generator: create_generator(&config.generation)?,
            translator: create_translator(&config.translation)?,
        })
    }
}

pub struct QaService {
    holder: Arc<IndexHolder>,
    ingestor: Ingestor,
    router: QueryRouter,
}

impl QaService {
    pub fn new(config: &Config, providers: Providers) -> Self {
        let holder = Arc::new(IndexHolder::new());
        let ingestor = Ingestor::new(config, holder.clone(), providers.embedder.clone());
        let router = QueryRouter::new(
            config,
            holder.clone(),
            providers.embedder,
            providers.generator,
            providers.translator,
        );
        Self {
            holder,
            ingestor,
            router,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let providers = Providers::from_config(config)?;
        tracing::info!(
            embedder = providers.embedder.model_name(),
            generator = providers.generator.model_name(),
            translator = providers.translator.name(),
            "providers ready"
        );
        Ok(Self::new(config, providers))
    }

    pub async fn ingest(&self, files: Vec<UploadedFile>) -> Result<IngestReport, IngestError> {
        self.ingestor.ingest(files).await
    }

    pub async fn answer(&self, query: &Query) -> Result<Answer, QueryError> {
        self.router.answer(query).await
    }

    pub async fn clear(&self) -> ClearOutcome {
        self.ingestor.clear().await
    }

    pub async fn index_loaded(&self) -> bool {
        self.holder.is_present().await
    }
}
