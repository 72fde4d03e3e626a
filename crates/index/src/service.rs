//! The two-operation facade callers use: ingest and search.

use crate::embeddings::EmbeddingProvider;
use crate::ingest::{IngestOptions, IngestPipeline};
use crate::progress::ProgressReporter;
use crate::ranker::Ranker;
use crate::source::SourceRow;
use crate::store::VectorStore;
use crate::types::{
    IndexConfig, IngestAck, IngestReport, ScoredResult, SearchRequest, SearchResponse,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use vsearch_core::{AppError, AppResult};

/// Ingest and search over one index.
///
/// Holds injected handles only; it is cheap to share behind an `Arc` and safe
/// to call from many tasks at once.
pub struct IndexService {
    config: IndexConfig,
    encoder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    ranker: Arc<dyn Ranker>,
    pipeline: IngestPipeline,
}

impl fmt::Debug for IndexService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexService")
            .field("index", &self.config.name)
            .field("encoder", &self.encoder)
            .field("dimensions", &self.store.dimensions())
            .field("ranker", &self.ranker.strategy())
            .finish_non_exhaustive()
    }
}

impl IndexService {
    /// Wire the components together.
    ///
    /// # Errors
    /// `AppError::DimensionMismatch` when encoder and store disagree on the
    /// vector dimension; that is a deployment error, not a per-call one.
    pub fn new(
        config: IndexConfig,
        encoder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        ranker: Arc<dyn Ranker>,
    ) -> AppResult<Self> {
        if encoder.dimensions() != store.dimensions() {
            return Err(AppError::DimensionMismatch {
                expected: store.dimensions(),
                actual: encoder.dimensions(),
            });
        }

        let pipeline = IngestPipeline::new(
            Arc::clone(&encoder),
            Arc::clone(&store),
            IngestOptions::from(&config),
        );

        Ok(Self {
            config,
            encoder,
            store,
            ranker,
            pipeline,
        })
    }

    /// Replace the ingestion options and progress reporter.
    pub fn with_ingest_options(mut self, options: IngestOptions, progress: ProgressReporter) -> Self {
        self.pipeline = IngestPipeline::new(
            Arc::clone(&self.encoder),
            Arc::clone(&self.store),
            options,
        )
        .with_progress(progress);
        self
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Encode and store a single document.
    pub async fn ingest(&self, id: &str, text: &str) -> AppResult<IngestAck> {
        tracing::debug!("Ingesting document '{}'", id);
        self.pipeline.ingest_one(id, text).await
    }

    /// Ingest every row of a source and return the tally.
    pub async fn ingest_batch<I>(&self, source: I) -> AppResult<IngestReport>
    where
        I: IntoIterator<Item = AppResult<SourceRow>>,
    {
        self.pipeline.ingest_batch(source).await
    }

    /// Return the `k` stored documents most similar to `query`.
    pub async fn search(&self, query: &str, k: usize) -> AppResult<Vec<ScoredResult>> {
        if query.trim().is_empty() {
            return Err(AppError::InvalidRequest(
                "'query' parameter must not be empty".to_string(),
            ));
        }
        if k == 0 {
            return Err(AppError::InvalidRequest("'k' must be at least 1".to_string()));
        }

        tracing::info!(
            "Searching index '{}' (top-{}, ranker {})",
            self.config.name,
            k,
            self.ranker.strategy()
        );

        let timeout = Duration::from_secs(self.config.search_timeout_secs);
        let embedding = tokio::time::timeout(timeout, self.encoder.embed(query))
            .await
            .map_err(|_| {
                AppError::Encoding(format!("Query encoding timed out after {:?}", timeout))
            })??;

        let results = self.ranker.rank(&embedding, k)?;

        match results.first() {
            Some(top) => tracing::info!(
                "Found {} results (top score: {:.3})",
                results.len(),
                top.score
            ),
            None => tracing::info!("No results: index is empty"),
        }

        Ok(results)
    }

    /// Validate a typed request payload and run the search.
    pub async fn handle_search(&self, request: &SearchRequest) -> AppResult<SearchResponse> {
        let (query, k) = request.validate(self.config.default_top_k)?;
        let results = self.search(&query, k).await?;
        Ok(SearchResponse { results })
    }
}
