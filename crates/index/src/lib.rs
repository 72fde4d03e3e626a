//! Dense-vector document index.
//!
//! Encodes documents into fixed-dimension embeddings, stores them durably in
//! SQLite and ranks them against queries by cosine similarity.

pub mod config;
pub mod embeddings;
pub mod ingest;
pub mod progress;
pub mod ranker;
pub mod service;
pub mod source;
pub mod sqlite_store;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use embeddings::{create_provider, EmbeddingConfig, EmbeddingProvider};
pub use ingest::{IngestOptions, IngestPipeline};
pub use ranker::{BruteForceRanker, Ranker};
pub use service::IndexService;
pub use source::{SourceRecord, SourceRow, TsvSource};
pub use sqlite_store::SqliteStore;
pub use store::VectorStore;
pub use types::{
    Document, IndexConfig, IndexStats, IngestAck, IngestFailure, IngestReport, OnConflict,
    ScoredResult, SearchRequest, SearchResponse,
};

use std::path::Path;
use std::sync::Arc;
use vsearch_core::{AppError, AppResult};

/// Save `config` and establish the index mapping before any document is stored.
///
/// Creating an index that already exists with the same encoder is a no-op;
/// a different encoder or dimension is an error.
pub fn create_index(workspace: &Path, config: &IndexConfig) -> AppResult<IndexStats> {
    tracing::info!("Creating index '{}'", config.name);
    config.validate()?;

    let store = open_store(workspace, config)?;
    config::save_config(workspace, config)?;

    tracing::info!(
        "Index '{}' ready ({} dimensions, encoder {}/{})",
        config.name,
        config.dimensions,
        config.provider,
        config.model
    );

    collect_stats(config, &store)
}

/// Open an index and wire up its encoder, store and ranker.
///
/// With `create_if_missing`, a missing index is created from its config
/// (or the defaults) first.
pub async fn open_index(
    workspace: &Path,
    index_name: &str,
    create_if_missing: bool,
) -> AppResult<IndexService> {
    let config = config::load_config(workspace, index_name)?;
    let store_path = config::get_store_path(workspace, index_name);

    if !store_path.exists() {
        if !create_if_missing {
            return Err(AppError::Config(format!(
                "Index '{}' does not exist. Run 'vsearch create-index' first.",
                index_name
            )));
        }
        create_index(workspace, &config)?;
    }

    let store: Arc<dyn VectorStore> = Arc::new(open_store(workspace, &config)?);
    let encoder = create_provider(&EmbeddingConfig::from(&config)).await?;
    let ranker: Arc<dyn Ranker> = Arc::new(BruteForceRanker::new(Arc::clone(&store)));

    tracing::debug!(
        "Opened index '{}' with encoder {}/{}",
        index_name,
        encoder.provider_name(),
        encoder.model_name()
    );

    IndexService::new(config, encoder, store, ranker)
}

/// Get statistics for an index.
pub fn stats(workspace: &Path, index_name: &str) -> AppResult<IndexStats> {
    tracing::info!("Getting stats for index '{}'", index_name);

    let config = config::load_config(workspace, index_name)?;
    if !config::get_store_path(workspace, index_name).exists() {
        return Err(AppError::Config(format!(
            "Index '{}' does not exist",
            index_name
        )));
    }

    let store = open_store(workspace, &config)?;
    collect_stats(&config, &store)
}

fn open_store(workspace: &Path, config: &IndexConfig) -> AppResult<SqliteStore> {
    SqliteStore::open(
        &config::get_store_path(workspace, &config.name),
        &EmbeddingConfig::from(config),
        config.on_conflict,
    )
}

fn collect_stats(config: &IndexConfig, store: &SqliteStore) -> AppResult<IndexStats> {
    let mapping = store.mapping();
    Ok(IndexStats {
        index_name: config.name.clone(),
        documents_count: store.len()?,
        dimensions: mapping.embedding.dimensions,
        provider: mapping.embedding.provider.clone(),
        model: mapping.embedding.model.clone(),
        on_conflict: mapping.on_conflict,
        db_size_bytes: store.size_bytes(),
        created_at: mapping.created_at,
    })
}
