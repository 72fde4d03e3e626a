//! Index type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vsearch_core::{AppError, AppResult};

/// Number of results returned when a search does not ask for a specific k.
pub const DEFAULT_TOP_K: usize = 5;

/// What `put` does when the id is already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnConflict {
    /// Replace text and embedding in place; the record keeps its insertion order.
    #[default]
    Overwrite,
    /// Store another record under the same id.
    Duplicate,
}

impl OnConflict {
    pub fn as_str(&self) -> &'static str {
        match self {
            OnConflict::Overwrite => "overwrite",
            OnConflict::Duplicate => "duplicate",
        }
    }
}

impl std::str::FromStr for OnConflict {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s {
            "overwrite" => Ok(OnConflict::Overwrite),
            "duplicate" => Ok(OnConflict::Duplicate),
            other => Err(AppError::Config(format!(
                "Unknown conflict policy '{}'. Supported: overwrite, duplicate",
                other
            ))),
        }
    }
}

/// Configuration for one index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexConfig {
    /// Name of the index
    pub name: String,

    /// Embedding provider: "trigram" or "ollama"
    pub provider: String,

    /// Embedding model identifier
    pub model: String,

    /// Embedding vector dimension
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Re-ingest policy for an id that is already stored
    #[serde(default)]
    pub on_conflict: OnConflict,

    /// Records encoded per embedding call during ingestion
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Attempts made for a put that fails with a retryable store error
    #[serde(default = "default_store_retries")]
    pub store_retries: u32,

    /// Result count used when a search request omits k
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Upper bound on query encoding time
    #[serde(default = "default_search_timeout_secs")]
    pub search_timeout_secs: u64,

    /// Name of the id column in tabular sources
    #[serde(default = "default_id_column")]
    pub id_column: String,

    /// Name of the text column in tabular sources
    #[serde(default = "default_text_column")]
    pub text_column: String,

    /// Provider-specific settings (e.g. Ollama endpoint)
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub provider_config: serde_json::Value,
}

fn default_dimensions() -> usize {
    768
}

fn default_batch_size() -> usize {
    32
}

fn default_store_retries() -> u32 {
    3
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_search_timeout_secs() -> u64 {
    30
}

fn default_id_column() -> String {
    "id".to_string()
}

fn default_text_column() -> String {
    "text".to_string()
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: default_dimensions(),
            on_conflict: OnConflict::default(),
            batch_size: default_batch_size(),
            store_retries: default_store_retries(),
            default_top_k: default_top_k(),
            search_timeout_secs: default_search_timeout_secs(),
            id_column: default_id_column(),
            text_column: default_text_column(),
            provider_config: serde_json::Value::Null,
        }
    }
}

impl IndexConfig {
    /// Check values that would otherwise fail later at ingest or search time.
    pub fn validate(&self) -> AppResult<()> {
        if self.dimensions == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be greater than zero".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(AppError::Config(
                "Batch size must be greater than zero".to_string(),
            ));
        }
        if self.default_top_k == 0 {
            return Err(AppError::Config(
                "Default top-k must be greater than zero".to_string(),
            ));
        }
        if self.id_column == self.text_column {
            return Err(AppError::Config(format!(
                "Id and text columns must differ (both are '{}')",
                self.id_column
            )));
        }
        Ok(())
    }
}

/// A stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Caller-supplied identifier
    pub id: String,

    /// Original text
    pub text: String,

    /// Embedding vector
    pub embedding: Vec<f32>,

    /// Store-assigned insertion sequence; lower was inserted first
    pub seq: u64,
}

/// One ranked search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    pub id: String,
    pub text: String,
    /// Cosine similarity shifted into [0, 2]
    pub score: f32,
}

/// Search request payload.
///
/// `query` is optional at the type level so that a missing field is reported as
/// an invalid request rather than a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: Option<String>,

    #[serde(default)]
    pub k: Option<usize>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            k: None,
        }
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }

    /// Parse a JSON request body.
    pub fn from_json(body: &str) -> AppResult<Self> {
        serde_json::from_str(body)
            .map_err(|e| AppError::InvalidRequest(format!("Malformed search request: {}", e)))
    }

    /// Validate and resolve into a query text and result count.
    pub fn validate(&self, default_k: usize) -> AppResult<(String, usize)> {
        let query = match self.query.as_deref() {
            Some(q) if !q.trim().is_empty() => q.to_string(),
            Some(_) => {
                return Err(AppError::InvalidRequest(
                    "'query' parameter must not be empty".to_string(),
                ))
            }
            None => {
                return Err(AppError::InvalidRequest(
                    "Missing 'query' parameter".to_string(),
                ))
            }
        };

        let k = self.k.unwrap_or(default_k);
        if k == 0 {
            return Err(AppError::InvalidRequest(
                "'k' must be at least 1".to_string(),
            ));
        }

        Ok((query, k))
    }
}

/// Search response payload, ordered by descending similarity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<ScoredResult>,
}

/// Acknowledgement of a single ingested record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestAck {
    pub id: String,
    /// False when the record was already stored with identical text and skipped
    pub written: bool,
}

/// A record that could not be ingested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestFailure {
    /// Zero-based position of the record in the source
    pub position: usize,

    /// Record id, when the row got far enough to have one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Error category (see `AppError::kind`)
    pub kind: String,

    /// Human-readable cause
    pub reason: String,

    /// Whether retrying this record may succeed
    pub retryable: bool,
}

/// Tally of a batch ingestion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    /// Records read from the source, including malformed ones
    pub total: usize,

    /// Records written to the store
    pub indexed: usize,

    /// Records skipped because they were already stored unchanged
    pub skipped: usize,

    /// Per-record failures, in source order
    pub failures: Vec<IngestFailure>,

    /// Duration in seconds
    pub duration_secs: f64,
}

impl IngestReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Statistics for an index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub index_name: String,
    pub documents_count: usize,
    pub dimensions: usize,
    pub provider: String,
    pub model: String,
    pub on_conflict: OnConflict,
    pub db_size_bytes: u64,
    pub created_at: Option<DateTime<Utc>>,
}
