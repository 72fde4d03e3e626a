//! Ingestion pipeline.
//!
//! Drives the encoder and the vector store over a source of (id, text)
//! pairs. Each record succeeds or fails on its own: a failure is recorded in
//! the report and the next record is still attempted. Only a source that can
//! no longer be read stops the run.

use crate::embeddings::EmbeddingProvider;
use crate::progress::ProgressReporter;
use crate::source::{SourceRecord, SourceRow};
use crate::store::{content_hash, VectorStore};
use crate::types::{IndexConfig, IngestAck, IngestFailure, IngestReport};
use std::sync::Arc;
use std::time::{Duration, Instant};
use vsearch_core::{AppError, AppResult};

const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Tuning knobs for a pipeline.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Records encoded per embedding call
    pub batch_size: usize,

    /// Attempts for a put that fails with a retryable error
    pub store_retries: u32,

    /// Backoff before the first retry; doubles on each further attempt
    pub retry_backoff: Duration,

    /// Skip records already stored with identical text
    pub skip_unchanged: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self::from(&IndexConfig::default())
    }
}

impl From<&IndexConfig> for IngestOptions {
    fn from(config: &IndexConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            store_retries: config.store_retries,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            skip_unchanged: false,
        }
    }
}

/// Populates a vector store from (id, text) records.
pub struct IngestPipeline {
    encoder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    options: IngestOptions,
    progress: ProgressReporter,
}

impl IngestPipeline {
    pub fn new(
        encoder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        options: IngestOptions,
    ) -> Self {
        Self {
            encoder,
            store,
            options,
            progress: ProgressReporter::noop(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// Encode and store one record, propagating any failure.
    pub async fn ingest_one(&self, id: &str, text: &str) -> AppResult<IngestAck> {
        if self.is_unchanged(id, text)? {
            return Ok(IngestAck {
                id: id.to_string(),
                written: false,
            });
        }

        let embedding = self.encoder.embed(text).await?;
        self.put_with_retry(id, text, &embedding).await?;

        Ok(IngestAck {
            id: id.to_string(),
            written: true,
        })
    }

    /// Ingest records that are already in memory.
    pub async fn ingest_records(&self, records: Vec<SourceRecord>) -> AppResult<IngestReport> {
        self.ingest_batch(records.into_iter().map(|r| Ok(SourceRow::Record(r))))
            .await
    }

    /// Ingest every row of `source`.
    ///
    /// # Errors
    /// Returns `Err` only when the source fails to yield a row. Every record
    /// read before that point is encoded and stored first.
    pub async fn ingest_batch<I>(&self, source: I) -> AppResult<IngestReport>
    where
        I: IntoIterator<Item = AppResult<SourceRow>>,
    {
        let start = Instant::now();
        let mut report = IngestReport::default();
        let mut pending: Vec<(usize, SourceRecord)> = Vec::with_capacity(self.options.batch_size);

        tracing::info!(
            "Starting ingestion with encoder {}/{} (batch size {})",
            self.encoder.provider_name(),
            self.encoder.model_name(),
            self.options.batch_size
        );

        for row in source {
            let position = report.total;

            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    // Records already read are still attempted before giving up
                    self.flush(&mut pending, &mut report).await;
                    tracing::error!(
                        "Source became unreadable after {} records ({} indexed, {} skipped, {} failed): {}",
                        report.total,
                        report.indexed,
                        report.skipped,
                        report.failures.len(),
                        e
                    );
                    return Err(e);
                }
            };
            report.total += 1;

            match row {
                SourceRow::Record(record) => {
                    pending.push((position, record));
                    if pending.len() >= self.options.batch_size {
                        self.flush(&mut pending, &mut report).await;
                    }
                }
                SourceRow::Malformed { line, id, reason } => {
                    tracing::warn!("Malformed source row at line {}: {}", line, reason);
                    report.failures.push(IngestFailure {
                        position,
                        id,
                        kind: "invalid_request".to_string(),
                        reason: format!("line {}: {}", line, reason),
                        retryable: false,
                    });
                }
            }
        }

        self.flush(&mut pending, &mut report).await;

        report.failures.sort_by_key(|f| f.position);
        report.duration_secs = start.elapsed().as_secs_f64();
        self.progress
            .done(report.total as u64, report.indexed as u64);

        tracing::info!(
            "Ingestion completed: {} records, {} indexed, {} skipped, {} failed in {:.2}s",
            report.total,
            report.indexed,
            report.skipped,
            report.failures.len(),
            report.duration_secs
        );

        Ok(report)
    }

    /// Encode and store the pending records, recording each outcome.
    async fn flush(&self, pending: &mut Vec<(usize, SourceRecord)>, report: &mut IngestReport) {
        if pending.is_empty() {
            return;
        }

        let mut batch = Vec::with_capacity(pending.len());
        for (position, record) in pending.drain(..) {
            match self.is_unchanged(&record.id, &record.text) {
                Ok(true) => report.skipped += 1,
                Ok(false) => batch.push((position, record)),
                Err(e) => report.failures.push(failure(position, &record.id, &e)),
            }
        }

        if batch.is_empty() {
            return;
        }

        self.progress
            .embed(report.total as u64, batch.len(), self.encoder.model_name());

        let texts: Vec<String> = batch.iter().map(|(_, r)| r.text.clone()).collect();
        let embeddings = match self.encoder.embed_batch(&texts).await {
            Ok(embeddings) if embeddings.len() == texts.len() => {
                embeddings.into_iter().map(Ok).collect::<Vec<_>>()
            }
            outcome => {
                let reason = match outcome {
                    Err(e) => e.to_string(),
                    Ok(got) => format!("{} embeddings for {} texts", got.len(), texts.len()),
                };
                tracing::warn!(
                    "Batch encoding failed ({}), encoding {} records one by one",
                    reason,
                    texts.len()
                );

                let mut single = Vec::with_capacity(texts.len());
                for text in &texts {
                    single.push(self.encoder.embed(text).await);
                }
                single
            }
        };

        for ((position, record), embedding) in batch.into_iter().zip(embeddings) {
            let outcome = match embedding {
                Ok(embedding) => self.put_with_retry(&record.id, &record.text, &embedding).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(()) => report.indexed += 1,
                Err(e) => {
                    tracing::warn!("Failed to ingest record '{}': {}", record.id, e);
                    report.failures.push(failure(position, &record.id, &e));
                }
            }
        }

        self.progress
            .index(report.indexed as u64, report.failures.len());
    }

    fn is_unchanged(&self, id: &str, text: &str) -> AppResult<bool> {
        if !self.options.skip_unchanged {
            return Ok(false);
        }
        Ok(self.store.content_hash(id)?.as_deref() == Some(content_hash(text).as_str()))
    }

    async fn put_with_retry(&self, id: &str, text: &str, embedding: &[f32]) -> AppResult<()> {
        let attempts = self.options.store_retries.max(1);
        let mut attempt = 0;

        loop {
            match self.store.put(id, text, embedding) {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                    attempt += 1;
                    let backoff = self.options.retry_backoff * 2_u32.pow(attempt - 1);
                    tracing::warn!(
                        "Store put for '{}' failed (attempt {}/{}), retrying in {:?}: {}",
                        id,
                        attempt,
                        attempts,
                        backoff,
                        e
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn failure(position: usize, id: &str, err: &AppError) -> IngestFailure {
    IngestFailure {
        position,
        id: Some(id.to_string()),
        kind: err.kind().to_string(),
        reason: err.to_string(),
        retryable: err.is_retryable(),
    }
}
