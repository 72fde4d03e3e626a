//! Similarity ranking.
//!
//! A `Ranker` turns a query vector into the top-k stored documents. The scan
//! strategy is behind the trait so an approximate index can replace
//! `BruteForceRanker` without changing what callers see.

use crate::store::VectorStore;
use crate::types::{Document, ScoredResult};
use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use vsearch_core::{AppError, AppResult};

/// Offset added to cosine similarity so scores fall in [0, 2].
pub const SCORE_OFFSET: f32 = 1.0;

/// Trait for ranking strategies.
pub trait Ranker: Send + Sync {
    /// Return at most `k` documents ordered by descending score.
    fn rank(&self, query: &[f32], k: usize) -> AppResult<Vec<ScoredResult>>;

    /// Short name of the strategy, for logs.
    fn strategy(&self) -> &str;
}

/// Exact ranker that scores every stored document.
pub struct BruteForceRanker {
    store: Arc<dyn VectorStore>,
    skipped: AtomicU64,
}

impl BruteForceRanker {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self {
            store,
            skipped: AtomicU64::new(0),
        }
    }

    /// Documents skipped for malformed embeddings since this ranker was created.
    pub fn skipped_total(&self) -> u64 {
        self.skipped.load(AtomicOrdering::Relaxed)
    }

    fn score_all(&self, query: &[f32], documents: Vec<Document>) -> Vec<(u64, ScoredResult)> {
        let dimensions = query.len();
        let query_norm = norm(query);
        let mut scored = Vec::with_capacity(documents.len());

        for doc in documents {
            if doc.embedding.len() != dimensions {
                self.report_skip(&doc, &format!(
                    "embedding has {} dimensions, expected {}",
                    doc.embedding.len(),
                    dimensions
                ));
                continue;
            }

            if !doc.embedding.iter().all(|x| x.is_finite()) {
                self.report_skip(&doc, "embedding contains non-finite values");
                continue;
            }

            let score = cosine_score(query, query_norm, &doc.embedding);

            scored.push((
                doc.seq,
                ScoredResult {
                    id: doc.id,
                    text: doc.text,
                    score,
                },
            ));
        }

        scored
    }

    fn report_skip(&self, doc: &Document, reason: &str) {
        let total = self.skipped.fetch_add(1, AtomicOrdering::Relaxed) + 1;
        tracing::warn!(
            doc_id = %doc.id,
            seq = doc.seq,
            skipped_total = total,
            "Skipping document during ranking: {}",
            reason
        );
    }
}

impl Ranker for BruteForceRanker {
    fn rank(&self, query: &[f32], k: usize) -> AppResult<Vec<ScoredResult>> {
        let dimensions = self.store.dimensions();
        if query.len() != dimensions {
            return Err(AppError::DimensionMismatch {
                expected: dimensions,
                actual: query.len(),
            });
        }

        if !query.iter().all(|x| x.is_finite()) {
            return Err(AppError::Encoding(
                "Query embedding contains non-finite values".to_string(),
            ));
        }

        if k == 0 {
            return Ok(Vec::new());
        }

        let documents = self.store.all()?;
        let candidates = documents.len();
        let mut scored = self.score_all(query, documents);

        // Descending score, then first-inserted first
        scored.sort_by(|(seq_a, a), (seq_b, b)| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| seq_a.cmp(seq_b))
        });
        scored.truncate(k);

        tracing::debug!(
            "Ranked {} documents, returning {} (requested top-{})",
            candidates,
            scored.len(),
            k
        );

        Ok(scored.into_iter().map(|(_, result)| result).collect())
    }

    fn strategy(&self) -> &str {
        "brute-force"
    }
}

fn norm(v: &[f32]) -> f64 {
    v.iter().map(|&x| x as f64 * x as f64).sum::<f64>().sqrt()
}

/// Cosine similarity shifted by `SCORE_OFFSET`.
///
/// Accumulates in f64 so large finite components cannot overflow. Cosine is
/// undefined when either vector has zero length; that case maps to the
/// midpoint score 1.0.
pub fn cosine_score(query: &[f32], query_norm: f64, embedding: &[f32]) -> f32 {
    let embedding_norm = norm(embedding);
    if query_norm == 0.0 || embedding_norm == 0.0 {
        return SCORE_OFFSET;
    }

    let dot: f64 = query
        .iter()
        .zip(embedding)
        .map(|(&q, &e)| q as f64 * e as f64)
        .sum();
    let cosine = (dot / (query_norm * embedding_norm)).clamp(-1.0, 1.0);
    cosine as f32 + SCORE_OFFSET
}
