//! Ingestion outcomes: per-record failures, retries and skipping.

use super::{FixtureStore, FlakyStore, WordOverlapEncoder};
use crate::embeddings::EmbeddingConfig;
use crate::ingest::{IngestOptions, IngestPipeline};
use crate::source::{SourceRecord, SourceRow, TsvSource};
use crate::sqlite_store::SqliteStore;
use crate::store::VectorStore;
use crate::types::OnConflict;
use std::sync::Arc;
use std::time::Duration;
use vsearch_core::AppError;

const VOCABULARY: &[&str] = &["alpha", "beta", "gamma", "delta"];

fn sqlite_store(on_conflict: OnConflict) -> Arc<SqliteStore> {
    let config = EmbeddingConfig {
        dimensions: VOCABULARY.len(),
        ..Default::default()
    };
    Arc::new(SqliteStore::open_in_memory(&config, on_conflict).unwrap())
}

fn options(batch_size: usize) -> IngestOptions {
    IngestOptions {
        batch_size,
        store_retries: 3,
        retry_backoff: Duration::from_millis(1),
        skip_unchanged: false,
    }
}

fn records(pairs: &[(&str, &str)]) -> Vec<SourceRecord> {
    pairs
        .iter()
        .map(|(id, text)| SourceRecord::new(*id, *text))
        .collect()
}

#[tokio::test]
async fn test_failing_record_does_not_stop_the_batch() {
    let encoder = Arc::new(WordOverlapEncoder::new(VOCABULARY).failing_on("poison"));
    let store = sqlite_store(OnConflict::Overwrite);
    let pipeline = IngestPipeline::new(encoder, store.clone(), options(2));

    let report = pipeline
        .ingest_records(records(&[
            ("1", "alpha"),
            ("2", "poison beta"),
            ("3", "gamma"),
            ("4", "delta"),
        ]))
        .await
        .unwrap();

    assert_eq!(report.total, 4);
    assert_eq!(report.indexed, 3);
    assert_eq!(report.failures.len(), 1);
    assert!(!report.is_success());

    let failure = &report.failures[0];
    assert_eq!(failure.position, 1);
    assert_eq!(failure.id.as_deref(), Some("2"));
    assert_eq!(failure.kind, "encoding");
    assert!(!failure.retryable);

    assert_eq!(store.len().unwrap(), 3);
    assert!(store.exists("3").unwrap(), "Records after the failure are still stored");
    assert!(!store.exists("2").unwrap());
}

#[tokio::test]
async fn test_batch_failure_falls_back_to_single_records() {
    let encoder = Arc::new(WordOverlapEncoder::new(VOCABULARY).failing_on("poison"));
    let store = sqlite_store(OnConflict::Overwrite);
    let pipeline = IngestPipeline::new(encoder.clone(), store.clone(), options(8));

    let report = pipeline
        .ingest_records(records(&[("a", "alpha"), ("b", "poison"), ("c", "gamma")]))
        .await
        .unwrap();

    // One failed batch call, then three single-record calls
    assert_eq!(encoder.batch_calls(), 4);
    assert_eq!(report.indexed, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(store.len().unwrap(), 2);
}

#[tokio::test]
async fn test_store_unavailable_is_retried() {
    let encoder = Arc::new(WordOverlapEncoder::new(VOCABULARY));
    let store = Arc::new(FlakyStore::new(
        FixtureStore::new(VOCABULARY.len(), Vec::new()),
        2,
    ));
    let pipeline = IngestPipeline::new(encoder, store.clone(), options(4));

    let report = pipeline
        .ingest_records(records(&[("1", "alpha")]))
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.indexed, 1);
    assert_eq!(store.put_calls(), 3);
}

#[tokio::test]
async fn test_exhausted_retries_are_reported_as_retryable() {
    let encoder = Arc::new(WordOverlapEncoder::new(VOCABULARY));
    let store = Arc::new(FlakyStore::new(
        FixtureStore::new(VOCABULARY.len(), Vec::new()),
        10,
    ));
    let pipeline = IngestPipeline::new(encoder, store.clone(), options(4));

    let report = pipeline
        .ingest_records(records(&[("1", "alpha"), ("2", "beta")]))
        .await
        .unwrap();

    assert_eq!(report.indexed, 0);
    assert_eq!(report.failures.len(), 2);
    assert!(report.failures.iter().all(|f| f.retryable));
    assert!(report.failures.iter().all(|f| f.kind == "store_unavailable"));
    assert_eq!(store.put_calls(), 6);
}

#[tokio::test]
async fn test_ingest_one_propagates_errors() {
    let encoder = Arc::new(WordOverlapEncoder::new(VOCABULARY).failing_on("poison"));
    let store = sqlite_store(OnConflict::Overwrite);
    let pipeline = IngestPipeline::new(encoder, store.clone(), options(4));

    let ack = pipeline.ingest_one("ok", "alpha").await.unwrap();
    assert!(ack.written);

    let err = pipeline.ingest_one("bad", "poison").await.unwrap_err();
    assert!(matches!(err, AppError::Encoding(_)));

    let err = pipeline.ingest_one("", "alpha").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidRequest(_)));

    assert_eq!(store.len().unwrap(), 1);
}

#[tokio::test]
async fn test_reingest_overwrite_keeps_one_record() {
    let encoder = Arc::new(WordOverlapEncoder::new(VOCABULARY));
    let store = sqlite_store(OnConflict::Overwrite);
    let pipeline = IngestPipeline::new(encoder, store.clone(), options(4));

    pipeline.ingest_one("same", "alpha").await.unwrap();
    pipeline.ingest_one("same", "alpha").await.unwrap();

    assert_eq!(store.len().unwrap(), 1);
}

#[tokio::test]
async fn test_reingest_duplicate_keeps_both_records() {
    let encoder = Arc::new(WordOverlapEncoder::new(VOCABULARY));
    let store = sqlite_store(OnConflict::Duplicate);
    let pipeline = IngestPipeline::new(encoder, store.clone(), options(4));

    pipeline.ingest_one("same", "alpha").await.unwrap();
    pipeline.ingest_one("same", "alpha").await.unwrap();

    assert_eq!(store.len().unwrap(), 2);
    assert!(store.all().unwrap().iter().all(|d| d.id == "same"));
}

#[tokio::test]
async fn test_skip_unchanged_only_skips_identical_text() {
    let encoder = Arc::new(WordOverlapEncoder::new(VOCABULARY));
    let store = sqlite_store(OnConflict::Overwrite);
    let pipeline = IngestPipeline::new(
        encoder.clone(),
        store.clone(),
        IngestOptions {
            skip_unchanged: true,
            ..options(4)
        },
    );

    let first = pipeline
        .ingest_records(records(&[("1", "alpha"), ("2", "beta")]))
        .await
        .unwrap();
    assert_eq!(first.indexed, 2);
    assert_eq!(first.skipped, 0);

    let calls_before = encoder.batch_calls();
    let second = pipeline
        .ingest_records(records(&[("1", "alpha"), ("2", "gamma")]))
        .await
        .unwrap();
    assert_eq!(second.indexed, 1);
    assert_eq!(second.skipped, 1);
    assert_eq!(encoder.batch_calls(), calls_before + 1);

    let docs = store.all().unwrap();
    let two = docs.iter().find(|d| d.id == "2").unwrap();
    assert_eq!(two.text, "gamma");

    let ack = pipeline.ingest_one("1", "alpha").await.unwrap();
    assert!(!ack.written);
}

#[tokio::test]
async fn test_malformed_rows_are_reported_in_order() {
    let encoder = Arc::new(WordOverlapEncoder::new(VOCABULARY));
    let store = sqlite_store(OnConflict::Overwrite);
    let pipeline = IngestPipeline::new(encoder, store.clone(), options(4));

    let data = "id\ttext\n1\talpha\nbroken\n3\tgamma\n";
    let source = TsvSource::from_reader(data.as_bytes(), "id", "text").unwrap();
    let report = pipeline.ingest_batch(source).await.unwrap();

    assert_eq!(report.total, 3);
    assert_eq!(report.indexed, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].position, 1);
    assert_eq!(report.failures[0].kind, "invalid_request");
    assert_eq!(store.len().unwrap(), 2);
}

#[tokio::test]
async fn test_unreadable_source_is_fatal() {
    let encoder = Arc::new(WordOverlapEncoder::new(VOCABULARY));
    let store = sqlite_store(OnConflict::Overwrite);
    let pipeline = IngestPipeline::new(encoder, store.clone(), options(32));

    let rows = vec![
        Ok(SourceRow::Record(SourceRecord::new("1", "alpha"))),
        Ok(SourceRow::Record(SourceRecord::new("2", "beta"))),
        Err(AppError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "connection reset",
        ))),
        Ok(SourceRow::Record(SourceRecord::new("3", "gamma"))),
    ];

    let err = pipeline.ingest_batch(rows).await.unwrap_err();
    assert!(matches!(err, AppError::Io(_)));

    // Records read before the failure are stored even though the batch was not full
    assert!(store.exists("1").unwrap());
    assert!(store.exists("2").unwrap());
    assert!(!store.exists("3").unwrap(), "Nothing after the failure is read");
}

#[tokio::test]
async fn test_wrong_length_embedding_is_a_record_failure() {
    let encoder = Arc::new(WordOverlapEncoder::new(VOCABULARY).short_on("short"));
    let store = sqlite_store(OnConflict::Overwrite);
    let pipeline = IngestPipeline::new(encoder, store.clone(), options(4));

    let report = pipeline
        .ingest_records(records(&[
            ("1", "alpha"),
            ("2", "short beta"),
            ("3", "gamma"),
        ]))
        .await
        .unwrap();

    assert_eq!(report.total, 3);
    assert_eq!(report.indexed, 2);
    assert_eq!(report.failures.len(), 1);

    let failure = &report.failures[0];
    assert_eq!(failure.position, 1);
    assert_eq!(failure.id.as_deref(), Some("2"));
    assert_eq!(failure.kind, "dimension_mismatch");
    assert!(!failure.retryable);

    assert!(!store.exists("2").unwrap());
    assert!(store.exists("3").unwrap(), "Later records are still ingested");
    assert!(store
        .all()
        .unwrap()
        .iter()
        .all(|d| d.embedding.len() == VOCABULARY.len()));
}
