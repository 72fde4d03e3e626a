//! Ranking behavior across stores and malformed data.

use super::{doc, FixtureStore};
use crate::embeddings::{normalize, EmbeddingConfig};
use crate::ranker::{BruteForceRanker, Ranker};
use crate::sqlite_store::SqliteStore;
use crate::store::VectorStore;
use crate::types::OnConflict;
use std::sync::Arc;
use vsearch_core::AppError;

fn sqlite_store(dimensions: usize) -> Arc<SqliteStore> {
    let config = EmbeddingConfig {
        dimensions,
        ..Default::default()
    };
    Arc::new(SqliteStore::open_in_memory(&config, OnConflict::Overwrite).unwrap())
}

/// Deterministic pseudo-random unit vector.
fn unit_vector(seed: u64, dimensions: usize) -> Vec<f32> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    let mut v: Vec<f32> = (0..dimensions)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 33) as f32 / u32::MAX as f32) - 0.25
        })
        .collect();
    normalize(&mut v);
    v
}

#[test]
fn test_self_similarity_ranks_first() {
    let store = sqlite_store(16);
    for i in 0..20 {
        store
            .put(&format!("doc-{}", i), "text", &unit_vector(i, 16))
            .unwrap();
    }

    let ranker = BruteForceRanker::new(store);
    for i in [0, 7, 19] {
        let results = ranker.rank(&unit_vector(i, 16), 3).unwrap();
        assert_eq!(
            results[0].id,
            format!("doc-{}", i),
            "A stored vector should be its own nearest neighbour"
        );
        assert!(
            (results[0].score - 2.0).abs() < 1e-4,
            "Self-similarity should score 2.0, got {}",
            results[0].score
        );
    }
}

#[test]
fn test_result_count_is_min_of_k_and_corpus() {
    let store = sqlite_store(4);
    for i in 0..6 {
        store.put(&i.to_string(), "text", &unit_vector(i, 4)).unwrap();
    }

    let ranker = BruteForceRanker::new(store);
    let query = unit_vector(99, 4);
    for k in [1, 3, 6, 10] {
        let results = ranker.rank(&query, k).unwrap();
        assert_eq!(results.len(), k.min(6), "top-{} over 6 documents", k);
        assert!(
            results.windows(2).all(|w| w[0].score >= w[1].score),
            "Scores should be non-increasing"
        );
        assert!(results.iter().all(|r| (0.0..=2.0 + 1e-5).contains(&r.score)));
    }
}

#[test]
fn test_zero_query_scores_every_document_at_midpoint() {
    let store = sqlite_store(3);
    store.put("a", "a", &[1.0, 0.0, 0.0]).unwrap();
    store.put("b", "b", &[0.0, 1.0, 0.0]).unwrap();

    let ranker = BruteForceRanker::new(store);
    let results = ranker.rank(&[0.0, 0.0, 0.0], 5).unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.score == 1.0));
    // Equal scores fall back to insertion order
    assert_eq!(results[0].id, "a");
    assert_eq!(results[1].id, "b");
}

#[test]
fn test_malformed_embeddings_are_skipped_and_counted() {
    let store = Arc::new(FixtureStore::new(
        3,
        vec![
            doc("good", vec![1.0, 0.0, 0.0], 0),
            doc("short", vec![1.0, 0.0], 1),
            doc("nan", vec![f32::NAN, 0.0, 0.0], 2),
            doc("also-good", vec![0.0, 1.0, 0.0], 3),
            doc("empty", Vec::new(), 4),
        ],
    ));

    let ranker = BruteForceRanker::new(store);
    let results = ranker.rank(&[1.0, 0.0, 0.0], 10).unwrap();
    let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();

    assert_eq!(ids, vec!["good", "also-good"]);
    assert_eq!(ranker.skipped_total(), 3);

    ranker.rank(&[1.0, 0.0, 0.0], 10).unwrap();
    assert_eq!(ranker.skipped_total(), 6, "The counter accumulates across searches");
}

#[test]
fn test_dimension_guard_leaves_store_unchanged() {
    let store = sqlite_store(3);
    store.put("kept", "kept", &[1.0, 0.0, 0.0]).unwrap();

    let err = store.put("rejected", "rejected", &[1.0, 0.0]).unwrap_err();
    assert!(matches!(
        err,
        AppError::DimensionMismatch {
            expected: 3,
            actual: 2
        }
    ));

    assert_eq!(store.len().unwrap(), 1);
    assert!(!store.exists("rejected").unwrap());

    let ranker = BruteForceRanker::new(store);
    let results = ranker.rank(&[1.0, 0.0, 0.0], 5).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(ranker.skipped_total(), 0);
}

#[test]
fn test_ranker_sees_overwritten_embedding() {
    let store = sqlite_store(2);
    store.put("moving", "before", &[1.0, 0.0]).unwrap();
    store.put("fixed", "fixed", &[0.7, 0.7]).unwrap();

    let ranker = BruteForceRanker::new(Arc::clone(&store) as Arc<dyn VectorStore>);
    assert_eq!(ranker.rank(&[1.0, 0.0], 1).unwrap()[0].id, "moving");

    store.put("moving", "after", &[0.0, 1.0]).unwrap();
    let results = ranker.rank(&[1.0, 0.0], 2).unwrap();
    assert_eq!(results[0].id, "fixed");
    assert_eq!(results[1].id, "moving");
    assert_eq!(results[1].text, "after");
}

#[test]
fn test_large_finite_components_are_ranked() {
    let store = Arc::new(FixtureStore::new(
        3,
        vec![
            doc("big", vec![1e20, 0.0, 0.0], 0),
            doc("huge", vec![3e38, 3e38, 0.0], 1),
        ],
    ));

    let ranker = BruteForceRanker::new(store);
    let results = ranker.rank(&[1e20, 0.0, 0.0], 5).unwrap();

    assert_eq!(results.len(), 2, "Finite embeddings are never skipped");
    assert_eq!(results[0].id, "big");
    assert!(
        (results[0].score - 2.0).abs() < 1e-6,
        "Self-similarity should score 2.0, got {}",
        results[0].score
    );
    assert!(results[1].score.is_finite());
    assert_eq!(ranker.skipped_total(), 0);
}

#[test]
fn test_non_finite_embedding_skipped_for_zero_query() {
    let store = Arc::new(FixtureStore::new(
        3,
        vec![
            doc("good", vec![1.0, 0.0, 0.0], 0),
            doc("nan", vec![f32::NAN, 0.0, 0.0], 1),
            doc("inf", vec![0.0, f32::INFINITY, 0.0], 2),
        ],
    ));

    let ranker = BruteForceRanker::new(store);
    let results = ranker.rank(&[0.0, 0.0, 0.0], 5).unwrap();

    let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["good"], "Malformed records are skipped whatever the query");
    assert_eq!(results[0].score, 1.0);
    assert_eq!(ranker.skipped_total(), 2);
}
