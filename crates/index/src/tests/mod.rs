//! Cross-module tests and the test doubles they share.

mod pipeline;
mod ranking;

use crate::embeddings::EmbeddingProvider;
use crate::store::{content_hash, VectorStore};
use crate::types::Document;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use vsearch_core::{AppError, AppResult};

/// Encoder with one dimension per vocabulary word; text maps to word counts.
///
/// Unknown words are ignored, so texts sharing vocabulary words are the only
/// ones with non-zero similarity. Texts containing `poison` fail to encode;
/// texts containing `short` encode to a vector one dimension too small.
#[derive(Debug)]
pub(crate) struct WordOverlapEncoder {
    vocabulary: Vec<&'static str>,
    poison: Option<&'static str>,
    short: Option<&'static str>,
    batch_calls: AtomicUsize,
}

impl WordOverlapEncoder {
    pub(crate) fn new(vocabulary: &[&'static str]) -> Self {
        Self {
            vocabulary: vocabulary.to_vec(),
            poison: None,
            short: None,
            batch_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing_on(mut self, poison: &'static str) -> Self {
        self.poison = Some(poison);
        self
    }

    pub(crate) fn short_on(mut self, short: &'static str) -> Self {
        self.short = Some(short);
        self
    }

    pub(crate) fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    fn encode(&self, text: &str) -> AppResult<Vec<f32>> {
        if let Some(poison) = self.poison {
            if text.contains(poison) {
                return Err(AppError::Encoding(format!("cannot encode '{}'", text)));
            }
        }

        let mut embedding = vec![0.0; self.vocabulary.len()];
        for word in text.split_whitespace() {
            if let Some(idx) = self.vocabulary.iter().position(|v| *v == word) {
                embedding[idx] += 1.0;
            }
        }
        if self.short.is_some_and(|short| text.contains(short)) {
            embedding.pop();
        }
        Ok(embedding)
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for WordOverlapEncoder {
    fn provider_name(&self) -> &str {
        "word-overlap"
    }

    fn model_name(&self) -> &str {
        "test"
    }

    fn dimensions(&self) -> usize {
        self.vocabulary.len()
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        texts.iter().map(|t| self.encode(t)).collect()
    }
}

/// In-memory store that accepts any document, including malformed ones.
pub(crate) struct FixtureStore {
    dimensions: usize,
    documents: RwLock<Vec<Document>>,
}

impl FixtureStore {
    pub(crate) fn new(dimensions: usize, documents: Vec<Document>) -> Self {
        Self {
            dimensions,
            documents: RwLock::new(documents),
        }
    }
}

impl VectorStore for FixtureStore {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn put(&self, id: &str, text: &str, embedding: &[f32]) -> AppResult<()> {
        let mut documents = self.documents.write().unwrap();
        let seq = documents.len() as u64;
        documents.push(Document {
            id: id.to_string(),
            text: text.to_string(),
            embedding: embedding.to_vec(),
            seq,
        });
        Ok(())
    }

    fn all(&self) -> AppResult<Vec<Document>> {
        Ok(self.documents.read().unwrap().clone())
    }

    fn exists(&self, id: &str) -> AppResult<bool> {
        Ok(self.documents.read().unwrap().iter().any(|d| d.id == id))
    }

    fn len(&self) -> AppResult<usize> {
        Ok(self.documents.read().unwrap().len())
    }

    fn content_hash(&self, id: &str) -> AppResult<Option<String>> {
        Ok(self
            .documents
            .read()
            .unwrap()
            .iter()
            .rev()
            .find(|d| d.id == id)
            .map(|d| content_hash(&d.text)))
    }
}

/// Store wrapper whose first `failures` puts fail as unavailable.
pub(crate) struct FlakyStore<S: VectorStore> {
    inner: S,
    remaining_failures: AtomicUsize,
    put_calls: AtomicUsize,
}

impl<S: VectorStore> FlakyStore<S> {
    pub(crate) fn new(inner: S, failures: usize) -> Self {
        Self {
            inner,
            remaining_failures: AtomicUsize::new(failures),
            put_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }
}

impl<S: VectorStore> VectorStore for FlakyStore<S> {
    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn put(&self, id: &str, text: &str, embedding: &[f32]) -> AppResult<()> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AppError::StoreUnavailable("disk went away".to_string()));
        }
        self.inner.put(id, text, embedding)
    }

    fn all(&self) -> AppResult<Vec<Document>> {
        self.inner.all()
    }

    fn exists(&self, id: &str) -> AppResult<bool> {
        self.inner.exists(id)
    }

    fn len(&self) -> AppResult<usize> {
        self.inner.len()
    }

    fn content_hash(&self, id: &str) -> AppResult<Option<String>> {
        self.inner.content_hash(id)
    }
}

/// Build a document for fixture stores.
pub(crate) fn doc(id: &str, embedding: Vec<f32>, seq: u64) -> Document {
    Document {
        id: id.to_string(),
        text: format!("text of {}", id),
        embedding,
        seq,
    }
}
