//! Vector store abstraction.
//!
//! Defines a trait for durable document storage, independent of the backend.

use crate::types::Document;
use sha2::{Digest, Sha256};
use vsearch_core::AppResult;

/// Trait for vector store backends.
///
/// Implementations must:
/// - reject embeddings whose length differs from the store dimension without
///   mutating anything
/// - make a successful `put` durable before returning
/// - keep each record atomic under concurrent `put` and `all`
pub trait VectorStore: Send + Sync {
    /// Embedding dimension every stored document has.
    fn dimensions(&self) -> usize;

    /// Insert a document, or overwrite it when the store's conflict policy says so.
    fn put(&self, id: &str, text: &str, embedding: &[f32]) -> AppResult<()>;

    /// Every stored document, in no particular order.
    fn all(&self) -> AppResult<Vec<Document>>;

    /// Whether any document is stored under `id`.
    fn exists(&self, id: &str) -> AppResult<bool>;

    /// Number of stored documents.
    fn len(&self) -> AppResult<usize>;

    fn is_empty(&self) -> AppResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Hash of the text most recently stored under `id`.
    fn content_hash(&self, id: &str) -> AppResult<Option<String>>;
}

/// SHA-256 of a document's text, hex encoded.
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
