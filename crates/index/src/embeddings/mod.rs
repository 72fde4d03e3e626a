//! Text encoders.
//!
//! Turns text into fixed-dimension embedding vectors. Providers are selected by
//! name from the index configuration and shared behind `Arc<dyn EmbeddingProvider>`.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};

/// Scale a vector to unit length in place. Zero vectors are left unchanged.
pub fn normalize(embedding: &mut [f32]) {
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in embedding.iter_mut() {
            *v /= norm;
        }
    }
}
