//! Hashed word and character-trigram encoder.

use crate::embeddings::normalize;
use crate::embeddings::provider::EmbeddingProvider;
use std::collections::HashMap;
use unicode_segmentation::UnicodeSegmentation;
use vsearch_core::AppResult;

const MODEL_NAME: &str = "trigram-v1";

/// Words too common to carry meaning.
const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them",
];

/// Offline encoder that needs no model files.
///
/// Each remaining word adds weight to one bucket chosen by hashing the whole
/// word and to one bucket per character trigram. The result is L2 normalized,
/// so texts sharing words point in similar directions. Output depends only on
/// the input text and the dimension.
#[derive(Debug)]
pub struct TrigramProvider {
    dimensions: usize,
}

impl TrigramProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn encode(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0; self.dimensions];
        if self.dimensions == 0 {
            return embedding;
        }

        let lower = text.to_lowercase();
        let mut word_freq: HashMap<&str, u32> = HashMap::new();
        for word in lower.unicode_words() {
            if word.chars().count() > 2 && !STOP_WORDS.contains(&word) {
                *word_freq.entry(word).or_insert(0) += 1;
            }
        }

        for (word, freq) in &word_freq {
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                let idx = bucket(&trigram, 37, self.dimensions);
                embedding[idx] += (*freq as f32).sqrt();
            }

            let idx = bucket(word, 31, self.dimensions);
            embedding[idx] += *freq as f32;
        }

        normalize(&mut embedding);
        embedding
    }
}

/// Polynomial byte hash reduced to a bucket index.
fn bucket(s: &str, multiplier: u64, dimensions: usize) -> usize {
    let hash = s
        .bytes()
        .fold(0u64, |acc, b| acc.wrapping_mul(multiplier).wrapping_add(b as u64));
    (hash % dimensions as u64) as usize
}

#[async_trait::async_trait]
impl EmbeddingProvider for TrigramProvider {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn model_name(&self) -> &str {
        MODEL_NAME
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.encode(text)).collect())
    }
}
