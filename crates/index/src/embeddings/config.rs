//! Encoder identity and consistency checks.

use crate::types::IndexConfig;
use serde::{Deserialize, Serialize};
use vsearch_core::{AppError, AppResult};

/// The part of an index configuration that determines embedding output.
///
/// Two configs that differ here produce incomparable vectors, so an index must
/// keep one for its whole lifetime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider name: "trigram", "ollama"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Provider-specific configuration (JSON object)
    #[serde(default)]
    pub provider_config: serde_json::Value,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self::from(&IndexConfig::default())
    }
}

impl From<&IndexConfig> for EmbeddingConfig {
    fn from(config: &IndexConfig) -> Self {
        Self {
            provider: config.provider.clone(),
            model: config.model.clone(),
            dimensions: config.dimensions,
            provider_config: config.provider_config.clone(),
        }
    }
}

impl EmbeddingConfig {
    /// Read a string setting from `provider_config`.
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.provider_config.get(key).and_then(|v| v.as_str())
    }

    /// Validate that another config produces vectors comparable with this one.
    pub fn validate_consistency(&self, other: &Self) -> AppResult<()> {
        if self.dimensions != other.dimensions {
            return Err(AppError::DimensionMismatch {
                expected: self.dimensions,
                actual: other.dimensions,
            });
        }

        if self.provider != other.provider {
            return Err(AppError::Config(format!(
                "Provider mismatch: index was built with '{}', configured '{}'",
                self.provider, other.provider
            )));
        }

        if self.model != other.model {
            return Err(AppError::Config(format!(
                "Model mismatch: index was built with '{}', configured '{}'",
                self.model, other.model
            )));
        }

        Ok(())
    }
}
