//! Create-index command handler.
//!
//! Writes the index config and pins its encoder and dimensions in the store.

use clap::Args;
use vsearch_core::{config::AppConfig, AppResult};
use vsearch_index::{config as index_config, IndexStats, OnConflict};

/// Create the index and pin its encoder and dimensions
#[derive(Args, Debug)]
pub struct CreateIndexCommand {
    /// Embedding provider (trigram, ollama)
    #[arg(long)]
    pub provider: Option<String>,

    /// Embedding model identifier
    #[arg(long)]
    pub model: Option<String>,

    /// Embedding dimensions
    #[arg(long)]
    pub dimensions: Option<usize>,

    /// Policy for a repeated document id (overwrite, duplicate)
    #[arg(long)]
    pub on_conflict: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl CreateIndexCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing create-index command for '{}'", config.index_name);

        let mut index = index_config::load_config(&config.workspace, &config.index_name)?;
        if let Some(provider) = &self.provider {
            index.provider = provider.clone();
        }
        if let Some(model) = &self.model {
            index.model = model.clone();
        }
        if let Some(dimensions) = self.dimensions {
            index.dimensions = dimensions;
        }
        if let Some(policy) = &self.on_conflict {
            index.on_conflict = policy.parse::<OnConflict>()?;
        }

        let stats = vsearch_index::create_index(&config.workspace, &index)?;
        print_created(&stats, self.json)
    }
}

fn print_created(stats: &IndexStats, json: bool) -> AppResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(stats)?);
    } else {
        println!(
            "Index '{}' ready: {} dimensions, encoder {}/{}, on conflict {}",
            stats.index_name,
            stats.dimensions,
            stats.provider,
            stats.model,
            stats.on_conflict.as_str()
        );
    }
    Ok(())
}
