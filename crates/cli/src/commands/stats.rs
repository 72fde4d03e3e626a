//! Stats command handler.

use clap::Args;
use vsearch_core::{config::AppConfig, AppResult};

/// Show index statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command for '{}'", config.index_name);

        let stats = vsearch_index::stats(&config.workspace, &config.index_name)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            println!("Index: {}", stats.index_name);
            println!("  Documents: {}", stats.documents_count);
            println!("  Dimensions: {}", stats.dimensions);
            println!("  Encoder: {}/{}", stats.provider, stats.model);
            println!("  On conflict: {}", stats.on_conflict.as_str());
            println!("  DB size: {} bytes", stats.db_size_bytes);
            if let Some(created_at) = stats.created_at {
                println!("  Created: {}", created_at);
            }
        }

        Ok(())
    }
}
