//! Search command handler.

use clap::Args;
use vsearch_core::{config::AppConfig, AppResult};
use vsearch_index::SearchRequest;

/// Search the index
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// Query text
    pub query: Option<String>,

    /// Number of results (default: the index's default_top_k)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Raw JSON request body, e.g. '{"query": "cat", "k": 2}'
    #[arg(long, conflicts_with_all = ["query", "top_k"])]
    pub request: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchCommand {
    fn to_request(&self) -> AppResult<SearchRequest> {
        match &self.request {
            Some(body) => SearchRequest::from_json(body),
            None => Ok(SearchRequest {
                query: self.query.clone(),
                k: self.top_k,
            }),
        }
    }

    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing search command for '{}'", config.index_name);

        let request = self.to_request()?;
        let service = vsearch_index::open_index(&config.workspace, &config.index_name, false).await?;
        let response = service.handle_search(&request).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&response)?);
        } else if response.results.is_empty() {
            println!("No results");
        } else {
            for (rank, result) in response.results.iter().enumerate() {
                println!("{}. [{:.4}] {}\t{}", rank + 1, result.score, result.id, result.text);
            }
        }

        Ok(())
    }
}
