//! vsearch CLI
//!
//! Main entry point for the vsearch command-line tool.
//! Builds a dense-vector index from tab-separated data and searches it.

mod commands;

use clap::{Parser, Subcommand};
use commands::{CreateIndexCommand, IndexDataCommand, SearchCommand, StatsCommand};
use std::path::PathBuf;
use vsearch_core::{config::AppConfig, logging, AppResult};

/// vsearch - semantic search over a local vector index
#[derive(Parser, Debug)]
#[command(name = "vsearch")]
#[command(about = "Semantic search over a local vector index", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "VSEARCH_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "VSEARCH_CONFIG")]
    config: Option<PathBuf>,

    /// Index name
    #[arg(short, long, global = true, env = "VSEARCH_INDEX")]
    index: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "VSEARCH_LOG_JSON")]
    log_json: bool,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the index and pin its encoder and dimensions
    CreateIndex(CreateIndexCommand),

    /// Ingest a tab-separated file into the index
    IndexData(IndexDataCommand),

    /// Search the index
    Search(SearchCommand),

    /// Show index statistics
    Stats(StatsCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let config = AppConfig::load()?.with_overrides(
        cli.workspace,
        cli.config,
        cli.index,
        cli.log_level,
        cli.log_json,
        cli.verbose,
        cli.no_color,
    );
    config.validate()?;

    logging::init_logging(config.log_level.as_deref(), config.log_format(), config.no_color)?;

    tracing::info!("vsearch starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Index: {}", config.index_name);

    config.ensure_vsearch_dir()?;

    let command_name = match &cli.command {
        Commands::CreateIndex(_) => "create-index",
        Commands::IndexData(_) => "index-data",
        Commands::Search(_) => "search",
        Commands::Stats(_) => "stats",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::CreateIndex(cmd) => cmd.execute(&config).await,
        Commands::IndexData(cmd) => cmd.execute(&config).await,
        Commands::Search(cmd) => cmd.execute(&config).await,
        Commands::Stats(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
