//! Index-data command handler.
//!
//! Streams a tab-separated file through the ingestion pipeline.

use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use vsearch_core::{config::AppConfig, AppResult};
use vsearch_index::progress::ProgressReporter;
use vsearch_index::{IngestOptions, IngestReport, TsvSource};

/// Ingest a tab-separated file into the index
#[derive(Args, Debug)]
pub struct IndexDataCommand {
    /// Tab-separated file with a header row
    pub file: PathBuf,

    /// Column holding document ids (default: the index's id_column)
    #[arg(long)]
    pub id_column: Option<String>,

    /// Column holding document text (default: the index's text_column)
    #[arg(long)]
    pub text_column: Option<String>,

    /// Skip records already stored with identical text
    #[arg(long)]
    pub skip_unchanged: bool,

    /// Print progress events to stderr
    #[arg(long)]
    pub progress: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IndexDataCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!(
            "Executing index-data command for '{}' from {:?}",
            config.index_name,
            self.file
        );

        let service = vsearch_index::open_index(&config.workspace, &config.index_name, true).await?;

        let index = service.config();
        let id_column = self.id_column.as_deref().unwrap_or(&index.id_column);
        let text_column = self.text_column.as_deref().unwrap_or(&index.text_column);
        let source = TsvSource::open(&self.file, id_column, text_column)?;

        let options = IngestOptions {
            skip_unchanged: self.skip_unchanged,
            ..IngestOptions::from(index)
        };
        let progress = if self.progress {
            ProgressReporter::new(Arc::new(|event| eprintln!("{}", event.format_simple())))
        } else {
            ProgressReporter::noop()
        };
        let service = service.with_ingest_options(options, progress);

        let report = service.ingest_batch(source).await?;
        print_report(&report, self.json)
    }
}

fn print_report(report: &IngestReport, json: bool) -> AppResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!(
        "Indexed {} of {} records ({} skipped, {} failed) in {:.2}s",
        report.indexed,
        report.total,
        report.skipped,
        report.failures.len(),
        report.duration_secs
    );
    for failure in &report.failures {
        println!(
            "  record {} ({}): {} [{}{}]",
            failure.position,
            failure.id.as_deref().unwrap_or("-"),
            failure.reason,
            failure.kind,
            if failure.retryable { ", retryable" } else { "" }
        );
    }
    Ok(())
}
