//! splitmerge - Split and merge pages of stored PDF documents.
//!
//! Runs a plan against a JSON document manifest. Built files are printed to
//! stdout, one per line; logs go to stderr.

mod cli;

use clap::Parser;
use std::process;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Cli;
use splitmerge::dispatch::{DirectoryConsumer, TokioDispatcher};
use splitmerge::error::SplitMergeError;
use splitmerge::plan::Plan;
use splitmerge::store::InMemoryStore;
use splitmerge::{ExecutionOutcome, SplitMergeExecutor};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {err}");
        process::exit(err.exit_code());
    }
}

fn init_tracing(cli: &Cli) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| cli.log_directive().into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Main application logic.
async fn run(cli: Cli) -> Result<(), SplitMergeError> {
    cli.validate()?;
    let options = cli.to_options()?;

    let raw_plan = tokio::fs::read_to_string(&cli.plan).await.map_err(|e| {
        SplitMergeError::invalid_config(format!("Failed to read plan {}: {e}", cli.plan.display()))
    })?;
    let plan = Plan::from_json(&raw_plan)?;
    let store = Arc::new(InMemoryStore::load(&cli.documents)?);

    tracing::info!(
        "{} v{}: {} target(s), {} document(s) known",
        splitmerge::NAME,
        splitmerge::VERSION,
        plan.targets.len(),
        store.len()
    );

    // Preview never consumes, so the scratch directory is only a placeholder
    let consume_dir = cli.consume_dir.clone().unwrap_or_else(|| cli.scratch_dir.clone());
    let consumer = Arc::new(DirectoryConsumer::new(consume_dir));
    let dispatcher = Arc::new(TokioDispatcher::current(consumer, &cli.dispatcher_config()));
    let executor = SplitMergeExecutor::new(store.clone(), dispatcher);

    let outcome = tokio::task::spawn_blocking(move || executor.execute(&plan, &options))
        .await
        .map_err(|e| SplitMergeError::from(std::io::Error::other(format!("Plan task failed: {e}"))))??;

    for file in outcome.files() {
        println!("{}", file.display());
    }
    for warning in outcome.warnings() {
        tracing::warn!("{warning}");
    }

    finish(outcome, &store, &cli).await
}

/// Wait for a committed batch and its follow-up, then persist the manifest.
async fn finish(
    outcome: ExecutionOutcome,
    store: &InMemoryStore,
    cli: &Cli,
) -> Result<(), SplitMergeError> {
    let stats = &outcome.statistics;
    tracing::info!(
        targets = stats.targets_built,
        pages = stats.pages_written,
        opened = stats.sources_opened,
        reused = stats.cache_hits,
        "built in {:.2}s (loading {:.2}s, writing {:.2}s)",
        stats.build_time.as_secs_f64(),
        stats.load_time.as_secs_f64(),
        stats.write_time.as_secs_f64()
    );

    let Some(dispatch) = outcome.dispatch else {
        tracing::info!("preview only, run with --commit to ingest the built files");
        return Ok(());
    };

    let report = dispatch.batch.wait().await?;
    if let Some(cleanup) = dispatch.cleanup {
        cleanup.wait().await?;
        store.save(&cli.documents)?;
    }

    if !report.all_succeeded() {
        return Err(SplitMergeError::dispatch_failed(format!(
            "{} of {} ingestion(s) failed",
            report.failures(),
            report.len()
        )));
    }

    Ok(())
}
