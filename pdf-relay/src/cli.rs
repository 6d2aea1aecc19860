///
/// This module implements the CLI interface for pdf-relay: command parsing, wiring of the
/// concrete HTTP collaborators, and user-visible output.
///
/// All pipeline logic (discovery, reconciliation, transfer, reporting) lives in the
/// [`pdf-relay-core`] crate. This module is strictly glue.
///
/// ## Commands
/// - `sync`: full run; prints the JSON Run Report (stdout or `--report`) and a summary line.
/// - `discover`: discovery and reconciliation only; prints `{total_count, documents}` sorted
///   by title.
///
/// ## How To Use
/// - For command-line users: `pdf-relay --help`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// [`pdf-relay-core`]: ../../pdf-relay-core/
use crate::load_config::{load_config, CliConfig};
use crate::upload::MultipartPublisher;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pdf_relay_core::discovery::build_strategies;
use pdf_relay_core::error::SynchroniseError;
use pdf_relay_core::fetch::HttpFetcher;
use pdf_relay_core::http::build_client;
use pdf_relay_core::report::{summarize, RunReport};
use pdf_relay_core::synchronise::{discover, synchronise, RunControl, RunOptions};
use pdf_relay_core::transfer::{TransferEngine, TransferSettings};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// CLI for pdf-relay: republish a site's PDF documents to another site.
#[derive(Parser)]
#[clap(
    name = "pdf-relay",
    version,
    about = "Discover PDF documents on a source site and republish them through an upload endpoint"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Discover, fetch and publish every document
    Sync {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Write the JSON run report here instead of stdout
        #[clap(long)]
        report: Option<PathBuf>,
        /// Attempt at most this many documents
        #[clap(long)]
        limit: Option<usize>,
    },
    /// List the reconciled documents without transferring anything
    Discover {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
}

/// How a completed command ended; drives the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Incomplete,
}

#[derive(Serialize)]
struct DocumentListing<'a> {
    total_count: usize,
    documents: &'a [pdf_relay_core::contract::CanonicalDocument],
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<RunStatus> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Sync {
            config,
            report,
            limit,
        } => {
            let config = load_config(config)?;
            tracing::info!(command = "sync", "Starting synchronisation process");
            run_sync(&config, report.as_deref(), limit).await
        }
        Commands::Discover { config } => {
            let config = load_config(config)?;
            tracing::info!(command = "discover", "Starting discovery");
            run_discover(&config).await
        }
    }
}

async fn run_sync(config: &CliConfig, report_path: Option<&Path>, limit: Option<usize>) -> Result<RunStatus> {
    let endpoint = config.require_endpoint()?;
    let client = build_client(&config.transfer.http_settings()).context("Failed to build HTTP client")?;

    let strategies = build_strategies(client.clone(), &config.source);
    let fetcher = HttpFetcher::new(client.clone(), config.transfer.max_bytes);
    let publisher = MultipartPublisher::new(client, endpoint, config.destination.action.clone());
    let engine = TransferEngine::new(fetcher, publisher, TransferSettings::from(&config.transfer));

    let options = RunOptions {
        workers: config.transfer.workers,
        limit,
        request_delay: config.transfer.request_delay(),
        strategy_timeout: config.transfer.strategy_timeout(),
    };
    let control = RunControl::new();
    let signal_control = control.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, no further documents will be started");
            signal_control.cancel();
        }
    });

    match synchronise(&strategies, &engine, &options, &control).await {
        Ok(report) => {
            emit_report(&report, report_path)?;
            eprintln!("{}", report.summary_line());
            if report.all_published() {
                Ok(RunStatus::Success)
            } else {
                Ok(RunStatus::Incomplete)
            }
        }
        Err(SynchroniseError::Reconciliation { source, strategies }) => {
            let report = summarize(&[], Vec::new(), strategies);
            emit_report(&report, report_path)?;
            eprintln!("{}", report.summary_line());
            tracing::error!(command = "sync", error = %source, "Synchronisation failed");
            Err(anyhow::Error::new(source).context("Synchronisation failed"))
        }
        Err(e) => {
            tracing::error!(command = "sync", error = %e, "Synchronisation failed");
            Err(anyhow::Error::new(e).context("Synchronisation failed"))
        }
    }
}

async fn run_discover(config: &CliConfig) -> Result<RunStatus> {
    let client = build_client(&config.transfer.http_settings()).context("Failed to build HTTP client")?;
    let strategies = build_strategies(client, &config.source);

    let discovery = discover(&strategies, config.transfer.strategy_timeout())
        .await
        .context("Discovery failed")?;
    for outcome in &discovery.strategies {
        eprintln!(
            "[{}] {} references{}",
            outcome.origin,
            outcome.reference_count,
            outcome
                .error
                .as_deref()
                .map(|e| format!(" (error: {e})"))
                .unwrap_or_default()
        );
    }

    let documents = discovery.documents.sorted_by_title();
    let listing = DocumentListing {
        total_count: documents.len(),
        documents: &documents,
    };
    println!("{}", serde_json::to_string_pretty(&listing)?);
    Ok(RunStatus::Success)
}

fn emit_report(report: &RunReport, path: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize run report")?;
    match path {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write run report to {path:?}"))?;
            tracing::info!(path = %path.display(), "Run report written");
        }
        None => println!("{json}"),
    }
    Ok(())
}
