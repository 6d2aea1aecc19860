//! High-level pipeline: orchestrates discovery → reconciliation → transfer → report.
//!
//! This module provides the top-level orchestration for one "synchronisation" run:
//!   - Runs every discovery strategy concurrently and waits for all of them (or their timeout)
//!   - Reconciles the listings into one canonical set, only after discovery has completed
//!   - Transfers each canonical document with a bounded number of concurrent workers
//!   - Aggregates the transfer records into a [`RunReport`]
//!
//! # Error Handling
//! Strategy and per-document failures are recorded in the report; only an empty reconciliation
//! result (or having no strategies at all) stops the run with a [`SynchroniseError`].
//!
//! # Cancellation
//! [`RunControl::cancel`] stops scheduling new documents. Transfers already started run to
//! their terminal state; documents never started show up as not attempted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::contract::{CanonicalDocument, DiscoveryStrategy, Fetcher, Publisher, TransferRecord};
use crate::discovery::{discover_all, StrategyOutcome};
use crate::error::SynchroniseError;
use crate::reconcile::{reconcile, CanonicalSet};
use crate::report::{summarize, RunReport};
use crate::transfer::TransferEngine;

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Upper bound on concurrent transfers.
    pub workers: usize,
    /// Attempt at most this many documents.
    pub limit: Option<usize>,
    /// Pause before each document starts.
    pub request_delay: Duration,
    pub strategy_timeout: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            limit: None,
            request_delay: Duration::ZERO,
            strategy_timeout: Duration::from_secs(120),
        }
    }
}

/// Shared cancellation flag for a run.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    cancelled: Arc<AtomicBool>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct Discovery {
    pub strategies: Vec<StrategyOutcome>,
    pub documents: CanonicalSet,
}

/// Discovery plus reconciliation, without any transfer.
pub async fn discover(
    strategies: &[Box<dyn DiscoveryStrategy>],
    strategy_timeout: Duration,
) -> Result<Discovery, SynchroniseError> {
    if strategies.is_empty() {
        return Err(SynchroniseError::NoStrategies);
    }
    info!(strategies = strategies.len(), "[SYNC] Starting discovery");
    let outcomes = discover_all(strategies, strategy_timeout).await;
    let batches: Vec<_> = outcomes.iter().map(|o| o.references.clone()).collect();
    match reconcile(&batches) {
        Ok(documents) => Ok(Discovery {
            strategies: outcomes,
            documents,
        }),
        Err(source) => Err(SynchroniseError::Reconciliation {
            source,
            strategies: outcomes,
        }),
    }
}

/// Transfers documents with at most `options.workers` in flight.
///
/// Records are collected by this single task, so no counter is shared between workers.
pub async fn transfer_all<F, P>(
    engine: &TransferEngine<F, P>,
    documents: &[CanonicalDocument],
    options: &RunOptions,
    control: &RunControl,
) -> Vec<TransferRecord>
where
    F: Fetcher,
    P: Publisher,
{
    let limit = options.limit.unwrap_or(documents.len()).min(documents.len());
    let workers = options.workers.max(1);
    let delay = options.request_delay;
    info!(documents = limit, workers, "[SYNC] Starting transfers");

    stream::iter(documents.iter().take(limit))
        .take_while(|_| futures::future::ready(!control.is_cancelled()))
        .map(|document| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if control.is_cancelled() {
                return None;
            }
            Some(engine.transfer(document).await)
        })
        .buffer_unordered(workers)
        .filter_map(futures::future::ready)
        .collect()
        .await
}

/// Runs the whole pipeline and returns the report.
pub async fn synchronise<F, P>(
    strategies: &[Box<dyn DiscoveryStrategy>],
    engine: &TransferEngine<F, P>,
    options: &RunOptions,
    control: &RunControl,
) -> Result<RunReport, SynchroniseError>
where
    F: Fetcher,
    P: Publisher,
{
    info!("[SYNC] Starting full synchronisation pipeline");
    let discovery = discover(strategies, options.strategy_timeout).await?;
    let documents = discovery.documents.into_documents();

    let records = transfer_all(engine, &documents, options, control).await;
    if control.is_cancelled() {
        warn!(
            attempted = records.len(),
            total = documents.len(),
            "[SYNC] Run cancelled, remaining documents were not attempted"
        );
    }

    let report = summarize(&documents, records, discovery.strategies);
    info!(summary = %report.summary_line(), "[SYNC] Synchronisation complete");
    Ok(report)
}
