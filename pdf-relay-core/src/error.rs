//! Error types for every stage of the pipeline.
//!
//! Discovery, fetch and publish errors are per-strategy or per-document: the pipeline records
//! them as data (see [`crate::discovery::StrategyOutcome::error`] and
//! [`crate::contract::TransferRecord::failure_reason`]) instead of aborting the run.
//! Only [`ReconciliationError`] (wrapped by [`SynchroniseError`]) is run-fatal.

use thiserror::Error;

use crate::contract::StrategyOrigin;
use crate::discovery::StrategyOutcome;

const EXCERPT_CHARS: usize = 200;

/// A discovery strategy could not produce its listing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    #[error("{origin} discovery unreachable: {message}")]
    Unreachable {
        origin: StrategyOrigin,
        message: String,
    },
    #[error("{origin} discovery got http status {status}")]
    Status { origin: StrategyOrigin, status: u16 },
    #[error("{origin} discovery returned a malformed payload: {message}")]
    Malformed {
        origin: StrategyOrigin,
        message: String,
    },
    #[error("{origin} discovery timed out after {secs}s")]
    Timeout { origin: StrategyOrigin, secs: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("fetch failed with http status {status}")]
    Status { status: u16 },
    #[error("fetch transport error: {0}")]
    Transport(String),
    #[error("fetch exceeded {max_bytes} bytes (got at least {actual})")]
    TooLarge { max_bytes: u64, actual: u64 },
    #[error("fetched body was empty")]
    Empty,
    #[error("artifact io error: {0}")]
    Io(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("publish failed with http status {status}: {body_excerpt}")]
    Status { status: u16, body_excerpt: String },
    /// The endpoint answered with a success status but no positive acknowledgment.
    #[error("publish not acknowledged (http status {status}): {reason}; body: {body_excerpt}")]
    Rejected {
        status: u16,
        reason: String,
        body_excerpt: String,
    },
    #[error("publish transport error: {0}")]
    Transport(String),
    #[error("artifact io error: {0}")]
    Io(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconciliationError {
    #[error("no discovery strategy produced a usable document reference")]
    NothingDiscovered,
}

/// Run-fatal errors of [`crate::synchronise::synchronise`].
#[derive(Debug, Error)]
pub enum SynchroniseError {
    #[error("no discovery strategies configured")]
    NoStrategies,
    /// Carries the per-strategy outcomes so the caller can still emit a report.
    #[error("reconciliation failed: {source}")]
    Reconciliation {
        source: ReconciliationError,
        strategies: Vec<StrategyOutcome>,
    },
}

/// First characters of a response body, for error messages and logs.
pub fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(EXCERPT_CHARS) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
