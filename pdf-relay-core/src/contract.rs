//! # contract: data model and pipeline seams
//!
//! This module defines the values that flow through a run and the three traits the pipeline
//! is wired together with:
//!
//! - [`DiscoveryStrategy`]: produces raw [`DocumentReference`]s (API listing, sitemap, crawl).
//! - [`Fetcher`]: streams a document's bytes into a local artifact.
//! - [`Publisher`]: uploads an artifact plus its metadata envelope to the destination.
//!
//! ## Mocking & Testing
//! - The traits are annotated for `mockall`; with the default `test-export-mocks` feature the
//!   generated `Mock*` types are exported for integration tests of dependent crates.
//!
//! ## Lifecycle
//! - [`DocumentReference`]: one per discovery hit, discarded after reconciliation.
//! - [`CanonicalDocument`]: one per distinct canonical URL per run, immutable.
//! - [`TransferRecord`]: one per attempted document, always returned in a terminal state.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::{DiscoveryError, FetchError, PublishError};

/// Which discovery strategy surfaced a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyOrigin {
    #[serde(alias = "api")]
    Api,
    #[serde(alias = "sitemap")]
    Sitemap,
    #[serde(alias = "crawl")]
    Crawl,
}

impl StrategyOrigin {
    /// Higher wins when two strategies disagree on a document's metadata.
    pub fn confidence(self) -> u8 {
        match self {
            StrategyOrigin::Api => 3,
            StrategyOrigin::Sitemap => 2,
            StrategyOrigin::Crawl => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyOrigin::Api => "API",
            StrategyOrigin::Sitemap => "SITEMAP",
            StrategyOrigin::Crawl => "CRAWL",
        }
    }
}

impl fmt::Display for StrategyOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    pub created: Option<String>,
    pub modified: Option<String>,
}

/// Raw, strategy-specific evidence of a candidate document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentReference {
    /// Absolute URL as seen by the strategy (not yet normalized).
    pub url: String,
    pub title: Option<String>,
    pub declared_size: Option<u64>,
    pub timestamps: Timestamps,
    pub strategy_origin: StrategyOrigin,
    /// Identifier in the source system, when the strategy knows one.
    pub source_id: Option<u64>,
}

impl DocumentReference {
    pub fn new(url: impl Into<String>, origin: StrategyOrigin) -> Self {
        Self {
            url: url.into(),
            title: None,
            declared_size: None,
            timestamps: Timestamps::default(),
            strategy_origin: origin,
            source_id: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_declared_size(mut self, size: u64) -> Self {
        self.declared_size = Some(size);
        self
    }

    pub fn strategy_confidence(&self) -> u8 {
        self.strategy_origin.confidence()
    }
}

/// The deduplicated, authoritative record for one distinct document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalDocument {
    pub canonical_url: String,
    pub title: String,
    /// Bytes; 0 when no strategy declared a size.
    pub size: u64,
    pub published_at: Option<String>,
    pub modified_at: Option<String>,
    pub source_id: Option<u64>,
    pub source_strategies: BTreeSet<StrategyOrigin>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    Pending,
    Fetching,
    Fetched,
    Publishing,
    Published,
    Failed,
}

impl TransferStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TransferStatus::Published | TransferStatus::Failed)
    }

    /// Forward-only transitions; FAILED is reachable from FETCHING and PUBLISHING only.
    pub fn can_advance_to(self, next: TransferStatus) -> bool {
        use TransferStatus::*;
        matches!(
            (self, next),
            (Pending, Fetching)
                | (Fetching, Fetched)
                | (Fetching, Failed)
                | (Fetched, Publishing)
                | (Publishing, Published)
                | (Publishing, Failed)
        )
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferStatus::Pending => "PENDING",
            TransferStatus::Fetching => "FETCHING",
            TransferStatus::Fetched => "FETCHED",
            TransferStatus::Publishing => "PUBLISHING",
            TransferStatus::Published => "PUBLISHED",
            TransferStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Per-document execution state of the transfer engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferRecord {
    pub canonical_url: String,
    pub status: TransferStatus,
    pub attempt_count: u32,
    /// Set only when `status` is FAILED.
    pub failure_reason: Option<String>,
    /// Actual byte length of the fetched artifact.
    pub bytes: Option<u64>,
    /// SHA-256 hex digest of the fetched artifact.
    pub content_hash: Option<String>,
    /// Identifier assigned by the destination, if it reported one.
    pub remote_id: Option<String>,
    pub warnings: Vec<String>,
    /// Every status the record has held, in order.
    pub history: Vec<TransferStatus>,
    /// Temporary artifact owned by the engine between FETCHED and the terminal state.
    #[serde(skip)]
    pub local_artifact: Option<PathBuf>,
}

impl TransferRecord {
    pub fn new(canonical_url: impl Into<String>) -> Self {
        Self {
            canonical_url: canonical_url.into(),
            status: TransferStatus::Pending,
            attempt_count: 0,
            failure_reason: None,
            bytes: None,
            content_hash: None,
            remote_id: None,
            warnings: Vec::new(),
            history: vec![TransferStatus::Pending],
            local_artifact: None,
        }
    }

    /// Moves to `next`; illegal transitions are refused and logged.
    pub fn advance(&mut self, next: TransferStatus) -> bool {
        if !self.status.can_advance_to(next) {
            tracing::error!(
                url = %self.canonical_url,
                from = %self.status,
                to = %next,
                "[TRANSFER] Refused illegal status transition"
            );
            return false;
        }
        self.status = next;
        self.history.push(next);
        if next.is_terminal() {
            self.local_artifact = None;
        }
        true
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> bool {
        let advanced = self.advance(TransferStatus::Failed);
        if advanced {
            self.failure_reason = Some(reason.into());
        }
        advanced
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Positive acknowledgment parsed from the destination's response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Acknowledgement {
    pub remote_id: Option<String>,
    pub message: Option<String>,
}

/// The metadata envelope and artifact handed to a [`Publisher`].
pub struct PublishRequest<'a> {
    pub title: &'a str,
    /// The canonical URL of the document.
    pub url: &'a str,
    /// Publication date from the source, empty when unknown.
    pub date: &'a str,
    /// Actual artifact size in bytes.
    pub size: u64,
    pub file_path: &'a Path,
    /// File name for the multipart `file` part.
    pub file_name: &'a str,
}

/// An independent method of surfacing candidate document URLs.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait DiscoveryStrategy: Send + Sync {
    fn origin(&self) -> StrategyOrigin;

    async fn discover(&self) -> Result<Vec<DocumentReference>, DiscoveryError>;
}

/// Streams a document into a local file.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Writes the body of `url` to `dest` incrementally and returns the number of bytes written.
    async fn fetch_to(&self, url: &str, dest: &Path) -> Result<u64, FetchError>;
}

/// Uploads an artifact to the destination.
///
/// Implementors must only return `Ok` for a positive, parsed acknowledgment; an HTTP success
/// status alone is not enough.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish<'a>(&self, req: PublishRequest<'a>) -> Result<Acknowledgement, PublishError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_orders_api_over_sitemap_over_crawl() {
        assert!(StrategyOrigin::Api.confidence() > StrategyOrigin::Sitemap.confidence());
        assert!(StrategyOrigin::Sitemap.confidence() > StrategyOrigin::Crawl.confidence());
    }

    #[test]
    fn terminal_states_are_never_left() {
        let mut record = TransferRecord::new("https://x/a.pdf");
        assert!(record.advance(TransferStatus::Fetching));
        assert!(record.fail("boom"));
        assert!(!record.advance(TransferStatus::Fetched));
        assert!(!record.advance(TransferStatus::Fetching));
        assert_eq!(record.status, TransferStatus::Failed);
        assert_eq!(record.failure_reason.as_deref(), Some("boom"));
    }

    #[test]
    fn failed_is_not_reachable_from_pending_or_fetched() {
        assert!(!TransferStatus::Pending.can_advance_to(TransferStatus::Failed));
        assert!(!TransferStatus::Fetched.can_advance_to(TransferStatus::Failed));
        assert!(TransferStatus::Publishing.can_advance_to(TransferStatus::Failed));
    }

    #[test]
    fn reaching_terminal_state_drops_artifact_handle() {
        let mut record = TransferRecord::new("https://x/a.pdf");
        record.advance(TransferStatus::Fetching);
        record.advance(TransferStatus::Fetched);
        record.local_artifact = Some(PathBuf::from("/tmp/a.pdf"));
        record.advance(TransferStatus::Publishing);
        record.advance(TransferStatus::Published);
        assert!(record.local_artifact.is_none());
        assert_eq!(
            record.history,
            vec![
                TransferStatus::Pending,
                TransferStatus::Fetching,
                TransferStatus::Fetched,
                TransferStatus::Publishing,
                TransferStatus::Published,
            ]
        );
    }

    #[test]
    fn strategy_origin_accepts_lowercase_config_names() {
        let parsed: Vec<StrategyOrigin> = serde_json::from_str(r#"["api","SITEMAP","crawl"]"#).unwrap();
        assert_eq!(
            parsed,
            vec![StrategyOrigin::Api, StrategyOrigin::Sitemap, StrategyOrigin::Crawl]
        );
    }
}
