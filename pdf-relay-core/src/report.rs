//! Run Report: pure aggregation of a run's transfer records.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use uuid::Uuid;

use crate::contract::{CanonicalDocument, TransferRecord, TransferStatus};
use crate::discovery::StrategyOutcome;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureEntry {
    pub canonical_url: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    /// Canonical documents discovered.
    pub total_count: usize,
    pub attempted: usize,
    pub published: usize,
    pub failed: usize,
    /// Discovered documents that never got a transfer record.
    pub not_attempted: Vec<String>,
    pub strategies: Vec<StrategyOutcome>,
    pub documents: Vec<CanonicalDocument>,
    pub transfers: Vec<TransferRecord>,
    pub failures: Vec<FailureEntry>,
}

impl RunReport {
    /// True only when every discovered document reached PUBLISHED.
    pub fn all_published(&self) -> bool {
        self.total_count > 0 && self.published == self.total_count
    }

    pub fn summary_line(&self) -> String {
        let failed_strategies = self.strategies.iter().filter(|s| s.error.is_some()).count();
        format!(
            "run {}: discovered {}, attempted {}, published {}, failed {}, not attempted {} ({} of {} discovery strategies failed)",
            self.run_id,
            self.total_count,
            self.attempted,
            self.published,
            self.failed,
            self.not_attempted.len(),
            failed_strategies,
            self.strategies.len(),
        )
    }
}

/// Aggregates transfer records against the discovered documents.
///
/// Records are re-ordered to document order; a document without a record is reported as not
/// attempted. A record that is somehow not terminal counts as failed.
pub fn summarize(
    documents: &[CanonicalDocument],
    mut records: Vec<TransferRecord>,
    strategies: Vec<StrategyOutcome>,
) -> RunReport {
    let position: HashMap<&str, usize> = documents
        .iter()
        .enumerate()
        .map(|(i, d)| (d.canonical_url.as_str(), i))
        .collect();
    records.sort_by_key(|r| {
        position
            .get(r.canonical_url.as_str())
            .copied()
            .unwrap_or(usize::MAX)
    });

    let attempted_urls: HashSet<&str> = records.iter().map(|r| r.canonical_url.as_str()).collect();
    let not_attempted = documents
        .iter()
        .filter(|d| !attempted_urls.contains(d.canonical_url.as_str()))
        .map(|d| d.canonical_url.clone())
        .collect();

    let published = records
        .iter()
        .filter(|r| r.status == TransferStatus::Published)
        .count();
    let failures: Vec<FailureEntry> = records
        .iter()
        .filter(|r| r.status != TransferStatus::Published)
        .map(|r| FailureEntry {
            canonical_url: r.canonical_url.clone(),
            reason: r
                .failure_reason
                .clone()
                .unwrap_or_else(|| format!("transfer stopped in state {}", r.status)),
        })
        .collect();

    RunReport {
        run_id: Uuid::new_v4(),
        total_count: documents.len(),
        attempted: records.len(),
        published,
        failed: failures.len(),
        not_attempted,
        strategies,
        documents: documents.to_vec(),
        transfers: records,
        failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::StrategyOrigin;
    use std::collections::BTreeSet;

    fn doc(url: &str) -> CanonicalDocument {
        CanonicalDocument {
            canonical_url: url.to_string(),
            title: url.to_string(),
            size: 0,
            published_at: None,
            modified_at: None,
            source_id: None,
            source_strategies: BTreeSet::from([StrategyOrigin::Api]),
        }
    }

    fn record(url: &str, ok: bool) -> TransferRecord {
        let mut r = TransferRecord::new(url);
        r.attempt_count = 1;
        r.advance(TransferStatus::Fetching);
        if ok {
            r.advance(TransferStatus::Fetched);
            r.advance(TransferStatus::Publishing);
            r.advance(TransferStatus::Published);
        } else {
            r.fail("fetch failed with http status 404");
        }
        r
    }

    #[test]
    fn counts_terminal_states_and_unattempted_documents() {
        let docs = vec![doc("https://x/a.pdf"), doc("https://x/b.pdf"), doc("https://x/c.pdf")];
        let records = vec![record("https://x/b.pdf", false), record("https://x/a.pdf", true)];

        let report = summarize(&docs, records, Vec::new());

        assert_eq!(report.total_count, 3);
        assert_eq!(report.attempted, 2);
        assert_eq!(report.published, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.not_attempted, vec!["https://x/c.pdf".to_string()]);
        assert_eq!(report.failures[0].canonical_url, "https://x/b.pdf");
        assert!(report.failures[0].reason.contains("404"));
        assert_eq!(report.transfers[0].canonical_url, "https://x/a.pdf");
        assert!(!report.all_published());
    }

    #[test]
    fn all_published_requires_every_document() {
        let docs = vec![doc("https://x/a.pdf")];
        let report = summarize(&docs, vec![record("https://x/a.pdf", true)], Vec::new());
        assert!(report.all_published());
        assert!(report.summary_line().contains("published 1"));

        let empty = summarize(&[], Vec::new(), Vec::new());
        assert!(!empty.all_published());
    }

    #[test]
    fn report_serializes_to_json_with_total_count() {
        let docs = vec![doc("https://x/a.pdf")];
        let report = summarize(&docs, vec![record("https://x/a.pdf", false)], Vec::new());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["total_count"], 1);
        assert_eq!(json["transfers"][0]["status"], "FAILED");
        assert_eq!(json["documents"][0]["source_strategies"][0], "API");
    }
}
