//! Merges the outputs of all discovery strategies into one canonical set keyed by normalized URL.
//!
//! For each canonical URL the reference with the highest strategy confidence donates all
//! metadata (first seen wins a tie) and every contributing strategy is recorded. Output keeps
//! the order in which canonical URLs were first discovered.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info, warn};

use crate::contract::{CanonicalDocument, DocumentReference, StrategyOrigin};
use crate::error::ReconciliationError;

/// Canonical form of a document URL.
///
/// Scheme and host are lowercased, the path is kept byte for byte (case and percent-encoding
/// included), query and fragment are dropped. Returns `None` for anything without
/// `scheme://host`.
pub fn normalize_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let (scheme, rest) = trimmed.split_once("://")?;
    if scheme.is_empty()
        || !scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    {
        return None;
    }
    let end = rest.find(|c| c == '?' || c == '#').unwrap_or(rest.len());
    let rest = &rest[..end];
    let (authority, path) = match rest.find('/') {
        Some(idx) => rest.split_at(idx),
        None => (rest, ""),
    };
    if authority.is_empty() {
        return None;
    }
    let authority = match authority.rsplit_once('@') {
        Some((userinfo, host)) => format!("{userinfo}@{}", host.to_ascii_lowercase()),
        None => authority.to_ascii_lowercase(),
    };
    Some(format!("{}://{}{}", scheme.to_ascii_lowercase(), authority, path))
}

/// Last non-empty path segment of a URL, used when no strategy supplied a title.
pub fn file_name_of(url: &str) -> &str {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(url)
}

/// Reconciled documents, in first-discovery order, addressable by canonical URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalSet {
    documents: Vec<CanonicalDocument>,
    index: HashMap<String, usize>,
}

impl CanonicalSet {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, canonical_url: &str) -> Option<&CanonicalDocument> {
        self.index.get(canonical_url).map(|&i| &self.documents[i])
    }

    pub fn documents(&self) -> &[CanonicalDocument] {
        &self.documents
    }

    pub fn into_documents(self) -> Vec<CanonicalDocument> {
        self.documents
    }

    /// Display order used by listings; reconciliation itself never sorts.
    pub fn sorted_by_title(&self) -> Vec<CanonicalDocument> {
        let mut docs = self.documents.clone();
        docs.sort_by(|a, b| a.title.cmp(&b.title));
        docs
    }
}

struct Group<'a> {
    canonical_url: String,
    donor: &'a DocumentReference,
    strategies: BTreeSet<StrategyOrigin>,
}

/// Merges one reference list per strategy, in strategy execution order.
pub fn reconcile(
    batches: &[Vec<DocumentReference>],
) -> Result<CanonicalSet, ReconciliationError> {
    let mut groups: Vec<Group<'_>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut skipped = 0usize;

    for reference in batches.iter().flatten() {
        let Some(canonical_url) = normalize_url(&reference.url) else {
            warn!(url = %reference.url, origin = %reference.strategy_origin, "[RECONCILE] Skipping reference without an absolute URL");
            skipped += 1;
            continue;
        };
        match index.get(&canonical_url) {
            Some(&i) => {
                let group = &mut groups[i];
                group.strategies.insert(reference.strategy_origin);
                if reference.strategy_confidence() > group.donor.strategy_confidence() {
                    debug!(url = %canonical_url, donor = %reference.strategy_origin, "[RECONCILE] Higher-confidence donor replaces earlier one");
                    group.donor = reference;
                }
            }
            None => {
                index.insert(canonical_url.clone(), groups.len());
                groups.push(Group {
                    canonical_url,
                    donor: reference,
                    strategies: BTreeSet::from([reference.strategy_origin]),
                });
            }
        }
    }

    if groups.is_empty() {
        return Err(ReconciliationError::NothingDiscovered);
    }

    let documents: Vec<CanonicalDocument> = groups.into_iter().map(into_canonical).collect();
    info!(
        documents = documents.len(),
        references = batches.iter().map(Vec::len).sum::<usize>(),
        skipped,
        "[RECONCILE] Reconciled discovery results"
    );
    Ok(CanonicalSet { documents, index })
}

fn into_canonical(group: Group<'_>) -> CanonicalDocument {
    let donor = group.donor;
    let title = donor
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| file_name_of(&group.canonical_url).to_string());
    CanonicalDocument {
        title,
        size: donor.declared_size.unwrap_or(0),
        published_at: donor.timestamps.created.clone(),
        modified_at: donor.timestamps.modified.clone(),
        source_id: donor.source_id,
        source_strategies: group.strategies,
        canonical_url: group.canonical_url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_lowercases_scheme_and_host_only() {
        assert_eq!(
            normalize_url("HTTPS://Example.ORG/Uploads/Rules%20v2.PDF?ver=3#p1").as_deref(),
            Some("https://example.org/Uploads/Rules%20v2.PDF")
        );
    }

    #[test]
    fn normalize_keeps_port_and_userinfo() {
        assert_eq!(
            normalize_url("http://User@Host.COM:8080/a.pdf").as_deref(),
            Some("http://User@host.com:8080/a.pdf")
        );
    }

    #[test]
    fn normalize_rejects_relative_urls() {
        assert_eq!(normalize_url("/wp-content/a.pdf"), None);
        assert_eq!(normalize_url("https:///a.pdf"), None);
        assert_eq!(normalize_url("://x/a.pdf"), None);
    }

    #[test]
    fn file_name_is_last_segment() {
        assert_eq!(file_name_of("https://x/uploads/2024/rules.pdf"), "rules.pdf");
        assert_eq!(file_name_of("https://x/"), "x");
    }
}
