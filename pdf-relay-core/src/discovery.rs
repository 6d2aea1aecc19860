//! Discovery strategies: independent producers of [`DocumentReference`]s.
//!
//! - [`ApiStrategy`]: paginated media listing (`GET <media>?per_page=<n>&page=<k>`).
//! - [`SitemapStrategy`]: `.pdf` locations in the sitemap. Never fails.
//! - [`CrawlStrategy`]: absolute `.pdf` links in a fixed set of pages.
//!
//! [`discover_all`] runs them concurrently, bounds each by a timeout and turns failures into
//! [`StrategyOutcome`] data so that one unreachable strategy only reduces coverage.

use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::contract::{DiscoveryStrategy, DocumentReference, StrategyOrigin, Timestamps};
use crate::error::DiscoveryError;
use crate::http::join_url;

/// Result of running one strategy within a run.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyOutcome {
    pub origin: StrategyOrigin,
    #[serde(skip)]
    pub references: Vec<DocumentReference>,
    pub reference_count: usize,
    pub error: Option<String>,
}

/// Builds the configured strategies in configured order; duplicates are ignored.
pub fn build_strategies(
    client: reqwest::Client,
    source: &SourceConfig,
) -> Vec<Box<dyn DiscoveryStrategy>> {
    let mut seen = HashSet::new();
    let mut strategies: Vec<Box<dyn DiscoveryStrategy>> = Vec::new();
    for origin in &source.strategies {
        if !seen.insert(*origin) {
            continue;
        }
        let strategy: Box<dyn DiscoveryStrategy> = match origin {
            StrategyOrigin::Api => Box::new(ApiStrategy::new(client.clone(), source)),
            StrategyOrigin::Sitemap => Box::new(SitemapStrategy::new(client.clone(), source)),
            StrategyOrigin::Crawl => Box::new(CrawlStrategy::new(client.clone(), source)),
        };
        strategies.push(strategy);
    }
    strategies
}

/// Runs all strategies concurrently. Outcomes are returned in strategy order.
pub async fn discover_all(
    strategies: &[Box<dyn DiscoveryStrategy>],
    timeout: Duration,
) -> Vec<StrategyOutcome> {
    let runs = strategies.iter().map(|strategy| async move {
        let origin = strategy.origin();
        info!(%origin, "[DISCOVERY] Starting strategy");
        let result = match tokio::time::timeout(timeout, strategy.discover()).await {
            Ok(result) => result,
            Err(_) => Err(DiscoveryError::Timeout {
                origin,
                secs: timeout.as_secs(),
            }),
        };
        match result {
            Ok(references) => {
                info!(%origin, count = references.len(), "[DISCOVERY] Strategy finished");
                StrategyOutcome {
                    origin,
                    reference_count: references.len(),
                    references,
                    error: None,
                }
            }
            Err(e) => {
                warn!(%origin, error = %e, "[DISCOVERY] Strategy failed, continuing without it");
                StrategyOutcome {
                    origin,
                    references: Vec::new(),
                    reference_count: 0,
                    error: Some(e.to_string()),
                }
            }
        }
    });
    join_all(runs).await
}

/// Title as exposed by the media API: a plain string, `{ "rendered": "..." }`, or some other
/// shape that carries no usable text.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum MediaTitle {
    Plain(String),
    Rendered { rendered: String },
    Other(Value),
}

impl MediaTitle {
    fn into_text(self) -> Option<String> {
        match self {
            MediaTitle::Plain(s) => Some(s),
            MediaTitle::Rendered { rendered } => Some(rendered),
            MediaTitle::Other(_) => None,
        }
    }
}

// Field shapes vary between sites and plugins. A field with an unexpected shape reads as absent
// so the rest of the item is still usable.
#[derive(Debug, Deserialize)]
struct MediaItem {
    #[serde(default, deserialize_with = "lenient_u64")]
    id: Option<u64>,
    #[serde(default, deserialize_with = "lenient_string")]
    mime_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    source_url: Option<String>,
    #[serde(default)]
    title: Option<MediaTitle>,
    #[serde(default, deserialize_with = "lenient_string")]
    slug: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    modified: Option<String>,
    #[serde(default)]
    media_details: Option<Value>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

impl MediaItem {
    fn into_reference(self, mime_type: &str) -> Option<DocumentReference> {
        if !self
            .mime_type
            .as_deref()
            .is_some_and(|m| m.eq_ignore_ascii_case(mime_type))
        {
            return None;
        }
        let url = self.source_url.filter(|u| u.contains("://"))?;
        let title = self
            .title
            .and_then(MediaTitle::into_text)
            .filter(|t| !t.trim().is_empty())
            .or(self.slug.filter(|s| !s.is_empty()));
        let declared_size = self
            .media_details
            .as_ref()
            .and_then(|d| d.get("filesize"))
            .and_then(Value::as_u64);
        Some(DocumentReference {
            url,
            title,
            declared_size,
            timestamps: Timestamps {
                created: self.date,
                modified: self.modified,
            },
            strategy_origin: StrategyOrigin::Api,
            source_id: self.id,
        })
    }
}

/// Paginated media listing of the source site's metadata API.
pub struct ApiStrategy {
    client: reqwest::Client,
    endpoint: String,
    per_page: u32,
    max_pages: u32,
    mime_type: String,
}

impl ApiStrategy {
    pub fn new(client: reqwest::Client, source: &SourceConfig) -> Self {
        Self {
            client,
            endpoint: join_url(&source.base_url, &source.media_path),
            per_page: source.per_page,
            max_pages: source.max_pages,
            mime_type: source.mime_type.clone(),
        }
    }

    async fn fetch_page(&self, page: u32) -> Result<Vec<Value>, DiscoveryError> {
        let origin = StrategyOrigin::Api;
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("per_page", self.per_page), ("page", page)])
            .send()
            .await
            .map_err(|e| DiscoveryError::Unreachable {
                origin,
                message: e.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::Status {
                origin,
                status: status.as_u16(),
            });
        }
        response
            .json::<Vec<Value>>()
            .await
            .map_err(|e| DiscoveryError::Malformed {
                origin,
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl DiscoveryStrategy for ApiStrategy {
    fn origin(&self) -> StrategyOrigin {
        StrategyOrigin::Api
    }

    async fn discover(&self) -> Result<Vec<DocumentReference>, DiscoveryError> {
        let mut references = Vec::new();
        let mut exhausted = false;
        for page in 1..=self.max_pages {
            let items = match self.fetch_page(page).await {
                Ok(items) => items,
                Err(e) if page == 1 => return Err(e),
                Err(e) => {
                    // Listings past the last page answer with an error status on some sites.
                    info!(page, error = %e, "[DISCOVERY][API] Pagination ended on error");
                    exhausted = true;
                    break;
                }
            };
            if items.is_empty() {
                debug!(page, "[DISCOVERY][API] Empty page, pagination complete");
                exhausted = true;
                break;
            }
            let before = references.len();
            for raw in items {
                match serde_json::from_value::<MediaItem>(raw) {
                    Ok(item) => references.extend(item.into_reference(&self.mime_type)),
                    Err(e) => warn!(page, error = %e, "[DISCOVERY][API] Skipping malformed media item"),
                }
            }
            info!(
                page,
                matched = references.len() - before,
                "[DISCOVERY][API] Page processed"
            );
        }
        if !exhausted {
            warn!(
                max_pages = self.max_pages,
                "[DISCOVERY][API] Page ceiling reached before the listing ended"
            );
        }
        Ok(references)
    }
}

fn sitemap_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)<loc>\s*([^<\s]+?\.pdf)\s*</loc>").expect("static sitemap pattern")
    })
}

fn link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)https?://[^"'\s<>()]+?\.pdf\b"#).expect("static link pattern")
    })
}

/// `.pdf` locations listed in a sitemap document, in document order.
pub fn extract_sitemap_pdfs(xml: &str) -> Vec<String> {
    sitemap_pattern()
        .captures_iter(xml)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Absolute `.pdf` links in a raw response body, in document order.
pub fn extract_pdf_links(body: &str) -> Vec<String> {
    link_pattern()
        .find_iter(body)
        .map(|m| m.as_str().to_string())
        .collect()
}

pub struct SitemapStrategy {
    client: reqwest::Client,
    url: String,
}

impl SitemapStrategy {
    pub fn new(client: reqwest::Client, source: &SourceConfig) -> Self {
        Self {
            client,
            url: join_url(&source.base_url, &source.sitemap_path),
        }
    }

    async fn fetch(&self) -> Result<String, String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("http status {status}"));
        }
        response.text().await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl DiscoveryStrategy for SitemapStrategy {
    fn origin(&self) -> StrategyOrigin {
        StrategyOrigin::Sitemap
    }

    async fn discover(&self) -> Result<Vec<DocumentReference>, DiscoveryError> {
        let body = match self.fetch().await {
            Ok(body) => body,
            Err(reason) => {
                info!(url = %self.url, %reason, "[DISCOVERY][SITEMAP] No usable sitemap");
                return Ok(Vec::new());
            }
        };
        let references: Vec<DocumentReference> = extract_sitemap_pdfs(&body)
            .into_iter()
            .map(|url| DocumentReference::new(url, StrategyOrigin::Sitemap))
            .collect();
        info!(count = references.len(), "[DISCOVERY][SITEMAP] Found PDF locations");
        Ok(references)
    }
}

pub struct CrawlStrategy {
    client: reqwest::Client,
    base_url: String,
    paths: Vec<String>,
}

impl CrawlStrategy {
    pub fn new(client: reqwest::Client, source: &SourceConfig) -> Self {
        Self {
            client,
            base_url: source.base_url.clone(),
            paths: source.crawl_paths.clone(),
        }
    }

    async fn crawl_path(&self, path: &str) -> Result<Vec<String>, String> {
        let url = join_url(&self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("http status {status}"));
        }
        let body = response.text().await.map_err(|e| e.to_string())?;
        Ok(extract_pdf_links(&body))
    }
}

#[async_trait]
impl DiscoveryStrategy for CrawlStrategy {
    fn origin(&self) -> StrategyOrigin {
        StrategyOrigin::Crawl
    }

    async fn discover(&self) -> Result<Vec<DocumentReference>, DiscoveryError> {
        let results = join_all(self.paths.iter().map(|path| self.crawl_path(path))).await;

        let mut seen = HashSet::new();
        let mut references = Vec::new();
        let mut failures = Vec::new();
        for (path, result) in self.paths.iter().zip(results) {
            match result {
                Ok(links) => {
                    debug!(%path, count = links.len(), "[DISCOVERY][CRAWL] Page crawled");
                    for link in links {
                        if seen.insert(link.clone()) {
                            references.push(DocumentReference::new(link, StrategyOrigin::Crawl));
                        }
                    }
                }
                Err(reason) => {
                    warn!(%path, %reason, "[DISCOVERY][CRAWL] Page failed");
                    failures.push(format!("{path}: {reason}"));
                }
            }
        }

        if !self.paths.is_empty() && failures.len() == self.paths.len() {
            return Err(DiscoveryError::Unreachable {
                origin: StrategyOrigin::Crawl,
                message: failures.join("; "),
            });
        }
        Ok(references)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sitemap_extraction_does_not_span_non_pdf_locations() {
        let xml = "<urlset><url><loc>https://x/page/</loc></url>\
                   <url><loc>https://x/a.PDF</loc></url>\
                   <url><loc> https://x/b.pdf </loc></url></urlset>";
        assert_eq!(extract_sitemap_pdfs(xml), vec!["https://x/a.PDF", "https://x/b.pdf"]);
    }

    #[test]
    fn link_extraction_finds_absolute_pdf_urls_only() {
        let html = r#"<a href="https://x/u/rules.pdf">Rules</a>
                      <a href="/relative.pdf">rel</a>
                      <a href='http://x/other.pdf?ver=2'>o</a>
                      <img src="https://x/pic.png">"#;
        assert_eq!(
            extract_pdf_links(html),
            vec!["https://x/u/rules.pdf", "http://x/other.pdf"]
        );
    }

    #[test]
    fn media_item_title_accepts_plain_and_rendered_shapes() {
        let rendered: MediaItem = serde_json::from_str(
            r#"{"id":1,"mime_type":"application/pdf","source_url":"https://x/a.pdf",
                "title":{"rendered":"Rules"},"media_details":{"filesize":42}}"#,
        )
        .unwrap();
        let reference = rendered.into_reference("application/pdf").unwrap();
        assert_eq!(reference.title.as_deref(), Some("Rules"));
        assert_eq!(reference.declared_size, Some(42));
        assert_eq!(reference.source_id, Some(1));

        let plain: MediaItem = serde_json::from_str(
            r#"{"mime_type":"application/pdf","source_url":"https://x/b.pdf","title":"Plain"}"#,
        )
        .unwrap();
        assert_eq!(
            plain.into_reference("application/pdf").unwrap().title.as_deref(),
            Some("Plain")
        );
    }

    #[test]
    fn media_item_falls_back_to_slug_and_tolerates_array_details() {
        let item: MediaItem = serde_json::from_str(
            r#"{"mime_type":"application/pdf","source_url":"https://x/c.pdf",
                "title":{"rendered":""},"slug":"c-doc","media_details":[]}"#,
        )
        .unwrap();
        let reference = item.into_reference("application/pdf").unwrap();
        assert_eq!(reference.title.as_deref(), Some("c-doc"));
        assert_eq!(reference.declared_size, None);
    }

    #[test]
    fn media_item_survives_unexpected_field_shapes() {
        let title_without_rendered: MediaItem = serde_json::from_str(
            r#"{"mime_type":"application/pdf","source_url":"https://x/d.pdf",
                "title":{"raw":"Doc"},"slug":"doc"}"#,
        )
        .unwrap();
        let reference = title_without_rendered.into_reference("application/pdf").unwrap();
        assert_eq!(reference.title.as_deref(), Some("doc"));

        let string_id: MediaItem = serde_json::from_str(
            r#"{"id":"9","mime_type":"application/pdf","source_url":"https://x/e.pdf"}"#,
        )
        .unwrap();
        assert_eq!(
            string_id.into_reference("application/pdf").unwrap().source_id,
            Some(9)
        );

        let bool_date: MediaItem = serde_json::from_str(
            r#"{"id":3,"mime_type":"application/pdf","source_url":"https://x/f.pdf",
                "date":false,"modified":null,"title":"F"}"#,
        )
        .unwrap();
        let reference = bool_date.into_reference("application/pdf").unwrap();
        assert_eq!(reference.url, "https://x/f.pdf");
        assert_eq!(reference.timestamps.created, None);
        assert_eq!(reference.timestamps.modified, None);
        assert_eq!(reference.title.as_deref(), Some("F"));
    }

    #[test]
    fn media_item_without_usable_source_url_is_dropped() {
        let item: MediaItem = serde_json::from_str(
            r#"{"mime_type":"application/pdf","source_url":42}"#,
        )
        .unwrap();
        assert!(item.into_reference("application/pdf").is_none());
    }

    #[test]
    fn media_item_with_other_mime_type_is_filtered_out() {
        let item: MediaItem = serde_json::from_str(
            r#"{"mime_type":"image/jpeg","source_url":"https://x/a.jpg"}"#,
        )
        .unwrap();
        assert!(item.into_reference("application/pdf").is_none());
    }
}
