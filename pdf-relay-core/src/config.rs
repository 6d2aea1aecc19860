//! Configuration sections for a run: where documents come from, where they go, and how the
//! transfer is tuned. All fields except [`SourceConfig::base_url`] have serde defaults.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::contract::StrategyOrigin;
use crate::http::HttpSettings;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Site root, e.g. `https://example.org`.
    pub base_url: String,
    #[serde(default = "default_media_path")]
    pub media_path: String,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    /// Safety ceiling on API pagination.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
    #[serde(default = "default_sitemap_path")]
    pub sitemap_path: String,
    #[serde(default = "default_crawl_paths")]
    pub crawl_paths: Vec<String>,
    /// Execution order matters: it is the tie-break order of reconciliation.
    #[serde(default = "default_strategies")]
    pub strategies: Vec<StrategyOrigin>,
}

impl SourceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            media_path: default_media_path(),
            per_page: default_per_page(),
            max_pages: default_max_pages(),
            mime_type: default_mime_type(),
            sitemap_path: default_sitemap_path(),
            crawl_paths: default_crawl_paths(),
            strategies: default_strategies(),
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            base_url = %self.base_url,
            strategies = ?self.strategies,
            max_pages = self.max_pages,
            crawl_paths = self.crawl_paths.len(),
            "Loaded source config"
        );
        debug!(?self, "Source config loaded (full debug)");
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// Upload endpoint; may also be injected from the environment.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Extra `action` form field, needed by admin-ajax style endpoints.
    #[serde(default)]
    pub action: Option<String>,
}

impl DestinationConfig {
    pub fn trace_loaded(&self) {
        info!(
            endpoint = self.endpoint.as_deref().unwrap_or("<unset>"),
            action = self.action.as_deref().unwrap_or("<none>"),
            "Loaded destination config"
        );
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Directory for temporary artifacts.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_strategy_timeout_secs")]
    pub strategy_timeout_secs: u64,
    #[serde(default)]
    pub size_tolerance_bytes: u64,
    #[serde(default)]
    pub request_delay_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            workers: default_workers(),
            max_bytes: default_max_bytes(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            strategy_timeout_secs: default_strategy_timeout_secs(),
            size_tolerance_bytes: 0,
            request_delay_ms: 0,
            user_agent: default_user_agent(),
        }
    }
}

impl TransferConfig {
    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            user_agent: self.user_agent.clone(),
        }
    }

    pub fn strategy_timeout(&self) -> Duration {
        Duration::from_secs(self.strategy_timeout_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn trace_loaded(&self) {
        info!(
            work_dir = %self.work_dir.display(),
            workers = self.workers,
            max_bytes = self.max_bytes,
            request_timeout_secs = self.request_timeout_secs,
            "Loaded transfer config"
        );
    }
}

fn default_media_path() -> String {
    "/wp-json/wp/v2/media".to_string()
}

fn default_per_page() -> u32 {
    100
}

fn default_max_pages() -> u32 {
    20
}

fn default_mime_type() -> String {
    "application/pdf".to_string()
}

fn default_sitemap_path() -> String {
    "/sitemap.xml".to_string()
}

fn default_crawl_paths() -> Vec<String> {
    [
        "/regler/",
        "/dokument/",
        "/downloads/",
        "/resources/",
        "/tavlingsbestammelser/",
        "/",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_strategies() -> Vec<StrategyOrigin> {
    vec![
        StrategyOrigin::Api,
        StrategyOrigin::Sitemap,
        StrategyOrigin::Crawl,
    ]
}

fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("pdf-relay")
}

fn default_workers() -> usize {
    4
}

// Matches the upload endpoint's own file size limit.
fn default_max_bytes() -> u64 {
    100 * 1024 * 1024
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_strategy_timeout_secs() -> u64 {
    120
}

fn default_user_agent() -> String {
    concat!("pdf-relay/", env!("CARGO_PKG_VERSION")).to_string()
}
