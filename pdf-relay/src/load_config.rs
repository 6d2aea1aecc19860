/// `load_config` module: Loads a static YAML config and injects destination settings from the
/// environment.
///
/// This module is the only place where the user-supplied YAML is parsed and mapped to the
/// typed sections of [`pdf_relay_core::config`].
///
/// # Responsibilities
/// - Parse the config file into [`CliConfig`]
/// - Apply environment overrides (`PDF_RELAY_UPLOAD_ENDPOINT`, `PDF_RELAY_UPLOAD_ACTION`)
/// - Surface clear diagnostics: every failure here is an `anyhow::Error` shown at the CLI boundary
///
/// The destination endpoint may be absent for `discover`; `sync` calls
/// [`CliConfig::require_endpoint`].
use anyhow::{Context, Result};
use pdf_relay_core::config::{DestinationConfig, SourceConfig, TransferConfig};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{error, info};

pub const ENDPOINT_ENV: &str = "PDF_RELAY_UPLOAD_ENDPOINT";
pub const ACTION_ENV: &str = "PDF_RELAY_UPLOAD_ACTION";

#[derive(Debug, Deserialize)]
pub struct CliConfig {
    pub source: SourceConfig,
    #[serde(default)]
    pub destination: DestinationConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
}

impl CliConfig {
    pub fn require_endpoint(&self) -> Result<&str> {
        match self.destination.endpoint.as_deref() {
            Some(endpoint) if !endpoint.trim().is_empty() => Ok(endpoint),
            _ => {
                error!("No destination endpoint configured");
                anyhow::bail!(
                    "no destination endpoint configured: set destination.endpoint or {ENDPOINT_ENV}"
                )
            }
        }
    }

    pub fn trace_loaded(&self) {
        self.source.trace_loaded();
        self.destination.trace_loaded();
        self.transfer.trace_loaded();
    }
}

/// Loads the YAML config file and applies environment overrides.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = fs::read_to_string(path_ref).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
        e
    })
    .with_context(|| format!("Failed to read config file {path_ref:?}"))?;

    let mut config: CliConfig = serde_yaml::from_str(&config_content).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
        anyhow::anyhow!("Failed to parse config YAML: {e}")
    })?;
    info!(config_path = ?path_ref, "Parsed config YAML successfully");

    if let Ok(endpoint) = std::env::var(ENDPOINT_ENV) {
        info!("{ENDPOINT_ENV} found in env, overriding destination.endpoint");
        config.destination.endpoint = Some(endpoint);
    }
    if let Ok(action) = std::env::var(ACTION_ENV) {
        info!("{ACTION_ENV} found in env, overriding destination.action");
        config.destination.action = Some(action);
    }

    if config.source.base_url.trim().is_empty() {
        anyhow::bail!("source.base_url must not be empty");
    }

    config.trace_loaded();
    Ok(config)
}
