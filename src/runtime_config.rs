// =============================================================================
// Runtime Configuration — dashboard backend settings with atomic save
// =============================================================================
//
// Every field carries `#[serde(default)]` so that adding new fields never
// breaks loading an older config file. Persistence uses the same tmp + rename
// pattern as the cache snapshots.
// =============================================================================

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::provider::yahoo::DEFAULT_BASE_URL;
use crate::store::snapshot::write_atomic;
use crate::types::Period;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("DB")
}

fn default_bind_addr() -> String {
    "0.0.0.0:8501".to_string()
}

fn default_provider_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_memo_ttl_secs() -> u64 {
    3600
}

fn default_currency_prefix() -> String {
    "R$".to_string()
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level configuration for the Market Lens backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Directory holding one snapshot per symbol plus the combined export.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Address the HTTP API listens on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Base URL of the market data provider.
    #[serde(default = "default_provider_base_url")]
    pub provider_base_url: String,

    /// Upper bound on a single provider request.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// How long an in-process result is reused before the store is asked again.
    #[serde(default = "default_memo_ttl_secs")]
    pub memo_ttl_secs: u64,

    /// Period used when a request does not name one.
    #[serde(default)]
    pub default_period: Period,

    /// Prefix for formatted prices in table rows.
    #[serde(default = "default_currency_prefix")]
    pub currency_prefix: String,

    /// Rewrite the combined export after every dashboard request.
    #[serde(default = "default_true")]
    pub export_on_dashboard: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            bind_addr: default_bind_addr(),
            provider_base_url: default_provider_base_url(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            memo_ttl_secs: default_memo_ttl_secs(),
            default_period: Period::default(),
            currency_prefix: default_currency_prefix(),
            export_on_dashboard: true,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            data_dir = %config.data_dir.display(),
            default_period = %config.default_period,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` (tmp file, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;
        write_atomic(path, content.as_bytes())?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Apply `MARKET_LENS_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("MARKET_LENS_BIND_ADDR") {
            if !addr.trim().is_empty() {
                self.bind_addr = addr.trim().to_string();
            }
        }
        if let Ok(dir) = std::env::var("MARKET_LENS_DATA_DIR") {
            if !dir.trim().is_empty() {
                self.data_dir = PathBuf::from(dir.trim());
            }
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    pub fn memo_ttl(&self) -> Duration {
        Duration::from_secs(self.memo_ttl_secs)
    }
}
