// =============================================================================
// Market Lens — Main Entry Point
// =============================================================================
//
// Backend for the market dashboard: fetches daily history from the market
// data provider, enriches it with technical indicators, caches it on disk and
// serves it as JSON to the browser UI.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod dashboard;
mod indicators;
mod provider;
mod runtime_config;
mod store;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::provider::YahooClient;
use crate::runtime_config::RuntimeConfig;

const CONFIG_PATH: &str = "runtime_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Market Lens starting up");

    let mut config = RuntimeConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        let defaults = RuntimeConfig::default();
        if !std::path::Path::new(CONFIG_PATH).exists() {
            if let Err(e) = defaults.save(CONFIG_PATH) {
                warn!(error = %e, "Failed to write default config");
            }
        }
        defaults
    });
    config.apply_env_overrides();

    info!(
        data_dir = %config.data_dir.display(),
        provider = %config.provider_base_url,
        fetch_timeout_secs = config.fetch_timeout_secs,
        memo_ttl_secs = config.memo_ttl_secs,
        "Configuration resolved"
    );

    // ── 2. Provider + shared state ───────────────────────────────────────
    let provider = YahooClient::new(&config.provider_base_url, config.fetch_timeout())?;
    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config, provider)?);

    // ── 3. API server ────────────────────────────────────────────────────
    let app = api::rest::router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server to {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server failed")?;

    info!("Market Lens shut down complete.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    warn!("Shutdown signal received — stopping gracefully");
}
