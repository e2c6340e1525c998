// =============================================================================
// TA Pulse — Main Entry Point
// =============================================================================
//
// Wires the market data sources, the refresh pipeline and the publisher
// together, then serves the REST + WebSocket surface until Ctrl+C.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod binance;
mod coingecko;
mod config;
mod error;
mod htf_analysis;
mod indicators;
mod market_data;
mod order_book;
mod pipeline;
mod publisher;
mod snapshot;
mod types;

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::binance::BinanceClient;
use crate::coingecko::CoinGeckoClient;
use crate::config::{AppConfig, SourceKind};
use crate::market_data::{FailoverSource, MarketDataSource, SyntheticSource};
use crate::pipeline::{PipelineSettings, RefreshPipeline};
use crate::publisher::Publisher;
use crate::snapshot::SnapshotBuilder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        TA Pulse — Starting Up                            ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let config = AppConfig::resolve();

    // Seed an editable config file on first run.
    let config_path = config::config_path();
    if !config_path.exists() {
        match AppConfig::default().save(&config_path) {
            Ok(()) => info!(path = %config_path.display(), "Default config written"),
            Err(e) => warn!(error = %e, "Failed to write default config"),
        }
    }

    info!(
        symbol = %config.symbol,
        interval = %config.interval,
        refresh_secs = config.refresh_secs,
        "Configuration loaded"
    );

    // ── 2. Market data sources ───────────────────────────────────────────
    let source: Arc<dyn MarketDataSource> = Arc::new(FailoverSource::new(
        build_sources(&config),
        config.fetch_timeout(),
    ));
    info!(source = source.name(), "Market data source chain ready");

    // ── 3. Publisher + refresh pipeline ──────────────────────────────────
    let publisher = Arc::new(Publisher::default());
    let pipeline = Arc::new(RefreshPipeline::new(
        PipelineSettings::from(&config),
        source,
        SnapshotBuilder::new(config.display_symbol.clone(), config.indicators.clone()),
        Arc::clone(&publisher),
    ));
    let refresh_task = pipeline.spawn();

    let state = Arc::new(AppState::new(
        config.display_symbol.clone(),
        publisher,
        Arc::clone(&pipeline),
    ));

    // ── 4. HTTP / WebSocket server ───────────────────────────────────────
    let app = api::rest::router(state.clone(), &config.static_dir);
    let bind_addr = config.bind_addr.clone();
    tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .expect("Failed to bind API server");
        info!(addr = %bind_addr, "API server listening");
        axum::serve(listener, app)
            .await
            .expect("API server error");
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping gracefully");

    refresh_task.abort();
    info!(
        cycles = pipeline.cycles(),
        ws_clients = state.health().ws_clients,
        "TA Pulse shut down complete."
    );
    Ok(())
}

/// Instantiate the configured upstreams in order. A client that cannot be
/// built is skipped; an empty chain falls back to the synthetic source so the
/// pipeline always has something to call.
fn build_sources(config: &AppConfig) -> Vec<Arc<dyn MarketDataSource>> {
    let mut sources: Vec<Arc<dyn MarketDataSource>> = Vec::new();

    for kind in &config.sources {
        match kind {
            SourceKind::Binance => match BinanceClient::new(config.binance_base_url.as_str()) {
                Ok(client) => sources.push(Arc::new(client)),
                Err(e) => warn!(error = %e, "Binance client unavailable, skipping"),
            },
            SourceKind::CoinGecko => match CoinGeckoClient::new(
                config.coingecko_base_url.as_str(),
                config.coingecko_coin_id.as_str(),
            ) {
                Ok(client) => sources.push(Arc::new(client)),
                Err(e) => warn!(error = %e, "CoinGecko client unavailable, skipping"),
            },
            SourceKind::Synthetic => {
                sources.push(Arc::new(SyntheticSource::new(config.fallback_price)));
            }
        }
    }

    if sources.is_empty() {
        warn!("No usable market data source configured, using synthetic data");
        sources.push(Arc::new(SyntheticSource::new(config.fallback_price)));
    }

    sources
}
