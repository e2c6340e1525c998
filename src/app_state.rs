// =============================================================================
// Central Application State — handles shared by the HTTP layer
// =============================================================================
//
// AppState ties the publisher (latest snapshot + broadcast) and the refresh
// pipeline (phase, cycle reports) together for the REST and WebSocket
// handlers. The pipeline is the only writer of snapshots; everything here is
// read-only apart from the connection counters.
//
// Thread safety:
//   - Atomic counters for connection and message tracking.
//   - Arc wrappers for subsystems that manage their own interior mutability.
// =============================================================================

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::pipeline::{CycleReport, Phase, RefreshPipeline};
use crate::publisher::Publisher;
use crate::snapshot::wire::TechnicalData;

// =============================================================================
// Health
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub symbol: String,
    pub source: String,
    pub phase: Phase,
    pub cycles: u64,
    pub snapshots_published: u64,
    pub ws_clients: usize,
    pub uptime_secs: u64,
    pub last_cycle: Option<CycleReport>,
    pub server_time: i64,
}

// =============================================================================
// AppState
// =============================================================================

/// Shared across all HTTP handlers via `Arc<AppState>`.
pub struct AppState {
    /// Symbol as shown to clients (e.g. "SOL/USDT").
    pub display_symbol: String,

    pub publisher: Arc<Publisher>,
    pub pipeline: Arc<RefreshPipeline>,

    // ── Connection tracking ─────────────────────────────────────────────
    pub ws_clients: AtomicUsize,
    /// Total WebSocket messages sent across all connections.
    pub ws_messages_sent: AtomicU64,

    /// Instant when the server was started. Used for uptime calculations.
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        display_symbol: impl Into<String>,
        publisher: Arc<Publisher>,
        pipeline: Arc<RefreshPipeline>,
    ) -> Self {
        Self {
            display_symbol: display_symbol.into(),
            publisher,
            pipeline,
            ws_clients: AtomicUsize::new(0),
            ws_messages_sent: AtomicU64::new(0),
            start_time: std::time::Instant::now(),
        }
    }

    /// Wire document for the latest snapshot, or the neutral placeholder
    /// before the first cycle has published.
    pub fn technical_data(&self) -> TechnicalData {
        match self.publisher.latest() {
            Some(snapshot) => TechnicalData::from(snapshot.as_ref()),
            None => self.placeholder(),
        }
    }

    pub fn placeholder(&self) -> TechnicalData {
        TechnicalData::placeholder(&self.display_symbol, Utc::now().timestamp_millis())
    }

    pub fn health(&self) -> HealthResponse {
        let last_cycle = self.pipeline.last_report();
        let status = if last_cycle.is_some() { "ok" } else { "starting" };
        HealthResponse {
            status,
            symbol: self.display_symbol.clone(),
            source: self.pipeline.source_name().to_string(),
            phase: self.pipeline.phase(),
            cycles: self.pipeline.cycles(),
            snapshots_published: self.publisher.published_count(),
            ws_clients: self.ws_clients.load(Ordering::Relaxed),
            uptime_secs: self.start_time.elapsed().as_secs(),
            last_cycle,
            server_time: Utc::now().timestamp_millis(),
        }
    }

    pub fn client_connected(&self) -> usize {
        self.ws_clients.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn client_disconnected(&self) -> usize {
        self.ws_clients.fetch_sub(1, Ordering::Relaxed).saturating_sub(1)
    }

    pub fn record_ws_send(&self) -> u64 {
        self.ws_messages_sent.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::config::AppConfig;
    use crate::market_data::MarketDataSource;
    use crate::pipeline::PipelineSettings;
    use crate::snapshot::SnapshotBuilder;

    /// State wired to `source` with default settings.
    pub fn state_with(source: Arc<dyn MarketDataSource>) -> Arc<AppState> {
        let config = AppConfig::default();
        let publisher = Arc::new(Publisher::default());
        let pipeline = Arc::new(RefreshPipeline::new(
            PipelineSettings::from(&config),
            source,
            SnapshotBuilder::new(config.display_symbol.clone(), config.indicators.clone()),
            Arc::clone(&publisher),
        ));
        Arc::new(AppState::new(config.display_symbol, publisher, pipeline))
    }
}
