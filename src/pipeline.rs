// =============================================================================
// Refresh Pipeline — fetch, rebuild and republish one snapshot per tick
// =============================================================================
//
// Phases:  Idle -> Fetching -> Building -> Publishing -> Idle
//
// A fixed-interval timer spawns one cycle per tick. The candle series and the
// last known price live behind a `tokio::sync::Mutex` that doubles as the
// single-flight guard: a tick that finds the lock held is coalesced
// (`CycleOutcome::Skipped`), never queued.
//
// Price resolution:    live -> last live price -> last candle close -> fallback
// Candle resolution:   valid live batch -> previous series -> synthetic series
//
// Every cycle publishes, so subscribers always get a well-formed snapshot
// even while every upstream is down.
// =============================================================================

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::EngineError;
use crate::market_data::synthetic::generate_candles;
use crate::market_data::{interval_millis, CandleSeries, MarketDataSource};
use crate::order_book;
use crate::publisher::Publisher;
use crate::snapshot::SnapshotBuilder;

/// Interval assumed when the configured one cannot be parsed (15m).
const DEFAULT_INTERVAL_MS: i64 = 900_000;

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    Fetching,
    Building,
    Publishing,
}

/// Where the published price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PriceSource {
    Live,
    LastKnown,
    LastClose,
    Fallback,
}

/// Where the candle series used for the snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CandleSource {
    Live,
    Retained,
    Synthetic,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub price: f64,
    pub price_source: PriceSource,
    pub candle_source: CandleSource,
    pub candles: usize,
    pub upstream_errors: Vec<String>,
    pub duration_ms: u64,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Published(CycleReport),
    /// Another cycle held the pipeline; this tick was dropped.
    Skipped,
}

/// Pipeline knobs, lifted out of [`AppConfig`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub symbol: String,
    pub interval: String,
    pub candle_limit: u32,
    pub refresh_every: Duration,
    /// Bound on one fetch through the whole source chain. Each source inside
    /// the chain has its own per-call timeout.
    pub fetch_timeout: Duration,
    pub fallback_price: f64,
    pub order_book_levels: usize,
}

impl From<&AppConfig> for PipelineSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            symbol: config.symbol.clone(),
            interval: config.interval.clone(),
            candle_limit: config.candle_limit.max(1),
            refresh_every: config.refresh_interval(),
            fetch_timeout: config.fetch_timeout() * config.sources.len().max(1) as u32,
            fallback_price: config.fallback_price,
            order_book_levels: config.order_book_levels,
        }
    }
}

struct PipelineState {
    series: CandleSeries,
    last_price: Option<f64>,
    rng: StdRng,
}

// =============================================================================
// RefreshPipeline
// =============================================================================

pub struct RefreshPipeline {
    settings: PipelineSettings,
    source: Arc<dyn MarketDataSource>,
    builder: SnapshotBuilder,
    publisher: Arc<Publisher>,
    state: Mutex<PipelineState>,
    phase: RwLock<Phase>,
    cycles: AtomicU64,
    last_report: RwLock<Option<CycleReport>>,
}

impl RefreshPipeline {
    pub fn new(
        settings: PipelineSettings,
        source: Arc<dyn MarketDataSource>,
        builder: SnapshotBuilder,
        publisher: Arc<Publisher>,
    ) -> Self {
        let capacity = settings.candle_limit as usize;
        Self {
            settings,
            source,
            builder,
            publisher,
            state: Mutex::new(PipelineState {
                series: CandleSeries::new(capacity),
                last_price: None,
                rng: StdRng::from_entropy(),
            }),
            phase: RwLock::new(Phase::Idle),
            cycles: AtomicU64::new(0),
            last_report: RwLock::new(None),
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.read()
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn last_report(&self) -> Option<CycleReport> {
        self.last_report.read().clone()
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    fn set_phase(&self, phase: Phase) {
        *self.phase.write() = phase;
    }

    /// Drive the pipeline from a fixed-interval timer. The first tick fires
    /// immediately; ticks missed while the runtime was busy are skipped.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(pipeline.settings.refresh_every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(
                every_secs = pipeline.settings.refresh_every.as_secs(),
                source = pipeline.source_name(),
                "refresh pipeline started"
            );
            loop {
                ticker.tick().await;
                let cycle = Arc::clone(&pipeline);
                tokio::spawn(async move {
                    if cycle.run_cycle().await == CycleOutcome::Skipped {
                        info!("previous refresh cycle still running, tick coalesced");
                    }
                });
            }
        })
    }

    /// Run one full cycle unless another one is in flight.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let Ok(mut state) = self.state.try_lock() else {
            return CycleOutcome::Skipped;
        };
        let started = Instant::now();
        let s = &self.settings;
        let mut upstream_errors = Vec::new();

        // ── Fetching ────────────────────────────────────────────────────
        self.set_phase(Phase::Fetching);
        let (price_res, candle_res) = tokio::join!(
            self.bounded(self.source.current_price(&s.symbol)),
            self.bounded(self.source.recent_candles(&s.symbol, &s.interval, s.candle_limit)),
        );

        let mut candle_source = match candle_res.and_then(|batch| {
            if batch.is_empty() {
                return Err(EngineError::upstream(self.source.name(), "empty candle batch"));
            }
            CandleSeries::try_from_batch(s.candle_limit as usize, batch)
        }) {
            Ok(series) => {
                state.series = series;
                CandleSource::Live
            }
            Err(e) => {
                warn!(error = %e, kept = state.series.len(), "candle refresh failed, keeping previous series");
                upstream_errors.push(e.to_string());
                CandleSource::Retained
            }
        };

        let (price, price_source) = match price_res.and_then(|p| {
            if p.is_finite() && p > 0.0 {
                Ok(p)
            } else {
                Err(EngineError::DataIntegrity(format!("unusable price {p}")))
            }
        }) {
            Ok(p) => {
                state.last_price = Some(p);
                (p, PriceSource::Live)
            }
            Err(e) => {
                upstream_errors.push(e.to_string());
                let resolved = match (state.last_price, state.series.last()) {
                    (Some(p), _) => (p, PriceSource::LastKnown),
                    (None, Some(c)) => (c.close, PriceSource::LastClose),
                    (None, None) => (s.fallback_price, PriceSource::Fallback),
                };
                warn!(error = %e, price = resolved.0, via = ?resolved.1, "price fetch failed, using fallback");
                resolved
            }
        };

        if state.series.is_empty() {
            let interval_ms = interval_millis(&s.interval).unwrap_or(DEFAULT_INTERVAL_MS);
            let batch = generate_candles(
                &mut state.rng,
                price,
                s.candle_limit as usize,
                interval_ms,
                Utc::now().timestamp_millis(),
            );
            match CandleSeries::try_from_batch(s.candle_limit as usize, batch) {
                Ok(series) => {
                    info!(count = series.len(), price, "no candle history, using synthetic series");
                    state.series = series;
                    candle_source = CandleSource::Synthetic;
                }
                Err(e) => warn!(error = %e, "synthetic series rejected"),
            }
        }

        // ── Building ────────────────────────────────────────────────────
        self.set_phase(Phase::Building);
        let book = order_book::simulate(&mut state.rng, price, s.order_book_levels);
        let snapshot = self
            .builder
            .build(&state.series, price, book, Utc::now().timestamp_millis());
        let candles = state.series.len();
        drop(state);

        // ── Publishing ──────────────────────────────────────────────────
        self.set_phase(Phase::Publishing);
        let psar = snapshot.indicators.psar.position;
        self.publisher.publish(Arc::new(snapshot));

        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        let report = CycleReport {
            cycle,
            price,
            price_source,
            candle_source,
            candles,
            upstream_errors,
            duration_ms: started.elapsed().as_millis() as u64,
            completed_at: Utc::now(),
        };
        *self.last_report.write() = Some(report.clone());
        self.set_phase(Phase::Idle);

        info!(
            cycle,
            price = format!("{:.4}", price),
            price_source = ?price_source,
            candle_source = ?candle_source,
            candles,
            psar = %psar,
            duration_ms = report.duration_ms,
            "refresh cycle published"
        );

        CycleOutcome::Published(report)
    }

    /// Run an upstream call under the fetch timeout, mapping every failure to
    /// [`EngineError::UpstreamUnavailable`].
    async fn bounded<T>(
        &self,
        call: impl Future<Output = anyhow::Result<T>>,
    ) -> Result<T, EngineError> {
        let limit = self.settings.fetch_timeout;
        match tokio::time::timeout(limit, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(EngineError::upstream(self.source.name(), format!("{e:#}"))),
            Err(_) => {
                debug!(source = self.source.name(), ?limit, "upstream call timed out");
                Err(EngineError::upstream(
                    self.source.name(),
                    format!("timed out after {}s", limit.as_secs_f64()),
                ))
            }
        }
    }
}
