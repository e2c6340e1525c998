// =============================================================================
// Synthetic market data — fallback when no upstream has ever answered
// =============================================================================
//
// Generates a plausible candle window around a reference price so that the
// dashboard always receives a well-formed snapshot, even on a cold start with
// the network down. Candles are aligned to completed interval boundaries and
// the newest candle closes exactly at the reference price.
// =============================================================================

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use tracing::debug;

use crate::market_data::source::MarketDataSource;
use crate::market_data::{interval_millis, Candle};

/// Average intra-candle volatility of a generated candle (1.5%).
const CANDLE_VOLATILITY: f64 = 0.015;
/// Maximum drift of a candle's base price from the reference (±4%).
const BASE_VARIATION: f64 = 0.08;

/// Generate `count` completed candles ending at the last interval boundary
/// before `now_ms`, oldest first.
///
/// `reference_price` must be finite and positive; the newest candle closes at
/// it.
pub fn generate_candles<R: Rng>(
    rng: &mut R,
    reference_price: f64,
    count: usize,
    interval_ms: i64,
    now_ms: i64,
) -> Vec<Candle> {
    let interval_ms = interval_ms.max(1);
    // The interval in progress at `now_ms` is never emitted.
    let last_close_boundary = now_ms - now_ms.rem_euclid(interval_ms);

    let mut candles = Vec::with_capacity(count);
    for i in 0..count {
        let close_boundary = last_close_boundary - i as i64 * interval_ms;
        let open_time = close_boundary - interval_ms;
        let close_time = close_boundary - 1;

        let variation = (rng.gen::<f64>() - 0.5) * BASE_VARIATION;
        let base = reference_price * (1.0 + variation * (1.0 - i as f64 * 0.01));

        let mut high = base * (1.0 + rng.gen::<f64>() * CANDLE_VOLATILITY);
        let mut low = base * (1.0 - rng.gen::<f64>() * CANDLE_VOLATILITY);
        let open = low + (high - low) * rng.gen::<f64>();

        let close = if i == 0 {
            if reference_price > high {
                high = reference_price * 1.001;
            }
            if reference_price < low {
                low = reference_price * 0.999;
            }
            reference_price
        } else {
            low + (high - low) * rng.gen::<f64>()
        };

        let high = high.max(open).max(close);
        let low = low.min(open).min(close);
        let volume = (30_000.0 + rng.gen::<f64>() * 150_000.0).round();

        candles.push(Candle::new(
            open_time,
            round4(open),
            round4(high),
            round4(low),
            round4(close),
            volume,
            close_time,
        ));
    }

    candles.reverse();
    candles
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// A [`MarketDataSource`] that never touches the network.
///
/// Prices jitter ±2% around `base_price`; candles come from
/// [`generate_candles`].
pub struct SyntheticSource {
    base_price: f64,
}

impl SyntheticSource {
    pub fn new(base_price: f64) -> Self {
        Self { base_price }
    }

    fn jittered_price(&self) -> f64 {
        let jitter = (rand::thread_rng().gen::<f64>() - 0.5) * 0.04;
        self.base_price * (1.0 + jitter)
    }

    fn generate(&self, interval_ms: i64, limit: u32) -> Vec<Candle> {
        generate_candles(
            &mut rand::thread_rng(),
            self.base_price,
            limit as usize,
            interval_ms,
            Utc::now().timestamp_millis(),
        )
    }
}

#[async_trait]
impl MarketDataSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    async fn current_price(&self, _symbol: &str) -> Result<f64> {
        Ok(self.jittered_price())
    }

    async fn recent_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>> {
        let interval_ms = interval_millis(interval)
            .with_context(|| format!("unsupported interval '{interval}'"))?;
        let candles = self.generate(interval_ms, limit);
        debug!(symbol, interval, count = candles.len(), "synthetic candles generated");
        Ok(candles)
    }
}
