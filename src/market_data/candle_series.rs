use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLCV candle for one fixed interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub close_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default)]
    pub trade_count: Option<u64>,
}

impl Candle {
    /// Argument order follows the Binance kline row layout.
    pub fn new(
        open_time: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        close_time: i64,
    ) -> Self {
        Self {
            open_time,
            close_time,
            open,
            high,
            low,
            close,
            volume,
            trade_count: None,
        }
    }

    pub fn with_trade_count(mut self, trades: u64) -> Self {
        self.trade_count = Some(trades);
        self
    }

    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn upper_shadow(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    pub fn lower_shadow(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Check the OHLC envelope and time ordering of a single candle.
    ///
    /// Requires finite prices and volume, `low <= min(open, close)`,
    /// `max(open, close) <= high` and `open_time < close_time`.
    pub fn validate(&self) -> Result<(), EngineError> {
        let fields = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(EngineError::DataIntegrity(format!(
                    "candle closing at {} has non-finite {name}",
                    self.close_time
                )));
            }
        }

        let body_low = self.open.min(self.close);
        let body_high = self.open.max(self.close);
        if self.low > body_low || body_high > self.high {
            return Err(EngineError::DataIntegrity(format!(
                "candle closing at {} breaks OHLC envelope (o={} h={} l={} c={})",
                self.close_time, self.open, self.high, self.low, self.close
            )));
        }

        if self.open_time >= self.close_time {
            return Err(EngineError::DataIntegrity(format!(
                "candle open_time {} is not before close_time {}",
                self.open_time, self.close_time
            )));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CandleSeries -- bounded FIFO window for one (symbol, interval)
// ---------------------------------------------------------------------------

/// Append-only window of the most recent candles, strictly increasing by
/// `close_time`. Once `capacity` is reached the oldest candle is evicted.
///
/// Owned by the refresh pipeline; everything downstream reads borrowed
/// slices through [`window`](Self::window) and [`close_prices`](Self::close_prices).
#[derive(Debug, Clone)]
pub struct CandleSeries {
    candles: VecDeque<Candle>,
    capacity: usize,
}

impl CandleSeries {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            candles: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Build a series from a whole upstream batch. The first invalid or
    /// out-of-order candle rejects the entire batch.
    pub fn try_from_batch(
        capacity: usize,
        batch: impl IntoIterator<Item = Candle>,
    ) -> Result<Self, EngineError> {
        let mut series = Self::new(capacity);
        for candle in batch {
            series.append(candle)?;
        }
        Ok(series)
    }

    /// Append a candle, evicting the oldest one when over capacity.
    pub fn append(&mut self, candle: Candle) -> Result<(), EngineError> {
        candle.validate()?;

        if let Some(last) = self.candles.back() {
            if candle.close_time <= last.close_time {
                return Err(EngineError::DataIntegrity(format!(
                    "out-of-order candle: close_time {} does not follow {}",
                    candle.close_time, last.close_time
                )));
            }
        }

        self.candles.push_back(candle);
        while self.candles.len() > self.capacity {
            self.candles.pop_front();
        }
        // Keep the storage contiguous so `window` can hand out a plain slice.
        self.candles.make_contiguous();
        Ok(())
    }

    /// The most recent `last_n` candles, oldest first.
    pub fn window(&self, last_n: usize) -> &[Candle] {
        let (all, _) = self.candles.as_slices();
        let start = all.len().saturating_sub(last_n);
        &all[start..]
    }

    /// Every candle in the series, oldest first.
    pub fn as_slice(&self) -> &[Candle] {
        self.window(self.candles.len())
    }

    /// Close prices, oldest first.
    pub fn close_prices(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.back()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
