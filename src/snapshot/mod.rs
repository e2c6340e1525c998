// =============================================================================
// Snapshot — one immutable, fully-derived view per refresh cycle
// =============================================================================
//
// `SnapshotBuilder::build` is a pure function of its inputs: the candle
// series, the resolved current price, an already-simulated order book and the
// cycle timestamp. It never fails; every indicator that lacks history degrades
// to its documented value and the shortfall is logged at debug.
// =============================================================================

pub mod wire;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::IndicatorParams;
use crate::error::EngineError;
use crate::htf_analysis::{self, HtfTrends};
use crate::indicators::{
    calculate_atr, calculate_bollinger, calculate_ema, calculate_psar, classify_candle,
    BollingerBands, CandlePattern, PsarReading,
};
use crate::market_data::{Candle, CandleSeries};
use crate::order_book::OrderBookSummary;

/// Number of candles in the volume summary and recent-candle view.
pub const RECENT_CANDLES: usize = 5;

// =============================================================================
// Snapshot types
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub ema7: f64,
    pub ema25: f64,
    pub ema99: f64,
    pub atr14: f64,
    pub bollinger: BollingerBands,
    pub psar: PsarReading,
}

/// Pattern label for one recent candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternEvent {
    pub pattern: CandlePattern,
    /// `"HH:MM-HH:MM"`, open to close, UTC.
    pub time_window: String,
    /// `"Mon D"` of the close time, UTC.
    pub date: String,
    /// Close time in epoch milliseconds.
    pub timestamp: i64,
}

/// Volumes of the newest candles, newest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeSummary {
    pub recent: [f64; RECENT_CANDLES],
    pub average: f64,
}

/// Raw view of one recent candle with display labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentCandle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub trade_count: Option<u64>,
    pub open_label: String,
    pub close_label: String,
    pub date: String,
    pub timestamp: i64,
}

impl RecentCandle {
    pub fn time_window(&self) -> String {
        format!("{}-{}", self.open_label, self.close_label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub symbol: String,
    pub current_price: f64,
    pub indicators: IndicatorSet,
    pub volumes: VolumeSummary,
    /// Newest first.
    pub patterns: Vec<PatternEvent>,
    /// Oldest first.
    pub recent_candles: Vec<RecentCandle>,
    pub order_book: OrderBookSummary,
    pub htf_trends: HtfTrends,
    /// Build time in epoch milliseconds.
    pub timestamp: i64,
}

// =============================================================================
// Time labels
// =============================================================================

fn utc(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms)
}

/// `"HH:MM"` in UTC.
pub fn clock_label(ms: i64) -> String {
    utc(ms).map_or_else(|| "--:--".to_string(), |t| t.format("%H:%M").to_string())
}

/// `"Mon D"` in UTC, e.g. `"Oct 19"`.
pub fn date_label(ms: i64) -> String {
    utc(ms).map_or_else(|| "N/A".to_string(), |t| t.format("%b %-d").to_string())
}

// =============================================================================
// SnapshotBuilder
// =============================================================================

#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    symbol: String,
    params: IndicatorParams,
}

impl SnapshotBuilder {
    pub fn new(symbol: impl Into<String>, params: IndicatorParams) -> Self {
        Self {
            symbol: symbol.into(),
            params,
        }
    }

    pub fn build(
        &self,
        series: &CandleSeries,
        current_price: f64,
        order_book: OrderBookSummary,
        timestamp: i64,
    ) -> Snapshot {
        let p = &self.params;
        let closes = series.close_prices();
        self.note_shortfalls(series.len());

        let indicators = IndicatorSet {
            ema7: calculate_ema(&closes, p.ema_fast),
            ema25: calculate_ema(&closes, p.ema_mid),
            ema99: calculate_ema(&closes, p.ema_slow),
            atr14: calculate_atr(series.as_slice(), p.atr_period),
            bollinger: calculate_bollinger(&closes, p.bollinger_period, p.bollinger_std),
            psar: calculate_psar(series.window(p.psar_window), p.psar_af, p.psar_max_af),
        };

        let recent = series.window(RECENT_CANDLES);
        let htf_trends = htf_analysis::analyze(&closes, current_price, &p.htf());

        debug!(
            symbol = %self.symbol,
            candles = series.len(),
            current_price,
            ema7 = format!("{:.4}", indicators.ema7),
            psar = %indicators.psar.position,
            "snapshot built"
        );

        Snapshot {
            symbol: self.symbol.clone(),
            current_price,
            indicators,
            volumes: volume_summary(recent),
            patterns: pattern_events(series.window(p.pattern_count)),
            recent_candles: recent.iter().map(recent_candle).collect(),
            order_book,
            htf_trends,
            timestamp,
        }
    }

    fn note_shortfalls(&self, available: usize) {
        let p = &self.params;
        let requirements = [
            ("ema7", p.ema_fast),
            ("ema25", p.ema_mid),
            ("ema99", p.ema_slow),
            ("atr14", p.atr_period + 1),
            ("bollinger", p.bollinger_period),
            ("psar", 2),
        ];
        for (indicator, required) in requirements {
            if let Err(e) = EngineError::check_history(indicator, required, available) {
                debug!(symbol = %self.symbol, error = %e, "degraded indicator value");
            }
        }
    }
}

/// Pattern events for `candles` (oldest first), returned newest first.
fn pattern_events(candles: &[Candle]) -> Vec<PatternEvent> {
    let mut events: Vec<PatternEvent> = candles
        .iter()
        .map(|c| PatternEvent {
            pattern: classify_candle(c),
            time_window: format!("{}-{}", clock_label(c.open_time), clock_label(c.close_time)),
            date: date_label(c.close_time),
            timestamp: c.close_time,
        })
        .collect();
    events.reverse();
    events
}

fn volume_summary(recent: &[Candle]) -> VolumeSummary {
    let mut volumes = [0.0; RECENT_CANDLES];
    for (slot, candle) in volumes.iter_mut().zip(recent.iter().rev()) {
        *slot = candle.volume;
    }
    let average = if recent.is_empty() {
        0.0
    } else {
        recent.iter().map(|c| c.volume).sum::<f64>() / recent.len() as f64
    };
    VolumeSummary {
        recent: volumes,
        average,
    }
}

fn recent_candle(c: &Candle) -> RecentCandle {
    RecentCandle {
        open: c.open,
        high: c.high,
        low: c.low,
        close: c.close,
        volume: c.volume,
        trade_count: c.trade_count,
        open_label: clock_label(c.open_time),
        close_label: clock_label(c.close_time),
        date: date_label(c.close_time),
        timestamp: c.close_time,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::source::testing::rising_candles;
    use crate::types::{Position, TrendBias};

    // 2026-10-19T12:00:00Z
    const NOON: i64 = 1_792_411_200_000;

    fn builder() -> SnapshotBuilder {
        SnapshotBuilder::new("SOL/USDT", IndicatorParams::default())
    }

    fn series(count: usize) -> CandleSeries {
        CandleSeries::try_from_batch(150, rising_candles(count, 100.0)).unwrap()
    }

    #[test]
    fn labels_are_utc() {
        assert_eq!(clock_label(NOON), "12:00");
        assert_eq!(clock_label(NOON + 15 * 60_000 - 1), "12:14");
        assert_eq!(date_label(NOON), "Oct 19");
        assert_eq!(date_label(1_788_220_800_000), "Sep 1");
    }

    #[test]
    fn full_series_builds_every_field() {
        let s = series(150);
        let snap = builder().build(&s, 260.0, OrderBookSummary::default(), 42);

        assert_eq!(snap.symbol, "SOL/USDT");
        assert_eq!(snap.timestamp, 42);
        assert_eq!(snap.current_price, 260.0);
        assert_eq!(snap.patterns.len(), 5);
        assert_eq!(snap.recent_candles.len(), 5);
        assert!(snap.indicators.ema7 > snap.indicators.ema25);
        assert!(snap.indicators.ema25 > snap.indicators.ema99);
        assert!(snap.indicators.atr14 > 0.0);
        assert!(snap.indicators.bollinger.upper > snap.indicators.bollinger.lower);
        assert_eq!(snap.indicators.psar.position, Position::Below);
        assert_eq!(snap.htf_trends.h1_trend, TrendBias::Bullish);
    }

    #[test]
    fn patterns_are_newest_first_and_volumes_too() {
        let mut candles = rising_candles(10, 100.0);
        for (i, c) in candles.iter_mut().enumerate() {
            c.volume = 1000.0 * (i + 1) as f64;
        }
        let s = CandleSeries::try_from_batch(150, candles.clone()).unwrap();
        let snap = builder().build(&s, 110.0, OrderBookSummary::default(), 0);

        let newest = candles.last().unwrap();
        assert_eq!(snap.patterns[0].timestamp, newest.close_time);
        assert!(snap.patterns.windows(2).all(|w| w[0].timestamp > w[1].timestamp));

        assert_eq!(snap.volumes.recent, [10_000.0, 9_000.0, 8_000.0, 7_000.0, 6_000.0]);
        assert!((snap.volumes.average - 8_000.0).abs() < 1e-9);

        // Recent candles stay oldest first.
        assert_eq!(snap.recent_candles[4].timestamp, newest.close_time);
    }

    #[test]
    fn pattern_event_labels_follow_the_candle() {
        let s = series(3);
        let snap = builder().build(&s, 100.0, OrderBookSummary::default(), 0);
        let newest = s.last().unwrap();
        let event = &snap.patterns[0];
        assert_eq!(
            event.time_window,
            format!("{}-{}", clock_label(newest.open_time), clock_label(newest.close_time))
        );
        assert_eq!(event.date, date_label(newest.close_time));
        assert_eq!(event.pattern, classify_candle(newest));
    }

    #[test]
    fn short_series_degrades_without_failing() {
        let s = series(3);
        let snap = builder().build(&s, 103.0, OrderBookSummary::default(), 0);

        let last_close = s.last().unwrap().close;
        assert_eq!(snap.indicators.ema7, last_close);
        assert_eq!(snap.indicators.ema99, last_close);
        assert_eq!(snap.indicators.atr14, 0.0);
        assert_eq!(snap.indicators.bollinger, BollingerBands::default());
        assert_eq!(snap.patterns.len(), 3);
        assert_eq!(snap.volumes.recent[3], 0.0);
        assert_eq!(snap.volumes.recent[4], 0.0);
        assert!((snap.volumes.average - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn empty_series_still_builds() {
        let s = CandleSeries::new(150);
        let snap = builder().build(&s, 245.86, OrderBookSummary::default(), 0);
        assert_eq!(snap.indicators, IndicatorSet::default());
        assert!(snap.patterns.is_empty());
        assert!(snap.recent_candles.is_empty());
        assert_eq!(snap.volumes.average, 0.0);
        // EMA of nothing is 0, so any positive price reads above it.
        assert_eq!(snap.htf_trends.h1_trend, TrendBias::Bullish);
    }

    #[test]
    fn psar_only_sees_its_window() {
        // Crash early in the series, long steady rally afterwards: the
        // 50-candle window never sees the crash.
        let mut candles = rising_candles(120, 100.0);
        candles[5].low = 1.0;
        let s = CandleSeries::try_from_batch(150, candles).unwrap();
        let windowed = builder().build(&s, 300.0, OrderBookSummary::default(), 0);
        let direct = calculate_psar(s.window(50), 0.02, 0.2);
        assert_eq!(windowed.indicators.psar, direct);
    }
}
