// =============================================================================
// Higher Time Frame (HTF) Trend Flags
// =============================================================================
//
// Approximates the 1H and 4H trend without resampling the series: with 15M
// candles, 240 closes cover roughly the span an EMA99 would see on the 1H
// chart and 960 closes the span for 4H. Each flag compares the current price
// with an EMA(99) over that trailing window.
//
// Decision rule (per timeframe):
//   price >  EMA99(window)  -> Bullish / Above
//   price <= EMA99(window)  -> Bearish / Below
//
// A series shorter than the window uses every close available, and a series
// shorter than 99 closes degrades to the EMA fallback (last close).
//
// The series never holds more than `candle_limit` closes. Unless
// `candle_limit >= h4_window`, the H4 window is clipped to the same closes as
// the H1 window, and with the defaults (150 vs 240/960) both flags are
// computed over identical data and always agree.
// =============================================================================

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::indicators::ema::calculate_ema;
use crate::types::{Position, TrendBias};

/// Window lengths and EMA period for the two flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtfParams {
    pub ema_period: usize,
    pub h1_window: usize,
    pub h4_window: usize,
}

impl Default for HtfParams {
    fn default() -> Self {
        Self {
            ema_period: 99,
            h1_window: 240,
            h4_window: 960,
        }
    }
}

/// Trend flags for the two higher timeframes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtfTrends {
    pub h1_trend: TrendBias,
    pub h1_position: Position,
    pub h4_trend: TrendBias,
    pub h4_position: Position,
}

impl HtfTrends {
    /// Pre-first-cycle value: no opinion on either timeframe.
    pub fn neutral() -> Self {
        Self {
            h1_trend: TrendBias::Neutral,
            h1_position: Position::Below,
            h4_trend: TrendBias::Neutral,
            h4_position: Position::Below,
        }
    }
}

/// Trend flag for one trailing window of `closes`.
fn flag(closes: &[f64], window: usize, ema_period: usize, price: f64) -> (TrendBias, Position, f64) {
    let start = closes.len().saturating_sub(window);
    let ema = calculate_ema(&closes[start..], ema_period);
    if price > ema {
        (TrendBias::Bullish, Position::Above, ema)
    } else {
        (TrendBias::Bearish, Position::Below, ema)
    }
}

/// Derive the 1H / 4H flags for `current_price` from the close history.
pub fn analyze(closes: &[f64], current_price: f64, params: &HtfParams) -> HtfTrends {
    let (h1_trend, h1_position, h1_ema) =
        flag(closes, params.h1_window, params.ema_period, current_price);
    let (h4_trend, h4_position, h4_ema) =
        flag(closes, params.h4_window, params.ema_period, current_price);

    debug!(
        closes = closes.len(),
        current_price,
        h1_ema = format!("{:.4}", h1_ema),
        h4_ema = format!("{:.4}", h4_ema),
        h1 = %h1_trend,
        h4 = %h4_trend,
        "HTF analysis complete"
    );

    HtfTrends {
        h1_trend,
        h1_position,
        h4_trend,
        h4_position,
    }
}
