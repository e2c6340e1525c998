// =============================================================================
// Average True Range (ATR) — simple average of recent true ranges
// =============================================================================
//
// ATR measures market volatility by decomposing the entire range of a bar.
//
// True Range (TR) for each bar:
//   TR = max(H - L, |H - prevClose|, |L - prevClose|)
//
// ATR is the plain arithmetic mean of the last `period` TR values (no Wilder
// smoothing), so the reading only depends on the trailing `period + 1` bars.
//
// Default period: 14
// =============================================================================

use crate::market_data::Candle;

/// True range of `current` relative to the close of `previous`.
pub fn true_range(current: &Candle, previous: &Candle) -> f64 {
    let hl = current.high - current.low;
    let hc = (current.high - previous.close).abs();
    let lc = (current.low - previous.close).abs();
    hl.max(hc).max(lc)
}

/// Compute the ATR over the last `period` true ranges.
///
/// # Degraded output
/// Returns `0.0` when `period` is zero or there are fewer than `period + 1`
/// candles (every TR needs a previous close).
pub fn calculate_atr(candles: &[Candle], period: usize) -> f64 {
    if period == 0 || candles.len() < period + 1 {
        return 0.0;
    }

    let recent = &candles[candles.len() - (period + 1)..];
    let sum: f64 = recent
        .windows(2)
        .map(|pair| true_range(&pair[1], &pair[0]))
        .sum();

    sum / period as f64
}
