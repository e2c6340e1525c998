// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula:
//   multiplier = 2 / (period + 1)
//   EMA_t      = close_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// The very first EMA value is seeded with the SMA of the first `period` closes.
// =============================================================================

/// Compute the latest EMA value of `closes` for the look-back `period`.
///
/// # Degraded output
/// When there is not enough history (`closes.len() < period`, or
/// `period == 0`) the last available close is returned, or `0.0` for an empty
/// slice. Callers always get a defined number back.
pub fn calculate_ema(closes: &[f64], period: usize) -> f64 {
    if period == 0 || closes.len() < period {
        return closes.last().copied().unwrap_or(0.0);
    }

    let multiplier = 2.0 / (period + 1) as f64;

    // Seed: SMA of the first `period` values.
    let mut ema = closes[..period].iter().sum::<f64>() / period as f64;

    for &close in &closes[period..] {
        ema = close * multiplier + ema * (1.0 - multiplier);
    }

    ema
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: build a simple ascending price series.
    fn ascending(n: usize) -> Vec<f64> {
        (1..=n).map(|i| i as f64).collect()
    }

    #[test]
    fn ema_empty_input() {
        assert_eq!(calculate_ema(&[], 5), 0.0);
    }

    #[test]
    fn ema_insufficient_data_returns_last_price() {
        assert_eq!(calculate_ema(&[1.0, 2.0], 5), 2.0);
    }

    #[test]
    fn ema_period_zero_returns_last_price() {
        assert_eq!(calculate_ema(&[1.0, 2.0, 3.0], 0), 3.0);
    }

    #[test]
    fn ema_period_equals_length() {
        // Should be the SMA = (2+4+6)/3 = 4.0
        let ema = calculate_ema(&[2.0, 4.0, 6.0], 3);
        assert!((ema - 4.0).abs() < 1e-10);
    }

    #[test]
    fn ema_known_values() {
        // 5-period EMA of [1..=10]
        // SMA of first 5 = 3.0, multiplier = 2/6 = 1/3
        let closes = ascending(10);
        let mult = 2.0 / 6.0;
        let mut expected = 3.0;
        for &c in &closes[5..] {
            expected = c * mult + expected * (1.0 - mult);
        }
        let ema = calculate_ema(&closes, 5);
        assert!((ema - expected).abs() < 1e-10, "got {ema}, expected {expected}");
    }

    #[test]
    fn ema_lags_a_rising_series() {
        let closes = ascending(200);
        let fast = calculate_ema(&closes, 7);
        let slow = calculate_ema(&closes, 99);
        assert!(fast > slow);
        assert!(fast < 200.0);
    }

    #[test]
    fn ema_flat_series_is_flat() {
        let closes = vec![100.0; 150];
        assert!((calculate_ema(&closes, 25) - 100.0).abs() < 1e-10);
    }
}
