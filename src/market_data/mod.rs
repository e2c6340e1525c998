pub mod candle_series;
pub mod source;
pub mod synthetic;

// Re-export the Candle struct for convenient access (e.g. `use crate::market_data::Candle`).
pub use candle_series::{Candle, CandleSeries};
pub use source::{FailoverSource, MarketDataSource};
pub use synthetic::SyntheticSource;

/// Length of a Binance-style kline interval ("1m", "15m", "4h", "1d", "1w")
/// in milliseconds. Returns `None` for anything unrecognised.
pub fn interval_millis(interval: &str) -> Option<i64> {
    let (split, _) = interval.char_indices().last()?;
    let (count, unit) = interval.split_at(split);
    let count: i64 = count.parse().ok().filter(|n| *n > 0)?;
    let unit_ms = match unit {
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        "w" => 604_800_000,
        _ => return None,
    };
    Some(count * unit_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_binance_intervals() {
        assert_eq!(interval_millis("1m"), Some(60_000));
        assert_eq!(interval_millis("15m"), Some(900_000));
        assert_eq!(interval_millis("4h"), Some(14_400_000));
        assert_eq!(interval_millis("1d"), Some(86_400_000));
        assert_eq!(interval_millis("1w"), Some(604_800_000));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(interval_millis(""), None);
        assert_eq!(interval_millis("m"), None);
        assert_eq!(interval_millis("0m"), None);
        assert_eq!(interval_millis("15x"), None);
        assert_eq!(interval_millis("-5m"), None);
    }
}
