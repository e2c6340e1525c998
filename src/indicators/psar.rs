// =============================================================================
// Parabolic SAR — stop-and-reverse trend tracker
// =============================================================================
//
// State: sar, is_uptrend, acceleration, extreme_point.
//
//   init (first two candles):
//     sar           = c0.low
//     is_uptrend    = c1.close > c0.close
//     extreme_point = is_uptrend ? c0.high : c0.low
//     acceleration  = af
//
//   step (every candle from index 1):
//     sar += acceleration * (extreme_point - sar)
//     uptrend:   new high  -> extreme_point = high, acceleration += af (cap max_af)
//                low < sar -> flip down: sar = extreme_point, acceleration = af,
//                             extreme_point = low
//     downtrend: mirror image on lows / highs
//
// The tracker is rebuilt from scratch over a trailing window every refresh
// cycle; no state survives between cycles.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::market_data::Candle;
use crate::types::Position;

/// Default acceleration step.
pub const DEFAULT_AF: f64 = 0.02;
/// Default acceleration ceiling.
pub const DEFAULT_MAX_AF: f64 = 0.2;

/// Final SAR level and where it sits relative to the last close.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PsarReading {
    pub value: f64,
    pub position: Position,
}

/// Incremental SAR state machine.
#[derive(Debug, Clone)]
pub struct ParabolicSar {
    sar: f64,
    is_uptrend: bool,
    acceleration: f64,
    extreme_point: f64,
    af: f64,
    max_af: f64,
}

impl ParabolicSar {
    /// Seed the tracker from the first two candles of a window.
    pub fn seed(first: &Candle, second: &Candle, af: f64, max_af: f64) -> Self {
        let is_uptrend = second.close > first.close;
        Self {
            sar: first.low,
            is_uptrend,
            acceleration: af,
            extreme_point: if is_uptrend { first.high } else { first.low },
            af,
            max_af,
        }
    }

    /// Advance by one candle.
    pub fn step(&mut self, candle: &Candle) {
        self.sar += self.acceleration * (self.extreme_point - self.sar);

        if self.is_uptrend {
            if candle.high > self.extreme_point {
                self.extreme_point = candle.high;
                self.acceleration = (self.acceleration + self.af).min(self.max_af);
            }
            if candle.low < self.sar {
                self.is_uptrend = false;
                self.sar = self.extreme_point;
                self.acceleration = self.af;
                self.extreme_point = candle.low;
            }
        } else {
            if candle.low < self.extreme_point {
                self.extreme_point = candle.low;
                self.acceleration = (self.acceleration + self.af).min(self.max_af);
            }
            if candle.high > self.sar {
                self.is_uptrend = true;
                self.sar = self.extreme_point;
                self.acceleration = self.af;
                self.extreme_point = candle.high;
            }
        }
    }

    pub fn sar(&self) -> f64 {
        self.sar
    }

    pub fn is_uptrend(&self) -> bool {
        self.is_uptrend
    }

    pub fn acceleration(&self) -> f64 {
        self.acceleration
    }

    pub fn extreme_point(&self) -> f64 {
        self.extreme_point
    }
}

/// Run the SAR over the whole of `candles` and report the final level.
///
/// # Degraded output
/// Fewer than two candles: `value` is the first candle's low (or `0.0` when
/// empty) and `position` is `Below`.
pub fn calculate_psar(candles: &[Candle], af: f64, max_af: f64) -> PsarReading {
    let (first, second, last) = match candles {
        [first, second, .., last] => (first, second, last),
        [first, second] => (first, second, second),
        _ => {
            return PsarReading {
                value: candles.first().map_or(0.0, |c| c.low),
                position: Position::Below,
            }
        }
    };

    let mut tracker = ParabolicSar::seed(first, second, af, max_af);
    for candle in &candles[1..] {
        tracker.step(candle);
    }

    let position = if tracker.sar() < last.close {
        Position::Below
    } else {
        Position::Above
    };

    PsarReading {
        value: tracker.sar(),
        position,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn candle(high: f64, low: f64, close: f64) -> Candle {
        Candle::new(0, close, high, low, close, 1.0, 1)
    }

    fn uptrend(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let base = 100.0 + i as f64 * 2.0;
                candle(base + 1.0, base - 1.0, base + 0.5)
            })
            .collect()
    }

    #[test]
    fn psar_empty_and_single() {
        let empty = calculate_psar(&[], DEFAULT_AF, DEFAULT_MAX_AF);
        assert_eq!(empty.value, 0.0);
        assert_eq!(empty.position, Position::Below);

        let single = calculate_psar(&[candle(12.0, 9.0, 10.0)], DEFAULT_AF, DEFAULT_MAX_AF);
        assert_eq!(single.value, 9.0);
        assert_eq!(single.position, Position::Below);
    }

    #[test]
    fn psar_stays_below_an_unbroken_uptrend() {
        let candles = uptrend(50);
        let mut tracker = ParabolicSar::seed(&candles[0], &candles[1], DEFAULT_AF, DEFAULT_MAX_AF);
        for c in &candles[1..] {
            tracker.step(c);
            assert!(tracker.is_uptrend(), "no reversal expected in a clean uptrend");
            assert!(tracker.sar() < c.low);
        }

        let reading = calculate_psar(&candles, DEFAULT_AF, DEFAULT_MAX_AF);
        assert_eq!(reading.position, Position::Below);
        assert!((reading.value - tracker.sar()).abs() < 1e-12);
    }

    #[test]
    fn acceleration_is_capped() {
        let candles = uptrend(60);
        let mut tracker = ParabolicSar::seed(&candles[0], &candles[1], DEFAULT_AF, DEFAULT_MAX_AF);
        for c in &candles[1..] {
            tracker.step(c);
            assert!(tracker.acceleration() <= DEFAULT_MAX_AF + 1e-12);
        }
        assert!((tracker.acceleration() - DEFAULT_MAX_AF).abs() < 1e-12);
    }

    #[test]
    fn low_breach_flips_within_the_same_step() {
        let candles = uptrend(10);
        let mut tracker = ParabolicSar::seed(&candles[0], &candles[1], DEFAULT_AF, DEFAULT_MAX_AF);
        for c in &candles[1..] {
            tracker.step(c);
        }
        assert!(tracker.is_uptrend());
        let ep_before = tracker.extreme_point();

        // Crash well below the current SAR.
        let crash = candle(ep_before - 5.0, 50.0, 55.0);
        tracker.step(&crash);

        assert!(!tracker.is_uptrend());
        assert_eq!(tracker.sar(), ep_before);
        assert_eq!(tracker.extreme_point(), 50.0);
        assert_eq!(tracker.acceleration(), DEFAULT_AF);
    }

    #[test]
    fn downtrend_reports_above() {
        let candles: Vec<Candle> = (0..40)
            .map(|i| {
                let base = 200.0 - i as f64 * 2.0;
                candle(base + 1.0, base - 1.0, base - 0.5)
            })
            .collect();
        let reading = calculate_psar(&candles, DEFAULT_AF, DEFAULT_MAX_AF);
        assert_eq!(reading.position, Position::Above);
        assert!(reading.value > candles.last().unwrap().close);
    }

    #[test]
    fn two_candles_is_enough() {
        let candles = [candle(11.0, 9.0, 10.0), candle(13.0, 10.5, 12.5)];
        let reading = calculate_psar(&candles, DEFAULT_AF, DEFAULT_MAX_AF);
        // seed sar = 9, ep = 11 -> 9 + 0.02 * 2 = 9.04; new high 13 bumps af only.
        assert!((reading.value - 9.04).abs() < 1e-12);
        assert_eq!(reading.position, Position::Below);
    }
}
