// =============================================================================
// Single-Candle Pattern Classifier
// =============================================================================
//
// Deterministic decision tree over the shape of one candle. Let
//   range      = high - low
//   body       = |close - open|
//   body_ratio = body / range
//
// Tiers are evaluated strictly in this order and the first match wins. The
// ranges overlap, so reordering the tiers changes the answers.
//
//   1. degenerate (high == low, non-finite open/close)  -> Invalid Candle
//   2. body_ratio < 0.05                                 -> Doji family
//   3. body_ratio > 0.9                                  -> Marubozu family
//   4. long lower shadow, body in upper 40% of range     -> Hammer / Hanging Man
//   5. long upper shadow, body in lower 40% of range     -> Inverted Hammer / Shooting Star
//   6. body_ratio < 0.3, both shadows > half the body    -> Spinning Top
//   7. fallback by body_ratio: > 0.6 Strong, > 0.3 Moderate, else Weak
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::market_data::Candle;

/// Every label the classifier can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandlePattern {
    InvalidCandle,
    LongLeggedDoji,
    DragonflyDoji,
    GravestoneDoji,
    Doji,
    BullishMarubozu,
    BullishClosingMarubozu,
    BullishOpeningMarubozu,
    BearishMarubozu,
    BearishClosingMarubozu,
    BearishOpeningMarubozu,
    Hammer,
    HangingMan,
    InvertedHammer,
    ShootingStar,
    BullishSpinningTop,
    BearishSpinningTop,
    StrongBullish,
    StrongBearish,
    ModerateBullish,
    ModerateBearish,
    WeakBullish,
    WeakBearish,
}

impl CandlePattern {
    pub const ALL: [CandlePattern; 23] = [
        Self::InvalidCandle,
        Self::LongLeggedDoji,
        Self::DragonflyDoji,
        Self::GravestoneDoji,
        Self::Doji,
        Self::BullishMarubozu,
        Self::BullishClosingMarubozu,
        Self::BullishOpeningMarubozu,
        Self::BearishMarubozu,
        Self::BearishClosingMarubozu,
        Self::BearishOpeningMarubozu,
        Self::Hammer,
        Self::HangingMan,
        Self::InvertedHammer,
        Self::ShootingStar,
        Self::BullishSpinningTop,
        Self::BearishSpinningTop,
        Self::StrongBullish,
        Self::StrongBearish,
        Self::ModerateBullish,
        Self::ModerateBearish,
        Self::WeakBullish,
        Self::WeakBearish,
    ];

    /// Human-readable label used on the wire.
    pub fn label(&self) -> &'static str {
        match self {
            Self::InvalidCandle => "Invalid Candle",
            Self::LongLeggedDoji => "Long-Legged Doji",
            Self::DragonflyDoji => "Dragonfly Doji",
            Self::GravestoneDoji => "Gravestone Doji",
            Self::Doji => "Doji",
            Self::BullishMarubozu => "Bullish Marubozu",
            Self::BullishClosingMarubozu => "Bullish Closing Marubozu",
            Self::BullishOpeningMarubozu => "Bullish Opening Marubozu",
            Self::BearishMarubozu => "Bearish Marubozu",
            Self::BearishClosingMarubozu => "Bearish Closing Marubozu",
            Self::BearishOpeningMarubozu => "Bearish Opening Marubozu",
            Self::Hammer => "Hammer",
            Self::HangingMan => "Hanging Man",
            Self::InvertedHammer => "Inverted Hammer",
            Self::ShootingStar => "Shooting Star",
            Self::BullishSpinningTop => "Bullish Spinning Top",
            Self::BearishSpinningTop => "Bearish Spinning Top",
            Self::StrongBullish => "Strong Bullish",
            Self::StrongBearish => "Strong Bearish",
            Self::ModerateBullish => "Moderate Bullish",
            Self::ModerateBearish => "Moderate Bearish",
            Self::WeakBullish => "Weak Bullish",
            Self::WeakBearish => "Weak Bearish",
        }
    }
}

impl std::fmt::Display for CandlePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for CandlePattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.label() == s)
            .ok_or_else(|| format!("unknown candle pattern '{s}'"))
    }
}

/// Classify a single candle. Total: every input maps to exactly one label.
pub fn classify_candle(candle: &Candle) -> CandlePattern {
    let (open, high, low, close) = (candle.open, candle.high, candle.low, candle.close);

    if high == low || !open.is_finite() || !close.is_finite() {
        return CandlePattern::InvalidCandle;
    }

    let range = candle.range();
    let body = candle.body();
    let upper = candle.upper_shadow();
    let lower = candle.lower_shadow();
    let body_top = open.max(close);
    let body_bottom = open.min(close);
    let body_ratio = body / range;
    let bullish = candle.is_bullish();

    // ── 1. Doji family ──────────────────────────────────────────────────
    if body_ratio < 0.05 {
        if upper > range * 0.4 && lower > range * 0.4 {
            return CandlePattern::LongLeggedDoji;
        }
        if lower > range * 0.6 && upper < range * 0.1 {
            return CandlePattern::DragonflyDoji;
        }
        if upper > range * 0.6 && lower < range * 0.1 {
            return CandlePattern::GravestoneDoji;
        }
        return CandlePattern::Doji;
    }

    // ── 2. Marubozu family (falls through when no variant fits) ─────────
    if body_ratio > 0.9 {
        let both_tiny = upper < range * 0.05 && lower < range * 0.05;
        if bullish {
            if both_tiny {
                return CandlePattern::BullishMarubozu;
            }
            if upper < range * 0.02 {
                return CandlePattern::BullishClosingMarubozu;
            }
            if lower < range * 0.02 {
                return CandlePattern::BullishOpeningMarubozu;
            }
        } else {
            if both_tiny {
                return CandlePattern::BearishMarubozu;
            }
            if lower < range * 0.02 {
                return CandlePattern::BearishClosingMarubozu;
            }
            if upper < range * 0.02 {
                return CandlePattern::BearishOpeningMarubozu;
            }
        }
    }

    // ── 3. Hammer / Hanging Man ─────────────────────────────────────────
    if lower > body * 2.0 && upper < body * 0.5 && body_top > low + range * 0.6 {
        return if bullish {
            CandlePattern::Hammer
        } else {
            CandlePattern::HangingMan
        };
    }

    // ── 4. Inverted Hammer / Shooting Star ──────────────────────────────
    if upper > body * 2.0 && lower < body * 0.5 && body_bottom < low + range * 0.4 {
        return if bullish {
            CandlePattern::InvertedHammer
        } else {
            CandlePattern::ShootingStar
        };
    }

    // ── 5. Spinning Top ─────────────────────────────────────────────────
    if body_ratio < 0.3 && upper > body * 0.5 && lower > body * 0.5 {
        return if bullish {
            CandlePattern::BullishSpinningTop
        } else {
            CandlePattern::BearishSpinningTop
        };
    }

    // ── 6. Basic body-size buckets ──────────────────────────────────────
    match (body_ratio > 0.6, body_ratio > 0.3, bullish) {
        (true, _, true) => CandlePattern::StrongBullish,
        (true, _, false) => CandlePattern::StrongBearish,
        (false, true, true) => CandlePattern::ModerateBullish,
        (false, true, false) => CandlePattern::ModerateBearish,
        (false, false, true) => CandlePattern::WeakBullish,
        (false, false, false) => CandlePattern::WeakBearish,
    }
}
