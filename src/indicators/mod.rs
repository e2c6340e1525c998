// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators published in every
// snapshot. None of them fail: short history degrades to a documented value
// (last close, zero band, first low) so a snapshot can always be assembled.

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod patterns;
pub mod psar;

pub use atr::calculate_atr;
pub use bollinger::{calculate_bollinger, BollingerBands};
pub use ema::calculate_ema;
pub use patterns::{classify_candle, CandlePattern};
pub use psar::{calculate_psar, PsarReading};
