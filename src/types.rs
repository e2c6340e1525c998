// =============================================================================
// Shared types used across the ta-pulse engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// Where a price sits relative to a reference line (PSAR dot, EMA99, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    Above,
    Below,
}

impl Default for Position {
    fn default() -> Self {
        Self::Below
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Above => write!(f, "Above"),
            Self::Below => write!(f, "Below"),
        }
    }
}

impl std::str::FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Above" => Ok(Self::Above),
            "Below" => Ok(Self::Below),
            other => Err(format!("unknown position '{other}'")),
        }
    }
}

/// Directional bias of a higher-timeframe trend flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendBias {
    Bullish,
    Bearish,
    /// Only used before the first refresh cycle has completed.
    Neutral,
}

impl Default for TrendBias {
    fn default() -> Self {
        Self::Neutral
    }
}

impl std::fmt::Display for TrendBias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "Bullish"),
            Self::Bearish => write!(f, "Bearish"),
            Self::Neutral => write!(f, "Neutral"),
        }
    }
}

impl std::str::FromStr for TrendBias {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Bullish" => Ok(Self::Bullish),
            "Bearish" => Ok(Self::Bearish),
            "Neutral" => Ok(Self::Neutral),
            other => Err(format!("unknown trend '{other}'")),
        }
    }
}
