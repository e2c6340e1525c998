// =============================================================================
// Wire schema — the JSON shape served on the pull and push surfaces
// =============================================================================
//
// Numbers go out as fixed-precision strings so dashboards render them without
// float noise:
//   prices, indicators      4 dp
//   volumes                 "<v / 1000, 1 dp>k"
//   order book sizes        1 dp, totals 2 dp, ratio 3 dp
//
// Before the first refresh cycle completes, `TechnicalData::placeholder`
// is served: zeros everywhere, PSAR "Below", HTF "Neutral".
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::htf_analysis::HtfTrends;
use crate::order_book::{BookLevel, OrderBookSummary};
use crate::snapshot::{RecentCandle, Snapshot};
use crate::types::Position;

fn price(v: f64) -> String {
    format!("{v:.4}")
}

fn kilo(v: f64) -> String {
    format!("{:.1}k", v / 1000.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalData {
    pub current_price: String,
    pub last5_candles: Last5Candles,
    pub ema7: String,
    pub ema25: String,
    pub ema99: String,
    pub atr14: String,
    pub bb_upper: String,
    pub bb_middle: String,
    pub bb_lower: String,
    pub psar_value: String,
    pub psar_position: String,
    pub volumes: WireVolumes,
    pub candle_patterns: Vec<WirePattern>,
    pub order_book: WireOrderBook,
    pub htf_trends: WireHtfTrends,
    pub timestamp: i64,
    pub symbol: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Last5Candles {
    pub ohlc: Vec<WireCandle>,
    /// `"Mon D HH:MM"` of each close.
    pub timestamps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireCandle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub open_time: String,
    pub close_time: String,
    pub time_window: String,
    pub date: String,
    pub volume: String,
    pub trades: Option<u64>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireVolumes {
    pub v1: String,
    pub v2: String,
    pub v3: String,
    pub v4: String,
    pub v5: String,
    pub average_volume: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePattern {
    pub pattern: String,
    pub timestamp: i64,
    pub time_window: String,
    pub date: String,
}

/// A wall is reported as its price and notional (`size` carries the total).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireWall {
    pub price: String,
    pub size: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireLevel {
    pub price: String,
    pub size: String,
    pub total: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireOrderBook {
    pub biggest_buy_wall: WireWall,
    pub biggest_sell_wall: WireWall,
    pub buy_to_sell_ratio: String,
    pub top10_bids: Vec<WireLevel>,
    pub top10_asks: Vec<WireLevel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireHtfTrends {
    pub h1_trend: String,
    pub h1_position: String,
    pub h4_trend: String,
    pub h4_position: String,
}

// =============================================================================
// Conversions
// =============================================================================

impl From<&BookLevel> for WireLevel {
    fn from(level: &BookLevel) -> Self {
        Self {
            price: price(level.price),
            size: format!("{:.1}", level.size),
            total: format!("{:.2}", level.total),
        }
    }
}

fn wall(level: &BookLevel) -> WireWall {
    WireWall {
        price: price(level.price),
        size: format!("{:.2}", level.total),
    }
}

impl From<&OrderBookSummary> for WireOrderBook {
    fn from(book: &OrderBookSummary) -> Self {
        Self {
            biggest_buy_wall: wall(&book.biggest_buy_wall),
            biggest_sell_wall: wall(&book.biggest_sell_wall),
            buy_to_sell_ratio: format!("{:.3}", book.buy_to_sell_ratio),
            top10_bids: book.bids.iter().map(WireLevel::from).collect(),
            top10_asks: book.asks.iter().map(WireLevel::from).collect(),
        }
    }
}

impl From<&HtfTrends> for WireHtfTrends {
    fn from(trends: &HtfTrends) -> Self {
        Self {
            h1_trend: trends.h1_trend.to_string(),
            h1_position: trends.h1_position.to_string(),
            h4_trend: trends.h4_trend.to_string(),
            h4_position: trends.h4_position.to_string(),
        }
    }
}

impl From<&RecentCandle> for WireCandle {
    fn from(c: &RecentCandle) -> Self {
        Self {
            open: c.open,
            high: c.high,
            low: c.low,
            close: c.close,
            open_time: c.open_label.clone(),
            close_time: c.close_label.clone(),
            time_window: c.time_window(),
            date: c.date.clone(),
            volume: kilo(c.volume),
            trades: c.trade_count,
            timestamp: c.timestamp,
        }
    }
}

impl From<&Snapshot> for TechnicalData {
    fn from(snap: &Snapshot) -> Self {
        let ind = &snap.indicators;
        let [v1, v2, v3, v4, v5] = snap.volumes.recent;

        Self {
            current_price: price(snap.current_price),
            last5_candles: Last5Candles {
                ohlc: snap.recent_candles.iter().map(WireCandle::from).collect(),
                timestamps: snap
                    .recent_candles
                    .iter()
                    .map(|c| format!("{} {}", c.date, c.close_label))
                    .collect(),
            },
            ema7: price(ind.ema7),
            ema25: price(ind.ema25),
            ema99: price(ind.ema99),
            atr14: price(ind.atr14),
            bb_upper: price(ind.bollinger.upper),
            bb_middle: price(ind.bollinger.middle),
            bb_lower: price(ind.bollinger.lower),
            psar_value: price(ind.psar.value),
            psar_position: ind.psar.position.to_string(),
            volumes: WireVolumes {
                v1: kilo(v1),
                v2: kilo(v2),
                v3: kilo(v3),
                v4: kilo(v4),
                v5: kilo(v5),
                average_volume: kilo(snap.volumes.average),
            },
            candle_patterns: snap
                .patterns
                .iter()
                .map(|e| WirePattern {
                    pattern: e.pattern.to_string(),
                    timestamp: e.timestamp,
                    time_window: e.time_window.clone(),
                    date: e.date.clone(),
                })
                .collect(),
            order_book: WireOrderBook::from(&snap.order_book),
            htf_trends: WireHtfTrends::from(&snap.htf_trends),
            timestamp: snap.timestamp,
            symbol: snap.symbol.clone(),
        }
    }
}

impl TechnicalData {
    /// Neutral document served until the first cycle has published.
    pub fn placeholder(symbol: &str, timestamp: i64) -> Self {
        let zero = || "0".to_string();
        let zero_wall = || WireWall {
            price: zero(),
            size: zero(),
        };

        Self {
            current_price: zero(),
            last5_candles: Last5Candles::default(),
            ema7: zero(),
            ema25: zero(),
            ema99: zero(),
            atr14: zero(),
            bb_upper: zero(),
            bb_middle: zero(),
            bb_lower: zero(),
            psar_value: zero(),
            psar_position: Position::default().to_string(),
            volumes: WireVolumes {
                v1: zero(),
                v2: zero(),
                v3: zero(),
                v4: zero(),
                v5: zero(),
                average_volume: zero(),
            },
            candle_patterns: Vec::new(),
            order_book: WireOrderBook {
                biggest_buy_wall: zero_wall(),
                biggest_sell_wall: zero_wall(),
                buy_to_sell_ratio: zero(),
                top10_bids: Vec::new(),
                top10_asks: Vec::new(),
            },
            htf_trends: WireHtfTrends::from(&HtfTrends::neutral()),
            timestamp,
            symbol: symbol.to_string(),
        }
    }
}
