// =============================================================================
// Configuration — JSON file + environment overrides, atomic save
// =============================================================================
//
// Every tunable lives in `AppConfig`. All fields carry a serde default so a
// partial (or empty) JSON file always loads, and adding fields never breaks an
// older file. Resolution order, last one wins:
//
//   built-in defaults -> JSON file -> TA_PULSE_* environment variables
//
// Persistence uses an atomic tmp + rename write.
// =============================================================================

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::htf_analysis::HtfParams;

/// Config file used when `TA_PULSE_CONFIG` is not set.
pub const DEFAULT_CONFIG_PATH: &str = "ta_pulse.json";

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbol() -> String {
    "SOLUSDT".to_string()
}

fn default_display_symbol() -> String {
    "SOL/USDT".to_string()
}

fn default_interval() -> String {
    "15m".to_string()
}

fn default_candle_limit() -> u32 {
    150
}

fn default_refresh_secs() -> u64 {
    30
}

fn default_fetch_timeout_secs() -> u64 {
    8
}

fn default_sources() -> Vec<SourceKind> {
    vec![SourceKind::Binance, SourceKind::CoinGecko]
}

fn default_binance_base_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_coingecko_base_url() -> String {
    "https://api.coingecko.com/api/v3".to_string()
}

fn default_coingecko_coin_id() -> String {
    "solana".to_string()
}

fn default_fallback_price() -> f64 {
    245.86
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_static_dir() -> String {
    "public".to_string()
}

fn default_order_book_levels() -> usize {
    10
}

// =============================================================================
// SourceKind
// =============================================================================

/// An upstream the failover chain can be built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Binance,
    #[serde(rename = "coingecko")]
    CoinGecko,
    Synthetic,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Binance => write!(f, "binance"),
            Self::CoinGecko => write!(f, "coingecko"),
            Self::Synthetic => write!(f, "synthetic"),
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binance" => Ok(Self::Binance),
            "coingecko" => Ok(Self::CoinGecko),
            "synthetic" => Ok(Self::Synthetic),
            other => bail!("unknown market data source '{other}'"),
        }
    }
}

// =============================================================================
// IndicatorParams
// =============================================================================

/// Look-back periods and factors for every indicator in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
    pub ema_fast: usize,
    pub ema_mid: usize,
    pub ema_slow: usize,
    pub atr_period: usize,
    pub bollinger_period: usize,
    pub bollinger_std: f64,
    pub psar_af: f64,
    pub psar_max_af: f64,
    /// Trailing candles the SAR is recomputed over each cycle.
    pub psar_window: usize,
    /// How many of the newest candles get a pattern label.
    pub pattern_count: usize,
    pub htf_h1_window: usize,
    pub htf_h4_window: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            ema_fast: 7,
            ema_mid: 25,
            ema_slow: 99,
            atr_period: 14,
            bollinger_period: 20,
            bollinger_std: 2.0,
            psar_af: 0.02,
            psar_max_af: 0.2,
            psar_window: 50,
            pattern_count: 5,
            htf_h1_window: 240,
            htf_h4_window: 960,
        }
    }
}

impl IndicatorParams {
    /// HTF flags reuse the slow EMA period.
    pub fn htf(&self) -> HtfParams {
        HtfParams {
            ema_period: self.ema_slow,
            h1_window: self.htf_h1_window,
            h4_window: self.htf_h4_window,
        }
    }
}

// =============================================================================
// AppConfig
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    // --- Instrument ----------------------------------------------------------

    /// Exchange symbol sent upstream.
    #[serde(default = "default_symbol")]
    pub symbol: String,

    /// Symbol as shown to clients.
    #[serde(default = "default_display_symbol")]
    pub display_symbol: String,

    /// Kline interval, Binance notation.
    #[serde(default = "default_interval")]
    pub interval: String,

    /// Candles requested per cycle and the series capacity.
    #[serde(default = "default_candle_limit")]
    pub candle_limit: u32,

    // --- Refresh cadence -----------------------------------------------------

    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,

    /// Upper bound on each upstream fetch within a cycle.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    // --- Upstreams -----------------------------------------------------------

    /// Failover order; the first healthy source wins per call.
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceKind>,

    #[serde(default = "default_binance_base_url")]
    pub binance_base_url: String,

    #[serde(default = "default_coingecko_base_url")]
    pub coingecko_base_url: String,

    #[serde(default = "default_coingecko_coin_id")]
    pub coingecko_coin_id: String,

    /// Price used when no live price has ever been seen.
    #[serde(default = "default_fallback_price")]
    pub fallback_price: f64,

    // --- Serving -------------------------------------------------------------

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_static_dir")]
    pub static_dir: String,

    // --- Analysis ------------------------------------------------------------

    #[serde(default = "default_order_book_levels")]
    pub order_book_levels: usize,

    #[serde(default)]
    pub indicators: IndicatorParams,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            display_symbol: default_display_symbol(),
            interval: default_interval(),
            candle_limit: default_candle_limit(),
            refresh_secs: default_refresh_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            sources: default_sources(),
            binance_base_url: default_binance_base_url(),
            coingecko_base_url: default_coingecko_base_url(),
            coingecko_coin_id: default_coingecko_coin_id(),
            fallback_price: default_fallback_price(),
            bind_addr: default_bind_addr(),
            static_dir: default_static_dir(),
            order_book_levels: default_order_book_levels(),
            indicators: IndicatorParams::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// A missing or unreadable file is an error so the caller can fall back
    /// to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbol = %config.symbol,
            interval = %config.interval,
            "config loaded"
        );

        Ok(config)
    }

    /// File (or defaults) plus environment overrides. Never fails: a bad file
    /// or a bad override is logged and skipped.
    pub fn resolve() -> Self {
        let path = config_path();
        let mut config = match Self::load(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config file unavailable, using defaults");
                Self::default()
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Apply `TA_PULSE_*` overrides fetched through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(symbol) = lookup("TA_PULSE_SYMBOL") {
            self.symbol = symbol;
        }
        if let Some(interval) = lookup("TA_PULSE_INTERVAL") {
            if crate::market_data::interval_millis(&interval).is_some() {
                self.interval = interval;
            } else {
                warn!(interval = %interval, "ignoring invalid TA_PULSE_INTERVAL");
            }
        }
        if let Some(addr) = lookup("TA_PULSE_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(raw) = lookup("TA_PULSE_SOURCES") {
            match parse_sources(&raw) {
                Ok(sources) => self.sources = sources,
                Err(e) => warn!(value = %raw, error = %e, "ignoring invalid TA_PULSE_SOURCES"),
            }
        }
        if let Some(raw) = lookup("TA_PULSE_REFRESH_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.refresh_secs = secs,
                _ => warn!(value = %raw, "ignoring invalid TA_PULSE_REFRESH_SECS"),
            }
        }
    }

    /// Persist the configuration to `path` using an atomic write (write to
    /// `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content =
            serde_json::to_string_pretty(self).context("failed to serialise config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "config saved (atomic)");
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs.max(1))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }
}

/// Config file location: `TA_PULSE_CONFIG` if set, else [`DEFAULT_CONFIG_PATH`].
pub fn config_path() -> PathBuf {
    std::env::var("TA_PULSE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Parse a comma-separated source list such as `"binance,synthetic"`.
pub fn parse_sources(raw: &str) -> Result<Vec<SourceKind>> {
    let sources = raw
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(str::parse)
        .collect::<Result<Vec<SourceKind>>>()?;
    if sources.is_empty() {
        bail!("source list is empty");
    }
    Ok(sources)
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.symbol, "SOLUSDT");
        assert_eq!(cfg.display_symbol, "SOL/USDT");
        assert_eq!(cfg.interval, "15m");
        assert_eq!(cfg.candle_limit, 150);
        assert_eq!(cfg.refresh_interval(), Duration::from_secs(30));
        assert_eq!(cfg.fetch_timeout(), Duration::from_secs(8));
        assert_eq!(cfg.sources, vec![SourceKind::Binance, SourceKind::CoinGecko]);
        assert!((cfg.fallback_price - 245.86).abs() < f64::EPSILON);
        assert_eq!(cfg.order_book_levels, 10);
        assert_eq!(cfg.indicators.ema_slow, 99);
        assert_eq!(cfg.indicators.psar_window, 50);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.symbol, "SOLUSDT");
        assert_eq!(cfg.indicators, IndicatorParams::default());
        assert_eq!(cfg.bind_addr, "0.0.0.0:3000");
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{
            "symbol": "ETHUSDT",
            "sources": ["coingecko", "synthetic"],
            "indicators": { "atr_period": 21 }
        }"#;
        let cfg: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.symbol, "ETHUSDT");
        assert_eq!(cfg.sources, vec![SourceKind::CoinGecko, SourceKind::Synthetic]);
        assert_eq!(cfg.indicators.atr_period, 21);
        assert_eq!(cfg.indicators.ema_fast, 7);
        assert_eq!(cfg.refresh_secs, 30);
    }

    #[test]
    fn env_overrides_win_over_file() {
        let env: HashMap<&str, &str> = [
            ("TA_PULSE_SYMBOL", "BTCUSDT"),
            ("TA_PULSE_INTERVAL", "1h"),
            ("TA_PULSE_SOURCES", "synthetic, binance"),
            ("TA_PULSE_REFRESH_SECS", "5"),
        ]
        .into_iter()
        .collect();

        let mut cfg = AppConfig::default();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.symbol, "BTCUSDT");
        assert_eq!(cfg.interval, "1h");
        assert_eq!(cfg.sources, vec![SourceKind::Synthetic, SourceKind::Binance]);
        assert_eq!(cfg.refresh_secs, 5);
        assert_eq!(cfg.bind_addr, "0.0.0.0:3000");
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let env: HashMap<&str, &str> = [
            ("TA_PULSE_INTERVAL", "7x"),
            ("TA_PULSE_SOURCES", "kraken"),
            ("TA_PULSE_REFRESH_SECS", "0"),
        ]
        .into_iter()
        .collect();

        let mut cfg = AppConfig::default();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.interval, "15m");
        assert_eq!(cfg.sources, default_sources());
        assert_eq!(cfg.refresh_secs, 30);
    }

    #[test]
    fn parse_sources_rejects_empty_and_unknown() {
        assert!(parse_sources("").is_err());
        assert!(parse_sources(" , ").is_err());
        assert!(parse_sources("binance,ftx").is_err());
        assert_eq!(parse_sources("CoinGecko").unwrap(), vec![SourceKind::CoinGecko]);
    }

    #[test]
    fn save_then_load_roundtrip() {
        let path = std::env::temp_dir().join(format!("ta_pulse_{}.json", uuid::Uuid::new_v4()));
        let mut cfg = AppConfig::default();
        cfg.symbol = "ADAUSDT".to_string();
        cfg.indicators.bollinger_std = 2.5;

        cfg.save(&path).unwrap();
        let loaded = AppConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.symbol, "ADAUSDT");
        assert_eq!(loaded.indicators.bollinger_std, 2.5);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn load_missing_file_is_an_error() {
        assert!(AppConfig::load("/definitely/not/here/ta_pulse.json").is_err());
    }
}
