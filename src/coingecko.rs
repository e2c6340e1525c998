// =============================================================================
// CoinGecko REST API Client — public price and OHLC endpoints
// =============================================================================
//
// Secondary upstream. CoinGecko works in coin ids ("solana"), not exchange
// symbols, so the client is bound to one coin id and ignores the symbol it is
// asked for.
//
// OHLC rows are `[timestamp_ms, open, high, low, close]` where the timestamp
// is the candle's close. No volume is reported, so candles carry volume 0 and
// the open time is inferred from the spacing between rows.
// =============================================================================

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use crate::market_data::{Candle, MarketDataSource};

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Spacing assumed for a single-row response (30 minutes, CoinGecko's
/// granularity for `days=1`).
const DEFAULT_ROW_SPACING_MS: i64 = 1_800_000;

/// CoinGecko API client for one coin, quoted in USD.
#[derive(Clone)]
pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
    coin_id: String,
}

impl CoinGeckoClient {
    pub fn new(base_url: impl Into<String>, coin_id: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            coin_id: coin_id.into(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url} request failed"))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!("CoinGecko API error ({}): {}", status, error_text);
        }

        response
            .json()
            .await
            .with_context(|| format!("failed to parse response from {url}"))
    }

    /// GET /simple/price?ids=<coin>&vs_currencies=usd
    #[instrument(skip(self), fields(coin = %self.coin_id), name = "coingecko::get_price")]
    pub async fn get_price(&self) -> Result<f64> {
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies=usd",
            self.base_url, self.coin_id
        );
        let body: HashMap<String, HashMap<String, f64>> = self.get_json(&url).await?;

        let price = body
            .get(&self.coin_id)
            .and_then(|quotes| quotes.get("usd"))
            .copied()
            .with_context(|| format!("no usd price for '{}' in response", self.coin_id))?;

        debug!(coin = %self.coin_id, price, "price fetched");
        Ok(price)
    }

    /// GET /coins/<coin>/ohlc?vs_currency=usd&days=1
    #[instrument(skip(self), fields(coin = %self.coin_id), name = "coingecko::get_ohlc")]
    pub async fn get_ohlc(&self, limit: u32) -> Result<Vec<Candle>> {
        let url = format!(
            "{}/coins/{}/ohlc?vs_currency=usd&days=1",
            self.base_url, self.coin_id
        );
        let rows: Vec<[f64; 5]> = self.get_json(&url).await?;
        let candles = candles_from_rows(&rows, limit as usize);

        debug!(coin = %self.coin_id, count = candles.len(), "ohlc fetched");
        Ok(candles)
    }
}

/// Convert CoinGecko OHLC rows (oldest first) into at most `limit` candles.
fn candles_from_rows(rows: &[[f64; 5]], limit: usize) -> Vec<Candle> {
    let spacing = match rows {
        [.., prev, last] => (last[0] - prev[0]) as i64,
        _ => DEFAULT_ROW_SPACING_MS,
    }
    .max(1);

    let start = rows.len().saturating_sub(limit);
    rows[start..]
        .iter()
        .map(|&[ts, open, high, low, close]| {
            let close_time = ts as i64;
            Candle::new(close_time - spacing, open, high, low, close, 0.0, close_time - 1)
        })
        .collect()
}

#[async_trait]
impl MarketDataSource for CoinGeckoClient {
    fn name(&self) -> &str {
        "coingecko"
    }

    async fn current_price(&self, _symbol: &str) -> Result<f64> {
        self.get_price().await
    }

    async fn recent_candles(&self, _symbol: &str, _interval: &str, limit: u32) -> Result<Vec<Candle>> {
        self.get_ohlc(limit).await
    }
}
