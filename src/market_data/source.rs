// =============================================================================
// Market Data Source — one capability, swappable upstreams
// =============================================================================
//
// Every upstream (Binance, CoinGecko, the synthetic generator) implements the
// same two calls. The refresh pipeline only ever talks to this trait, so
// switching or chaining providers never touches the pipeline logic.
// =============================================================================

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::market_data::Candle;

#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Short provider name used in logs and cycle reports.
    fn name(&self) -> &str;

    /// Latest traded price for `symbol`.
    async fn current_price(&self, symbol: &str) -> Result<f64>;

    /// Up to `limit` most recent candles for `symbol` at `interval`, oldest
    /// first.
    async fn recent_candles(&self, symbol: &str, interval: &str, limit: u32)
        -> Result<Vec<Candle>>;
}

/// Tries each source in order; the first success wins, per call. Every
/// source gets its own `per_call` budget, so a stalled provider costs one
/// timeout instead of the whole chain.
pub struct FailoverSource {
    sources: Vec<Arc<dyn MarketDataSource>>,
    per_call: Duration,
    name: String,
}

impl FailoverSource {
    pub fn new(sources: Vec<Arc<dyn MarketDataSource>>, per_call: Duration) -> Self {
        let name = sources
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join("+");
        Self {
            sources,
            per_call,
            name,
        }
    }

    /// Worst-case time for one call to walk the full chain.
    pub fn chain_budget(&self) -> Duration {
        self.per_call * self.sources.len().max(1) as u32
    }

    async fn attempt<T>(
        &self,
        source: &dyn MarketDataSource,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.per_call, call).await {
            Ok(result) => result,
            Err(_) => anyhow::bail!(
                "{} timed out after {}s",
                source.name(),
                self.per_call.as_secs_f64()
            ),
        }
    }
}

#[async_trait]
impl MarketDataSource for FailoverSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn current_price(&self, symbol: &str) -> Result<f64> {
        let mut last_err = None;
        for source in &self.sources {
            match self.attempt(source.as_ref(), source.current_price(symbol)).await {
                Ok(price) => {
                    debug!(source = source.name(), price, "price served");
                    return Ok(price);
                }
                Err(e) => {
                    warn!(source = source.name(), error = %e, "price fetch failed, trying next source");
                    last_err = Some(e);
                }
            }
        }
        let err = last_err.unwrap_or_else(|| anyhow::anyhow!("no market data sources configured"));
        Err(err.context("every price source failed"))
    }

    async fn recent_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>> {
        let mut last_err = None;
        for source in &self.sources {
            let call = source.recent_candles(symbol, interval, limit);
            match self.attempt(source.as_ref(), call).await {
                Ok(candles) if !candles.is_empty() => {
                    debug!(source = source.name(), count = candles.len(), "candles served");
                    return Ok(candles);
                }
                Ok(_) => {
                    warn!(source = source.name(), "source returned no candles, trying next source");
                    last_err = Some(anyhow::anyhow!("{} returned no candles", source.name()));
                }
                Err(e) => {
                    warn!(source = source.name(), error = %e, "candle fetch failed, trying next source");
                    last_err = Some(e);
                }
            }
        }
        let err = last_err.unwrap_or_else(|| anyhow::anyhow!("no market data sources configured"));
        Err(err.context("every candle source failed"))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted sources shared by the pipeline and API tests.

    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Always fails both calls.
    pub struct FailingSource;

    #[async_trait]
    impl MarketDataSource for FailingSource {
        fn name(&self) -> &str {
            "failing"
        }

        async fn current_price(&self, _symbol: &str) -> Result<f64> {
            anyhow::bail!("connection refused")
        }

        async fn recent_candles(&self, _: &str, _: &str, _: u32) -> Result<Vec<Candle>> {
            anyhow::bail!("connection refused")
        }
    }

    /// Serves a fixed price and candle batch for the first `healthy_calls`
    /// price requests, then fails forever.
    pub struct ScriptedSource {
        pub price: f64,
        pub candles: Vec<Candle>,
        pub healthy_calls: usize,
        pub price_calls: AtomicUsize,
        pub candle_calls: AtomicUsize,
    }

    impl ScriptedSource {
        pub fn new(price: f64, candles: Vec<Candle>, healthy_calls: usize) -> Self {
            Self {
                price,
                candles,
                healthy_calls,
                price_calls: AtomicUsize::new(0),
                candle_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MarketDataSource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn current_price(&self, _symbol: &str) -> Result<f64> {
            let n = self.price_calls.fetch_add(1, Ordering::SeqCst);
            if n < self.healthy_calls {
                Ok(self.price)
            } else {
                anyhow::bail!("scripted outage")
            }
        }

        async fn recent_candles(&self, _: &str, _: &str, _: u32) -> Result<Vec<Candle>> {
            let n = self.candle_calls.fetch_add(1, Ordering::SeqCst);
            if n < self.healthy_calls {
                Ok(self.candles.clone())
            } else {
                anyhow::bail!("scripted outage")
            }
        }
    }

    /// Never answers within any sane timeout.
    pub struct StalledSource;

    #[async_trait]
    impl MarketDataSource for StalledSource {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn current_price(&self, _symbol: &str) -> Result<f64> {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            Ok(1.0)
        }

        async fn recent_candles(&self, _: &str, _: &str, _: u32) -> Result<Vec<Candle>> {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            Ok(Vec::new())
        }
    }

    pub fn shared<S: MarketDataSource + 'static>(source: S) -> Arc<dyn MarketDataSource> {
        Arc::new(source)
    }

    /// Rising candles every 15 minutes, valid OHLC envelope.
    pub fn rising_candles(count: usize, start: f64) -> Vec<Candle> {
        (0..count)
            .map(|i| {
                let open_time = i as i64 * 900_000;
                let open = start + i as f64;
                let close = open + 0.5;
                Candle::new(
                    open_time,
                    open,
                    close + 0.25,
                    open - 0.25,
                    close,
                    1_000.0,
                    open_time + 899_999,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn failover_uses_first_healthy_source() {
        let chain = FailoverSource::new(vec![
            shared(FailingSource),
            shared(ScriptedSource::new(150.0, rising_candles(3, 100.0), 10)),
        ], SECOND);

        assert_eq!(chain.name(), "failing+scripted");
        assert_eq!(chain.current_price("SOLUSDT").await.unwrap(), 150.0);
        assert_eq!(chain.recent_candles("SOLUSDT", "15m", 150).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn failover_skips_empty_batches() {
        let chain = FailoverSource::new(vec![
            shared(ScriptedSource::new(1.0, Vec::new(), 10)),
            shared(ScriptedSource::new(2.0, rising_candles(2, 10.0), 10)),
        ], SECOND);
        assert_eq!(chain.recent_candles("X", "15m", 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failover_reports_error_when_all_fail() {
        let chain = FailoverSource::new(vec![shared(FailingSource), shared(FailingSource)], SECOND);
        assert!(chain.current_price("SOLUSDT").await.is_err());
        assert!(chain.recent_candles("SOLUSDT", "15m", 150).await.is_err());

        let empty = FailoverSource::new(Vec::new(), SECOND);
        assert!(empty.current_price("SOLUSDT").await.is_err());
    }

    #[tokio::test]
    async fn stalled_source_only_costs_its_own_timeout() {
        let chain = FailoverSource::new(
            vec![
                shared(StalledSource),
                shared(ScriptedSource::new(77.0, rising_candles(4, 70.0), 10)),
            ],
            Duration::from_millis(100),
        );
        assert_eq!(chain.chain_budget(), Duration::from_millis(200));

        let started = std::time::Instant::now();
        assert_eq!(chain.current_price("SOLUSDT").await.unwrap(), 77.0);
        assert_eq!(chain.recent_candles("SOLUSDT", "15m", 150).await.unwrap().len(), 4);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
