use crate::error::MarketDataError;
use crate::PriceOracle;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Wraps an oracle with a bounded-staleness price cache.
///
/// A cached price is served while it is younger than `max_staleness`; older
/// entries are refreshed from the inner oracle. When the refresh fails the error
/// is surfaced as `UpstreamUnavailable`. A stale price is never returned.
pub struct CachedOracle {
    inner: Arc<dyn PriceOracle>,
    max_staleness: Duration,
    prices: Mutex<HashMap<String, (Decimal, DateTime<Utc>)>>,
}

impl CachedOracle {
    pub fn new(inner: Arc<dyn PriceOracle>, max_staleness: Duration) -> Self {
        Self {
            inner,
            max_staleness,
            prices: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl PriceOracle for CachedOracle {
    async fn get_price(&self, symbol: &str) -> Result<Decimal, MarketDataError> {
        let now = Utc::now();
        if let Some((price, fetched_at)) = self.prices.lock().await.get(symbol) {
            if now - *fetched_at <= self.max_staleness {
                return Ok(*price);
            }
        }

        let price = self.inner.get_price(symbol).await.map_err(|e| match e {
            MarketDataError::UpstreamUnavailable { .. } => e,
            other => MarketDataError::UpstreamUnavailable {
                symbol: symbol.to_string(),
                reason: other.to_string(),
            },
        })?;
        tracing::debug!(symbol = %symbol, price = %price, "Refreshed cached price.");
        self.prices.lock().await.insert(symbol.to_string(), (price, Utc::now()));
        Ok(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StaticMarket;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn fresh_prices_are_served_from_cache() {
        let market = Arc::new(StaticMarket::new());
        market.set_price("BTCUSDT", dec!(50000)).await;
        let oracle = CachedOracle::new(market.clone(), Duration::seconds(60));

        assert_eq!(oracle.get_price("BTCUSDT").await.unwrap(), dec!(50000));
        market.set_price("BTCUSDT", dec!(51000)).await;
        assert_eq!(oracle.get_price("BTCUSDT").await.unwrap(), dec!(50000));
    }

    #[tokio::test]
    async fn stale_prices_are_refreshed() {
        let market = Arc::new(StaticMarket::new());
        market.set_price("BTCUSDT", dec!(50000)).await;
        let oracle = CachedOracle::new(market.clone(), Duration::zero());

        assert_eq!(oracle.get_price("BTCUSDT").await.unwrap(), dec!(50000));
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        market.set_price("BTCUSDT", dec!(51000)).await;
        assert_eq!(oracle.get_price("BTCUSDT").await.unwrap(), dec!(51000));
    }

    #[tokio::test]
    async fn failed_refresh_never_serves_a_stale_price() {
        let market = Arc::new(StaticMarket::new());
        market.set_price("BTCUSDT", dec!(50000)).await;
        let oracle = CachedOracle::new(market.clone(), Duration::zero());
        oracle.get_price("BTCUSDT").await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        market.clear("BTCUSDT").await;
        assert!(matches!(
            oracle.get_price("BTCUSDT").await,
            Err(MarketDataError::UpstreamUnavailable { .. })
        ));
    }
}
