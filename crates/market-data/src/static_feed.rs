use crate::error::MarketDataError;
use crate::{MarketConditionProvider, PriceOracle};
use async_trait::async_trait;
use chrono::Utc;
use configuration::MarketSettings;
use core_types::MarketConditions;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A market feed backed by fixed values.
///
/// Seeded from `[market.static_prices]` / `[market.static_conditions]` for paper
/// runs, and mutated directly by tests to script a scenario.
#[derive(Debug, Default)]
pub struct StaticMarket {
    prices: RwLock<HashMap<String, Decimal>>,
    conditions: RwLock<HashMap<String, MarketConditions>>,
}

impl StaticMarket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &MarketSettings) -> Result<Self, MarketDataError> {
        let mut conditions = HashMap::new();
        for (symbol, reading) in &settings.static_conditions {
            let snapshot = MarketConditions::new(
                symbol.clone(),
                reading.volatility,
                reading.trend,
                reading.volume,
                reading.sentiment,
            )
            .map_err(|e| MarketDataError::InvalidData(e.to_string()))?;
            conditions.insert(symbol.clone(), snapshot);
        }
        Ok(Self {
            prices: RwLock::new(settings.static_prices.clone()),
            conditions: RwLock::new(conditions),
        })
    }

    pub async fn set_price(&self, symbol: &str, price: Decimal) {
        self.prices.write().await.insert(symbol.to_string(), price);
    }

    pub async fn set_conditions(&self, conditions: MarketConditions) {
        self.conditions
            .write()
            .await
            .insert(conditions.symbol.clone(), conditions);
    }

    /// Removes every value for `symbol`, simulating an upstream outage.
    pub async fn clear(&self, symbol: &str) {
        self.prices.write().await.remove(symbol);
        self.conditions.write().await.remove(symbol);
    }
}

#[async_trait]
impl PriceOracle for StaticMarket {
    async fn get_price(&self, symbol: &str) -> Result<Decimal, MarketDataError> {
        self.prices
            .read()
            .await
            .get(symbol)
            .copied()
            .ok_or_else(|| MarketDataError::UnknownSymbol(symbol.to_string()))
    }
}

#[async_trait]
impl MarketConditionProvider for StaticMarket {
    async fn snapshot(&self, symbol: &str) -> Result<MarketConditions, MarketDataError> {
        let mut snapshot = self
            .conditions
            .read()
            .await
            .get(symbol)
            .cloned()
            .ok_or_else(|| MarketDataError::UnknownSymbol(symbol.to_string()))?;
        snapshot.observed_at = Utc::now();
        Ok(snapshot)
    }
}
