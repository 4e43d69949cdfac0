use crate::conditions::{derive_conditions, Candle};
use crate::error::MarketDataError;
use crate::{MarketConditionProvider, PriceOracle};
use async_trait::async_trait;
use configuration::MarketSettings;
use core_types::MarketConditions;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

/// Reads prices and candles from Binance's public spot REST API.
///
/// Only unauthenticated market-data endpoints are used; nothing is ever sent
/// to the exchange on an account's behalf.
#[derive(Clone)]
pub struct BinanceMarketClient {
    client: reqwest::Client,
    base_url: String,
    kline_interval: String,
    kline_lookback: usize,
}

// The ticker endpoint returns `{"symbol": "BTCUSDT", "price": "50000.00"}`.
#[derive(Deserialize)]
struct TickerPrice {
    price: String,
}

// Intermediate struct for deserializing klines from Binance API
#[derive(Deserialize)]
struct RawKline(i64, String, String, String, String, String, i64, String, i64, String, String, String);

impl BinanceMarketClient {
    pub fn new(settings: &MarketSettings) -> Result<Self, MarketDataError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            kline_interval: settings.kline_interval.clone(),
            kline_lookback: settings.kline_lookback,
        })
    }

    async fn fetch_candles(&self, symbol: &str) -> Result<Vec<Candle>, MarketDataError> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", symbol),
                ("interval", self.kline_interval.as_str()),
                ("limit", &self.kline_lookback.to_string()),
            ])
            .send()
            .await
            .map_err(|e| unavailable(symbol, e))?;

        if !response.status().is_success() {
            return Err(MarketDataError::UpstreamUnavailable {
                symbol: symbol.to_string(),
                reason: format!("klines returned HTTP {}", response.status()),
            });
        }

        let raw = response
            .json::<Vec<RawKline>>()
            .await
            .map_err(|e| MarketDataError::InvalidData(e.to_string()))?;

        raw.into_iter()
            .map(|k| {
                Ok(Candle {
                    close: parse_decimal(&k.4)?,
                    volume: parse_decimal(&k.5)?,
                })
            })
            .collect()
    }
}

fn unavailable(symbol: &str, error: reqwest::Error) -> MarketDataError {
    MarketDataError::UpstreamUnavailable {
        symbol: symbol.to_string(),
        reason: error.to_string(),
    }
}

fn parse_decimal(text: &str) -> Result<Decimal, MarketDataError> {
    Decimal::from_str(text).map_err(|e| MarketDataError::InvalidData(format!("'{}': {}", text, e)))
}

#[async_trait]
impl PriceOracle for BinanceMarketClient {
    async fn get_price(&self, symbol: &str) -> Result<Decimal, MarketDataError> {
        let url = format!("{}/api/v3/ticker/price", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("symbol", symbol)])
            .send()
            .await
            .map_err(|e| unavailable(symbol, e))?;

        if !response.status().is_success() {
            return Err(MarketDataError::UpstreamUnavailable {
                symbol: symbol.to_string(),
                reason: format!("ticker returned HTTP {}", response.status()),
            });
        }

        let ticker = response
            .json::<TickerPrice>()
            .await
            .map_err(|e| MarketDataError::InvalidData(e.to_string()))?;
        parse_decimal(&ticker.price)
    }
}

#[async_trait]
impl MarketConditionProvider for BinanceMarketClient {
    async fn snapshot(&self, symbol: &str) -> Result<MarketConditions, MarketDataError> {
        let candles = self.fetch_candles(symbol).await?;
        tracing::debug!(symbol = %symbol, candles = candles.len(), "Fetched candles for condition snapshot.");
        derive_conditions(symbol, &candles)
    }
}
