//! # Quorum Market Data
//!
//! The engine's view of the market, reduced to two pull-based contracts:
//!
//! - `PriceOracle`: the latest price of a symbol.
//! - `MarketConditionProvider`: a volatility/trend/volume/sentiment snapshot.
//!
//! Implementations: `StaticMarket` (configured values, deterministic in tests),
//! `BinanceMarketClient` (public REST endpoints) and `CachedOracle`, a
//! bounded-staleness wrapper around any oracle.

use async_trait::async_trait;
use core_types::MarketConditions;
use rust_decimal::Decimal;

pub mod binance;
pub mod cache;
pub mod conditions;
pub mod error;
pub mod static_feed;

// --- Public API ---
pub use binance::BinanceMarketClient;
pub use cache::CachedOracle;
pub use conditions::{derive_conditions, Candle};
pub use error::MarketDataError;
pub use static_feed::StaticMarket;

/// Supplies the current price of a symbol.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn get_price(&self, symbol: &str) -> Result<Decimal, MarketDataError>;
}

/// Supplies the market condition snapshot a strategy evaluates against.
#[async_trait]
pub trait MarketConditionProvider: Send + Sync {
    async fn snapshot(&self, symbol: &str) -> Result<MarketConditions, MarketDataError>;
}
