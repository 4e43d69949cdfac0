//! Derivation of a `MarketConditions` snapshot from recent candles.

use crate::error::MarketDataError;
use chrono::Utc;
use core_types::{Level, MarketConditions, Trend};
use rust_decimal::prelude::*;

/// The two fields of a candle the condition readings are computed from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub close: Decimal,
    pub volume: Decimal,
}

/// Standard deviation of close-to-close returns at or below which volatility is low.
const LOW_VOLATILITY: f64 = 0.005;
/// Standard deviation of close-to-close returns above which volatility is high.
const HIGH_VOLATILITY: f64 = 0.02;
/// Distance of the last close from the mean close that counts as a trend.
const TREND_BAND: f64 = 0.01;
/// Last volume relative to the mean volume below/above which volume is low/high.
const LOW_VOLUME_RATIO: f64 = 0.7;
const HIGH_VOLUME_RATIO: f64 = 1.3;
/// Window return that saturates sentiment at ±1.
const SENTIMENT_SCALE: f64 = 10.0;

/// Minimum number of candles needed to compute returns and a mean.
pub const MIN_CANDLES: usize = 3;

/// Classifies a window of candles (oldest first) into a condition snapshot.
///
/// The statistics are computed in `f64`; the readings are coarse buckets so the
/// precision trade-off does not leak into any monetary value.
pub fn derive_conditions(symbol: &str, candles: &[Candle]) -> Result<MarketConditions, MarketDataError> {
    if candles.len() < MIN_CANDLES {
        return Err(MarketDataError::InvalidData(format!(
            "{} candles for {}, need at least {}",
            candles.len(),
            symbol,
            MIN_CANDLES
        )));
    }

    let closes = candles
        .iter()
        .map(|c| to_f64(c.close))
        .collect::<Result<Vec<_>, _>>()?;
    let volumes = candles
        .iter()
        .map(|c| to_f64(c.volume))
        .collect::<Result<Vec<_>, _>>()?;

    if closes.iter().any(|c| *c <= 0.0) {
        return Err(MarketDataError::InvalidData(format!("non-positive close for {}", symbol)));
    }

    let returns: Vec<f64> = closes.windows(2).map(|w| w[1] / w[0] - 1.0).collect();
    let mean_return = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns.iter().map(|r| (r - mean_return).powi(2)).sum::<f64>() / returns.len() as f64;
    let stdev = variance.sqrt();

    let volatility = if stdev <= LOW_VOLATILITY {
        Level::Low
    } else if stdev <= HIGH_VOLATILITY {
        Level::Medium
    } else {
        Level::High
    };

    let last_close = closes[closes.len() - 1];
    let mean_close = closes.iter().sum::<f64>() / closes.len() as f64;
    let distance = last_close / mean_close - 1.0;
    let trend = if distance > TREND_BAND {
        Trend::Bullish
    } else if distance < -TREND_BAND {
        Trend::Bearish
    } else {
        Trend::Sideways
    };

    let mean_volume = volumes.iter().sum::<f64>() / volumes.len() as f64;
    let volume_ratio = if mean_volume > 0.0 {
        volumes[volumes.len() - 1] / mean_volume
    } else {
        1.0
    };
    let volume = if volume_ratio < LOW_VOLUME_RATIO {
        Level::Low
    } else if volume_ratio > HIGH_VOLUME_RATIO {
        Level::High
    } else {
        Level::Medium
    };

    let window_return = last_close / closes[0] - 1.0;
    let sentiment = (window_return * SENTIMENT_SCALE).clamp(-1.0, 1.0);
    let sentiment = Decimal::from_f64(sentiment)
        .ok_or_else(|| MarketDataError::InvalidData(format!("sentiment {} not representable", sentiment)))?
        .round_dp(4);

    Ok(MarketConditions {
        symbol: symbol.to_string(),
        volatility,
        trend,
        volume,
        sentiment,
        observed_at: Utc::now(),
    })
}

fn to_f64(value: Decimal) -> Result<f64, MarketDataError> {
    value
        .to_f64()
        .ok_or_else(|| MarketDataError::InvalidData(format!("{} not representable as f64", value)))
}
