use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// The family of logic a strategy belongs to. Each kind reacts to a different
/// subset of the market condition dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    TrendFollowing,
    MeanReversion,
    Momentum,
    Sentiment,
    VolatilityBreakout,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::TrendFollowing => "trend_following",
            StrategyKind::MeanReversion => "mean_reversion",
            StrategyKind::Momentum => "momentum",
            StrategyKind::Sentiment => "sentiment",
            StrategyKind::VolatilityBreakout => "volatility_breakout",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyStatus {
    Active,
    Paused,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Suspended,
    Closed,
}

/// A coarse three-level reading used for both volatility and volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Low,
    Medium,
    High,
}

impl Level {
    /// Numeric reading of the level: low = -1, medium = 0, high = +1.
    pub fn reading(&self) -> Decimal {
        match self {
            Level::Low => Decimal::NEGATIVE_ONE,
            Level::Medium => Decimal::ZERO,
            Level::High => Decimal::ONE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Bullish,
    Bearish,
    Sideways,
}

impl Trend {
    /// Numeric reading of the trend: bullish = +1, sideways = 0, bearish = -1.
    pub fn reading(&self) -> Decimal {
        match self {
            Trend::Bullish => Decimal::ONE,
            Trend::Sideways => Decimal::ZERO,
            Trend::Bearish => Decimal::NEGATIVE_ONE,
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Bullish => write!(f, "bullish"),
            Trend::Bearish => write!(f, "bearish"),
            Trend::Sideways => write!(f, "sideways"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Filled,
    Rejected,
    Error,
}

impl ExecutionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionOutcome::Filled => "filled",
            ExecutionOutcome::Rejected => "rejected",
            ExecutionOutcome::Error => "error",
        }
    }
}

/// Parses the snake_case names used in storage rows and configuration files.
macro_rules! impl_from_str {
    ($ty:ident, $kind:literal, { $($text:literal => $variant:expr),+ $(,)? }) => {
        impl std::str::FromStr for $ty {
            type Err = crate::error::CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($variant),)+
                    other => Err(crate::error::CoreError::UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

impl_from_str!(Side, "side", { "buy" => Side::Buy, "sell" => Side::Sell });
impl_from_str!(StrategyKind, "strategy kind", {
    "trend_following" => StrategyKind::TrendFollowing,
    "mean_reversion" => StrategyKind::MeanReversion,
    "momentum" => StrategyKind::Momentum,
    "sentiment" => StrategyKind::Sentiment,
    "volatility_breakout" => StrategyKind::VolatilityBreakout,
});
impl_from_str!(StrategyStatus, "strategy status", {
    "active" => StrategyStatus::Active,
    "paused" => StrategyStatus::Paused,
    "stopped" => StrategyStatus::Stopped,
});
impl_from_str!(AccountStatus, "account status", {
    "active" => AccountStatus::Active,
    "suspended" => AccountStatus::Suspended,
    "closed" => AccountStatus::Closed,
});
impl_from_str!(ExecutionOutcome, "execution outcome", {
    "filled" => ExecutionOutcome::Filled,
    "rejected" => ExecutionOutcome::Rejected,
    "error" => ExecutionOutcome::Error,
});

impl StrategyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyStatus::Active => "active",
            StrategyStatus::Paused => "paused",
            StrategyStatus::Stopped => "stopped",
        }
    }
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Suspended => "suspended",
            AccountStatus::Closed => "closed",
        }
    }
}
