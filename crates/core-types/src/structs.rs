use crate::enums::{AccountStatus, ExecutionOutcome, Level, Side, StrategyKind, StrategyStatus, Trend};
use crate::error::CoreError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// A strategy evaluator bound to one or more symbols.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub id: Uuid,
    pub name: String,
    pub kind: StrategyKind,
    pub target_symbols: BTreeSet<String>,
    pub status: StrategyStatus,
    /// Minimum absolute confidence (0..100) below which the strategy abstains.
    pub confidence_threshold: Decimal,
    /// Track-record multiplier adjusted by performance feedback.
    pub performance_weight: Decimal,
    pub total_trades: u64,
}

impl Strategy {
    pub fn is_active(&self) -> bool {
        self.status == StrategyStatus::Active
    }

    pub fn targets(&self, symbol: &str) -> bool {
        self.target_symbols.contains(symbol)
    }
}

/// An immutable snapshot of the market for one symbol at one evaluation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketConditions {
    pub symbol: String,
    pub volatility: Level,
    pub trend: Trend,
    pub volume: Level,
    /// Aggregate sentiment in the range -1..1.
    pub sentiment: Decimal,
    pub observed_at: DateTime<Utc>,
}

impl MarketConditions {
    pub fn new(
        symbol: impl Into<String>,
        volatility: Level,
        trend: Trend,
        volume: Level,
        sentiment: Decimal,
    ) -> Result<Self, CoreError> {
        if sentiment < dec!(-1) || sentiment > dec!(1) {
            return Err(CoreError::InvalidInput(
                "sentiment".to_string(),
                format!("{} is outside -1..1", sentiment),
            ));
        }
        Ok(Self {
            symbol: symbol.into(),
            volatility,
            trend,
            volume,
            sentiment,
            observed_at: Utc::now(),
        })
    }
}

/// One strategy's opinion for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub strategy_id: Uuid,
    pub strategy_kind: StrategyKind,
    pub direction: Side,
    /// Signed conviction in -100..100; positive leans buy, negative leans sell.
    pub confidence: Decimal,
    pub weight: Decimal,
    pub rationale: String,
}

/// The single trade instruction produced by aggregating independent strategy votes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleSignal {
    pub id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    /// 0..100, capped below certainty.
    pub confidence: Decimal,
    /// 0..1 normalized magnitude of weighted net agreement.
    pub consensus_strength: Decimal,
    pub votes: Vec<Vote>,
    pub reasoning: String,
    pub emitted_at: DateTime<Utc>,
}

impl EnsembleSignal {
    /// Whether the signal is older than `validity` at `now`.
    pub fn is_stale(&self, now: DateTime<Utc>, validity: chrono::Duration) -> bool {
        now - self.emitted_at > validity
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub balance: Decimal,
    pub risk_multiplier: Decimal,
    pub confidence_threshold: Decimal,
    pub max_position_value: Decimal,
    pub status: AccountStatus,
    /// Symbols whose signals this account subscribes to.
    pub symbols: BTreeSet<String>,
}

impl Account {
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

/// The state change requested from an account store for a single fill.
/// `balance_before` acts as an optimistic check: the store must refuse the
/// write if the persisted balance no longer matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub account_id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
}

/// The append-only outcome of one (account, signal) execution attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    pub signal_id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub requested_size: Decimal,
    pub filled_size: Decimal,
    pub fill_price: Decimal,
    pub fee: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub outcome: ExecutionOutcome,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionRecord {
    /// Signed change this attempt applied to the account balance.
    pub fn balance_delta(&self) -> Decimal {
        self.balance_after - self.balance_before
    }

    pub fn is_filled(&self) -> bool {
        self.outcome == ExecutionOutcome::Filled
    }
}
