use crate::error::ConsensusError;
use chrono::Utc;
use configuration::ConsensusSettings;
use core_types::{EnsembleSignal, MarketConditions, Side, StrategyKind, Vote};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{BTreeSet, HashSet};
use uuid::Uuid;

/// The weighted tally of a vote set, before any threshold is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Tally {
    /// Σ buy confidence × weight.
    pub buy: Decimal,
    /// Σ |sell confidence| × weight.
    pub sell: Decimal,
    pub total_weight: Decimal,
    /// Weighted net confidence in points (-100..100).
    pub net_weight: Decimal,
    pub voters: usize,
}

/// One vote per strategy: the first one it cast.
fn distinct(votes: &[Vote]) -> Vec<&Vote> {
    let mut seen = HashSet::new();
    votes.iter().filter(|v| seen.insert(v.strategy_id)).collect()
}

impl Tally {
    /// Tallies `votes`, counting each strategy once.
    pub fn of(votes: &[Vote]) -> Self {
        let votes = distinct(votes);
        let mut buy = Decimal::ZERO;
        let mut sell = Decimal::ZERO;
        let mut total_weight = Decimal::ZERO;

        for vote in &votes {
            if vote.confidence.is_sign_positive() && !vote.confidence.is_zero() {
                buy += vote.confidence * vote.weight;
            } else if vote.confidence.is_sign_negative() {
                sell += vote.confidence.abs() * vote.weight;
            }
            total_weight += vote.weight;
        }

        let net_weight = if total_weight.is_zero() {
            Decimal::ZERO
        } else {
            (buy - sell) / total_weight
        };

        Self { buy, sell, total_weight, net_weight, voters: votes.len() }
    }

    /// Normalized magnitude of agreement, 0..1.
    pub fn strength(&self) -> Decimal {
        (self.net_weight.abs() / dec!(100)).min(Decimal::ONE)
    }
}

/// Reduces one (symbol, cycle)'s votes into at most one ensemble signal.
///
/// Aggregation is a pure reduction: no state is kept between calls.
#[derive(Debug, Clone)]
pub struct ConsensusAggregator {
    settings: ConsensusSettings,
}

impl ConsensusAggregator {
    pub fn new(settings: ConsensusSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ConsensusSettings {
        &self.settings
    }

    /// Aggregates `votes` into an `EnsembleSignal` priced at `price` with suggested `size`.
    ///
    /// Rejects when fewer than `min_votes` distinct strategies voted, when the
    /// weights cancel exactly, or when the consensus strength is below
    /// `min_strength`. A strength exactly at the threshold is accepted.
    pub fn aggregate(
        &self,
        symbol: &str,
        votes: &[Vote],
        conditions: Option<&MarketConditions>,
        price: Decimal,
        size: Decimal,
    ) -> Result<EnsembleSignal, ConsensusError> {
        if price <= Decimal::ZERO || size <= Decimal::ZERO {
            return Err(ConsensusError::InvalidInput(format!(
                "price {} and size {} must be positive",
                price, size
            )));
        }

        let votes: Vec<Vote> = distinct(votes).into_iter().cloned().collect();
        let tally = Tally::of(&votes);
        if tally.voters < self.settings.min_votes {
            return Err(ConsensusError::TooFewVoters {
                voters: tally.voters,
                required: self.settings.min_votes,
            });
        }
        if tally.total_weight.is_zero() {
            return Err(ConsensusError::ZeroWeight);
        }
        if tally.net_weight.is_zero() {
            return Err(ConsensusError::Deadlock);
        }

        let strength = tally.strength();
        if strength < self.settings.min_strength {
            return Err(ConsensusError::WeakConsensus {
                strength,
                required: self.settings.min_strength,
            });
        }

        let side = if tally.net_weight.is_sign_positive() { Side::Buy } else { Side::Sell };
        let confidence = (strength * dec!(100)).min(self.settings.max_confidence);

        Ok(EnsembleSignal {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            side,
            price,
            size,
            confidence,
            consensus_strength: strength,
            reasoning: reasoning(side, &tally, &votes, conditions),
            votes,
            emitted_at: Utc::now(),
        })
    }
}

fn reasoning(side: Side, tally: &Tally, votes: &[Vote], conditions: Option<&MarketConditions>) -> String {
    let agreeing: BTreeSet<StrategyKind> = votes
        .iter()
        .filter(|v| v.direction == side)
        .map(|v| v.strategy_kind)
        .collect();
    let dissenting: BTreeSet<StrategyKind> = votes
        .iter()
        .filter(|v| v.direction != side)
        .map(|v| v.strategy_kind)
        .collect();

    let join = |kinds: &BTreeSet<StrategyKind>| {
        kinds.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ")
    };

    let mut text = format!(
        "{} consensus {:.2} from {} strategies ({})",
        side,
        tally.strength(),
        tally.voters,
        join(&agreeing)
    );
    if !dissenting.is_empty() {
        text.push_str(&format!("; dissent: {}", join(&dissenting)));
    }
    if let Some(c) = conditions {
        text.push_str(&format!(
            "; market {} with {:?} volatility, {:?} volume, sentiment {}",
            c.trend, c.volatility, c.volume, c.sentiment
        ));
    }
    text
}
