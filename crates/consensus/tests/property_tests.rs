//! Property tests for the aggregator's rejection rules.
//!
//! 1. Quorum: fewer than two distinct strategies never produce a signal,
//!    however many times they vote.
//! 2. Strength: a vote set whose tally is below `min_strength` is rejected,
//!    and every emitted signal is at least that strong.

use configuration::ConsensusSettings;
use consensus::{ConsensusAggregator, ConsensusError, Tally};
use core_types::{Side, StrategyKind, Vote};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_confidence() -> impl Strategy<Value = Decimal> {
    (-100i64..=100).prop_map(Decimal::from)
}

fn arb_weight() -> impl Strategy<Value = Decimal> {
    (10i64..=300).prop_map(|w| Decimal::new(w, 2))
}

fn vote(strategy_id: Uuid, confidence: Decimal, weight: Decimal) -> Vote {
    Vote {
        strategy_id,
        strategy_kind: StrategyKind::Momentum,
        direction: if confidence.is_sign_negative() { Side::Sell } else { Side::Buy },
        confidence,
        weight,
        rationale: String::new(),
    }
}

/// Votes from 2..6 distinct strategies.
fn arb_vote_set() -> impl Strategy<Value = Vec<Vote>> {
    prop::collection::vec((arb_confidence(), arb_weight()), 2..6).prop_map(|pairs| {
        pairs
            .into_iter()
            .map(|(confidence, weight)| vote(Uuid::new_v4(), confidence, weight))
            .collect()
    })
}

fn aggregate(votes: &[Vote]) -> Result<core_types::EnsembleSignal, ConsensusError> {
    ConsensusAggregator::new(ConsensusSettings::default()).aggregate("BTCUSDT", votes, None, dec!(50000), dec!(1))
}

// ── 1. Quorum ────────────────────────────────────────────────────────

proptest! {
    /// One strategy voting any number of times is still one voter.
    #[test]
    fn a_single_strategy_never_reaches_quorum(
        ballots in prop::collection::vec((arb_confidence(), arb_weight()), 0..8),
    ) {
        let strategy_id = Uuid::new_v4();
        let votes: Vec<Vote> = ballots
            .into_iter()
            .map(|(confidence, weight)| vote(strategy_id, confidence, weight))
            .collect();

        let result = aggregate(&votes);
        let is_too_few = matches!(result, Err(ConsensusError::TooFewVoters { voters, required: 2 }) if voters <= 1);
        prop_assert!(is_too_few, "expected TooFewVoters, got {:?}", result);
    }
}

// ── 2. Strength ──────────────────────────────────────────────────────

proptest! {
    /// Below-threshold strength is always rejected; emitted signals clear it.
    #[test]
    fn weak_tallies_never_emit(votes in arb_vote_set()) {
        let required = ConsensusSettings::default().min_strength;
        let strength = Tally::of(&votes).strength();

        let result = aggregate(&votes);
        if strength < required {
            prop_assert!(result.is_err(), "strength {} emitted {:?}", strength, result);
        }
        if let Ok(signal) = result {
            prop_assert!(signal.consensus_strength >= required);
            prop_assert_eq!(signal.consensus_strength, strength);
            prop_assert!(signal.confidence <= dec!(95));
        }
    }

    /// Repeating a strategy's vote never changes the outcome.
    #[test]
    fn repeated_votes_do_not_change_the_tally(votes in arb_vote_set(), repeats in 1usize..4) {
        let mut padded = votes.clone();
        for _ in 0..repeats {
            padded.push(votes[0].clone());
        }
        prop_assert_eq!(Tally::of(&padded), Tally::of(&votes));
    }
}
