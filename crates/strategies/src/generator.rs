use crate::error::StrategyError;
use crate::model::ConfidenceModel;
use configuration::VotingSettings;
use core_types::{MarketConditions, Side, Strategy, Vote};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Produces one strategy's vote for one symbol and one market snapshot.
///
/// Evaluation is a pure function of the snapshot and the strategy's current
/// state; the generator holds no mutable state and can be shared freely
/// across the tasks of a cycle.
#[derive(Clone)]
pub struct VoteGenerator {
    model: Arc<dyn ConfidenceModel>,
    settings: VotingSettings,
}

impl VoteGenerator {
    pub fn new(model: Arc<dyn ConfidenceModel>, settings: VotingSettings) -> Result<Self, StrategyError> {
        if settings.track_record_trades == 0 {
            return Err(StrategyError::InvalidParameters(
                "track_record_trades must be positive".to_string(),
            ));
        }
        if settings.max_track_record_factor < Decimal::ONE {
            return Err(StrategyError::InvalidParameters(
                "max_track_record_factor must be at least 1".to_string(),
            ));
        }
        Ok(Self { model, settings })
    }

    /// Evaluates `strategy` against `conditions`.
    ///
    /// Returns `None` when the strategy is not active, is not bound to `symbol`,
    /// or is not confident enough to act: |confidence| below the global vote
    /// floor or below the strategy's own, possibly stricter, threshold.
    pub fn evaluate(&self, strategy: &Strategy, symbol: &str, conditions: &MarketConditions) -> Option<Vote> {
        if !strategy.is_active() || !strategy.targets(symbol) || conditions.symbol != symbol {
            return None;
        }

        let confidence = self.model.confidence(strategy.kind, conditions);
        let bar = self.settings.min_vote_confidence.max(strategy.confidence_threshold);
        if confidence.is_zero() || confidence.abs() < bar {
            tracing::debug!(
                strategy = %strategy.name,
                symbol = %symbol,
                confidence = %confidence,
                "Abstaining: not confident enough to act."
            );
            return None;
        }

        let direction = if confidence.is_sign_positive() { Side::Buy } else { Side::Sell };
        let rationale = format!(
            "{} on {}: trend {}, sentiment {}, volume {:?}, volatility {:?} -> {:+}",
            strategy.kind,
            symbol,
            conditions.trend,
            conditions.sentiment,
            conditions.volume,
            conditions.volatility,
            confidence
        );

        Some(Vote {
            strategy_id: strategy.id,
            strategy_kind: strategy.kind,
            direction,
            confidence,
            weight: self.weight(strategy),
            rationale,
        })
    }

    /// `performance_weight × (1 + total_trades / track_record_trades)`, with the
    /// track-record factor capped so history can never dominate the opinion.
    pub fn weight(&self, strategy: &Strategy) -> Decimal {
        let trades = Decimal::from(strategy.total_trades);
        let scale = Decimal::from(self.settings.track_record_trades);
        let factor = (Decimal::ONE + trades / scale).min(self.settings.max_track_record_factor);
        (strategy.performance_weight * factor).max(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FixedConfidence, SensitivityModel};
    use core_types::{Level, StrategyKind, StrategyStatus, Trend};
    use rust_decimal_macros::dec;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn strategy(kind: StrategyKind) -> Strategy {
        Strategy {
            id: Uuid::new_v4(),
            name: format!("{kind}-1"),
            kind,
            target_symbols: BTreeSet::from(["BTCUSDT".to_string()]),
            status: StrategyStatus::Active,
            confidence_threshold: dec!(30),
            performance_weight: dec!(1),
            total_trades: 0,
        }
    }

    fn bullish() -> MarketConditions {
        MarketConditions::new("BTCUSDT", Level::Medium, Trend::Bullish, Level::Medium, dec!(0)).unwrap()
    }

    fn generator(model: impl ConfidenceModel + 'static) -> VoteGenerator {
        VoteGenerator::new(Arc::new(model), VotingSettings::default()).unwrap()
    }

    #[test]
    fn confident_strategy_votes_in_the_direction_of_its_confidence() {
        let generator = generator(SensitivityModel::default());

        let trend = generator.evaluate(&strategy(StrategyKind::TrendFollowing), "BTCUSDT", &bullish()).unwrap();
        assert_eq!(trend.direction, Side::Buy);
        assert_eq!(trend.confidence, dec!(80));
        assert_eq!(trend.weight, dec!(1));
        assert!(trend.rationale.contains("trend_following"));

        let reversion = generator.evaluate(&strategy(StrategyKind::MeanReversion), "BTCUSDT", &bullish()).unwrap();
        assert_eq!(reversion.direction, Side::Sell);
        assert_eq!(reversion.confidence, dec!(-70));
    }

    #[test]
    fn weak_confidence_abstains() {
        let generator = generator(FixedConfidence::new().with(StrategyKind::Momentum, dec!(29.99)));
        assert!(generator.evaluate(&strategy(StrategyKind::Momentum), "BTCUSDT", &bullish()).is_none());

        let generator = generator_at(dec!(-30));
        assert!(generator.evaluate(&strategy(StrategyKind::Momentum), "BTCUSDT", &bullish()).is_some());
    }

    fn generator_at(confidence: Decimal) -> VoteGenerator {
        generator(FixedConfidence::new().with(StrategyKind::Momentum, confidence))
    }

    #[test]
    fn stricter_strategy_threshold_wins_over_the_floor() {
        let generator = generator_at(dec!(50));
        let mut picky = strategy(StrategyKind::Momentum);
        picky.confidence_threshold = dec!(60);
        assert!(generator.evaluate(&picky, "BTCUSDT", &bullish()).is_none());
    }

    #[test]
    fn paused_or_unbound_strategies_do_not_vote() {
        let generator = generator_at(dec!(90));
        let mut paused = strategy(StrategyKind::Momentum);
        paused.status = StrategyStatus::Paused;
        assert!(generator.evaluate(&paused, "BTCUSDT", &bullish()).is_none());

        let eth = MarketConditions::new("ETHUSDT", Level::Medium, Trend::Bullish, Level::Medium, dec!(0)).unwrap();
        assert!(generator.evaluate(&strategy(StrategyKind::Momentum), "ETHUSDT", &eth).is_none());
    }

    #[test]
    fn track_record_raises_weight_up_to_the_cap() {
        let generator = generator_at(dec!(90));
        let mut veteran = strategy(StrategyKind::Momentum);
        veteran.performance_weight = dec!(1.5);

        veteran.total_trades = 500;
        assert_eq!(generator.weight(&veteran), dec!(2.25));

        veteran.total_trades = 1_000_000;
        assert_eq!(generator.weight(&veteran), dec!(3.0));
    }
}
