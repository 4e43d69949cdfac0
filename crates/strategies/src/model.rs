use core_types::{MarketConditions, StrategyKind};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

/// Turns a market snapshot into a signed confidence (-100..100) for one kind of strategy.
///
/// This is the seam where real models plug in. Implementations must be pure:
/// the same kind and snapshot always yield the same confidence.
pub trait ConfidenceModel: Send + Sync {
    fn confidence(&self, kind: StrategyKind, conditions: &MarketConditions) -> Decimal;
}

/// How strongly one strategy kind responds to each condition dimension.
///
/// `trend` and `sentiment` are directional: they set the sign and base
/// magnitude of the opinion. `volume` and `volatility` are amplifiers: they
/// scale conviction up or down without changing direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sensitivity {
    pub trend: Decimal,
    pub sentiment: Decimal,
    pub volume: Decimal,
    pub volatility: Decimal,
}

/// The production confidence model: a per-kind sensitivity table.
#[derive(Debug, Clone)]
pub struct SensitivityModel {
    table: HashMap<StrategyKind, Sensitivity>,
}

impl Default for SensitivityModel {
    fn default() -> Self {
        let table = HashMap::from([
            (
                StrategyKind::TrendFollowing,
                Sensitivity { trend: dec!(0.8), sentiment: dec!(0.2), volume: dec!(0.25), volatility: dec!(-0.1) },
            ),
            // Fades the prevailing move, and loses conviction when the market is turbulent.
            (
                StrategyKind::MeanReversion,
                Sensitivity { trend: dec!(-0.7), sentiment: dec!(-0.3), volume: dec!(0), volatility: dec!(-0.3) },
            ),
            (
                StrategyKind::Momentum,
                Sensitivity { trend: dec!(0.5), sentiment: dec!(0.5), volume: dec!(0.3), volatility: dec!(0.1) },
            ),
            (
                StrategyKind::Sentiment,
                Sensitivity { trend: dec!(0), sentiment: dec!(1), volume: dec!(0.1), volatility: dec!(0) },
            ),
            (
                StrategyKind::VolatilityBreakout,
                Sensitivity { trend: dec!(0.6), sentiment: dec!(0.2), volume: dec!(0.3), volatility: dec!(0.4) },
            ),
        ]);
        Self { table }
    }
}

impl ConfidenceModel for SensitivityModel {
    fn confidence(&self, kind: StrategyKind, conditions: &MarketConditions) -> Decimal {
        let Some(s) = self.table.get(&kind) else {
            return Decimal::ZERO;
        };

        let direction = s.trend * conditions.trend.reading() + s.sentiment * conditions.sentiment;
        let conviction = (Decimal::ONE
            + s.volume * conditions.volume.reading()
            + s.volatility * conditions.volatility.reading())
        .max(Decimal::ZERO);

        (dec!(100) * direction * conviction)
            .clamp(dec!(-100), dec!(100))
            .round_dp(2)
    }
}

/// A deterministic stub that returns a scripted confidence per kind.
#[derive(Debug, Clone, Default)]
pub struct FixedConfidence {
    values: HashMap<StrategyKind, Decimal>,
}

impl FixedConfidence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: StrategyKind, confidence: Decimal) -> Self {
        self.values.insert(kind, confidence);
        self
    }
}

impl ConfidenceModel for FixedConfidence {
    fn confidence(&self, kind: StrategyKind, _conditions: &MarketConditions) -> Decimal {
        self.values.get(&kind).copied().unwrap_or(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{Level, Trend};

    fn conditions(trend: Trend, sentiment: Decimal, volume: Level, volatility: Level) -> MarketConditions {
        MarketConditions::new("BTCUSDT", volatility, trend, volume, sentiment).unwrap()
    }

    #[test]
    fn trend_following_reads_trend_directly() {
        let model = SensitivityModel::default();
        let bull = conditions(Trend::Bullish, dec!(0), Level::Medium, Level::Medium);
        let bear = conditions(Trend::Bearish, dec!(0), Level::Medium, Level::Medium);
        assert_eq!(model.confidence(StrategyKind::TrendFollowing, &bull), dec!(80));
        assert_eq!(model.confidence(StrategyKind::TrendFollowing, &bear), dec!(-80));
    }

    #[test]
    fn mean_reversion_reads_trend_inversely() {
        let model = SensitivityModel::default();
        let bull = conditions(Trend::Bullish, dec!(0), Level::Medium, Level::Medium);
        assert_eq!(model.confidence(StrategyKind::MeanReversion, &bull), dec!(-70));
    }

    #[test]
    fn sentiment_kind_reads_sentiment_only() {
        let model = SensitivityModel::default();
        let snapshot = conditions(Trend::Bearish, dec!(0.45), Level::Medium, Level::High);
        assert_eq!(model.confidence(StrategyKind::Sentiment, &snapshot), dec!(45));
    }

    #[test]
    fn amplifiers_scale_and_the_result_is_clamped() {
        let model = SensitivityModel::default();
        let snapshot = conditions(Trend::Bullish, dec!(0.4), Level::High, Level::Low);
        // 100 * (0.8 + 0.08) * (1 + 0.25 + 0.1) = 118.8, clamped.
        assert_eq!(model.confidence(StrategyKind::TrendFollowing, &snapshot), dec!(100));
        // 100 * (0.5 + 0.2) * (1 + 0.3 - 0.1) = 84
        assert_eq!(model.confidence(StrategyKind::Momentum, &snapshot), dec!(84));
    }
}
