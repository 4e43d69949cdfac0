//! # Quorum Core Types
//!
//! The shared vocabulary of the workspace: strategies, market snapshots, votes,
//! ensemble signals, accounts and execution records. Every other crate depends
//! on this one and this one depends on no workspace crate.

pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{AccountStatus, ExecutionOutcome, Level, Side, StrategyKind, StrategyStatus, Trend};
pub use error::CoreError;
pub use structs::{
    Account, EnsembleSignal, ExecutionRecord, Fill, MarketConditions, Strategy, Vote,
};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[test]
    fn market_conditions_reject_out_of_range_sentiment() {
        let result = MarketConditions::new("BTCUSDT", Level::High, Trend::Bullish, Level::Low, dec!(1.5));
        assert!(matches!(result, Err(CoreError::InvalidInput(field, _)) if field == "sentiment"));
    }

    #[test]
    fn signal_staleness_uses_the_validity_window() {
        let signal = EnsembleSignal {
            id: Uuid::new_v4(),
            symbol: "BTCUSDT".to_string(),
            side: Side::Buy,
            price: dec!(100),
            size: dec!(1),
            confidence: dec!(70),
            consensus_strength: dec!(0.7),
            votes: vec![],
            reasoning: String::new(),
            emitted_at: Utc::now() - Duration::seconds(31),
        };
        assert!(signal.is_stale(Utc::now(), Duration::seconds(30)));
        assert!(!signal.is_stale(Utc::now(), Duration::seconds(60)));
    }

    #[test]
    fn enums_parse_their_storage_names() {
        assert_eq!("mean_reversion".parse::<StrategyKind>(), Ok(StrategyKind::MeanReversion));
        assert_eq!(StrategyStatus::Paused.as_str().parse::<StrategyStatus>(), Ok(StrategyStatus::Paused));
        assert!(matches!(
            "hold".parse::<Side>(),
            Err(CoreError::UnknownVariant { kind: "side", .. })
        ));
    }
}
