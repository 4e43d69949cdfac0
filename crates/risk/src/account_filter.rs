use crate::error::RiskError;
use crate::{RiskDecision, RiskFilter};
use core_types::{Account, EnsembleSignal};
use rust_decimal::{Decimal, RoundingStrategy};

/// Largest scale a `Decimal` can carry.
const MAX_SCALE: u32 = 28;

/// The per-account gate between a shared signal stream and execution.
///
/// Each account sets its own confidence bar, risk multiplier and position cap,
/// so one signal can be taken at different sizes, or not at all, by different
/// accounts. The decision is deterministic given the account snapshot and the
/// signal.
#[derive(Debug, Clone)]
pub struct AccountRiskFilter {
    /// Decimal places sizes are truncated to.
    size_scale: u32,
}

impl Default for AccountRiskFilter {
    fn default() -> Self {
        Self { size_scale: 8 }
    }
}

impl AccountRiskFilter {
    pub fn new(size_scale: u32) -> Result<Self, RiskError> {
        if size_scale > MAX_SCALE {
            return Err(RiskError::InvalidParameters(format!(
                "size_scale must be at most {}",
                MAX_SCALE
            )));
        }
        Ok(Self { size_scale })
    }
}

impl RiskFilter for AccountRiskFilter {
    fn accept(&self, account: &Account, signal: &EnsembleSignal) -> RiskDecision {
        if !account.is_active() {
            return RiskDecision::reject(format!("account status is {}", account.status.as_str()));
        }
        if signal.confidence < account.confidence_threshold {
            return RiskDecision::reject(format!(
                "signal confidence {} is below the account threshold {}",
                signal.confidence, account.confidence_threshold
            ));
        }
        if signal.price <= Decimal::ZERO {
            return RiskDecision::reject(format!("signal price {} is not positive", signal.price));
        }

        let requested = signal.size * account.risk_multiplier;
        let cap = account.max_position_value / signal.price;
        let size = requested
            .min(cap)
            .round_dp_with_strategy(self.size_scale, RoundingStrategy::ToZero);

        if size <= Decimal::ZERO {
            return RiskDecision::reject(format!(
                "position size rounds to zero (requested {}, cap {})",
                requested, cap
            ));
        }

        if size < requested {
            tracing::debug!(
                account_id = %account.id,
                requested = %requested,
                size = %size,
                "Position size clamped by max_position_value."
            );
        }
        RiskDecision::accept(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use core_types::{AccountStatus, Side};
    use rust_decimal_macros::dec;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn account() -> Account {
        Account {
            id: Uuid::new_v4(),
            name: "alice".to_string(),
            balance: dec!(10000),
            risk_multiplier: dec!(1),
            confidence_threshold: dec!(60),
            max_position_value: dec!(2000),
            status: AccountStatus::Active,
            symbols: BTreeSet::from(["BTCUSDT".to_string()]),
        }
    }

    fn signal(confidence: Decimal, price: Decimal, size: Decimal) -> EnsembleSignal {
        EnsembleSignal {
            id: Uuid::new_v4(),
            symbol: "BTCUSDT".to_string(),
            side: Side::Buy,
            price,
            size,
            confidence,
            consensus_strength: confidence / dec!(100),
            votes: vec![],
            reasoning: String::new(),
            emitted_at: Utc::now(),
        }
    }

    #[test]
    fn size_is_clamped_to_the_position_cap() {
        let decision = AccountRiskFilter::default().accept(&account(), &signal(dec!(70), dec!(50000), dec!(1)));
        assert!(decision.accept);
        assert_eq!(decision.size, dec!(0.04));
    }

    #[test]
    fn risk_multiplier_scales_the_suggested_size() {
        let mut cautious = account();
        cautious.risk_multiplier = dec!(0.5);
        let decision = AccountRiskFilter::default().accept(&cautious, &signal(dec!(70), dec!(100), dec!(10)));
        assert!(decision.accept);
        assert_eq!(decision.size, dec!(5));
    }

    #[test]
    fn stricter_accounts_skip_weaker_signals() {
        let filter = AccountRiskFilter::default();
        let decision = filter.accept(&account(), &signal(dec!(59.9), dec!(100), dec!(1)));
        assert!(!decision.accept);
        assert!(decision.reason.unwrap().contains("below the account threshold"));

        assert!(filter.accept(&account(), &signal(dec!(60), dec!(100), dec!(1))).accept);
    }

    #[test]
    fn inactive_accounts_are_rejected() {
        let mut suspended = account();
        suspended.status = AccountStatus::Suspended;
        let decision = AccountRiskFilter::default().accept(&suspended, &signal(dec!(90), dec!(100), dec!(1)));
        assert!(!decision.accept);
        assert_eq!(decision.size, Decimal::ZERO);
    }

    #[test]
    fn dust_sizes_are_rejected() {
        let filter = AccountRiskFilter::new(2).unwrap();
        let mut tiny = account();
        tiny.max_position_value = dec!(1);
        let decision = filter.accept(&tiny, &signal(dec!(90), dec!(50000), dec!(1)));
        assert!(!decision.accept);
    }

    #[test]
    fn scale_beyond_decimal_precision_is_invalid() {
        assert!(AccountRiskFilter::new(29).is_err());
    }
}
