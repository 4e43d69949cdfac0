use crate::error::ExecutorError;
use core_types::{Account, Fill, Side};
use rust_decimal::Decimal;

/// The computed effect of filling one order against an account.
///
/// Like the fee model, this is a pure calculation: nothing is mutated here.
/// The caller hands `fill` to the account store, which applies it atomically.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub fill: Fill,
    pub notional: Decimal,
    pub fee: Decimal,
}

/// Computes the balance and holding change for filling `size` units at `price`.
///
/// A buy spends `notional + fee` and must fit in the balance. A sell receives
/// `notional - fee` and must not exceed `held`.
pub fn settle(
    account: &Account,
    symbol: &str,
    side: Side,
    size: Decimal,
    price: Decimal,
    fee_pct: Decimal,
    held: Decimal,
) -> Result<Settlement, ExecutorError> {
    if size <= Decimal::ZERO {
        return Err(ExecutorError::InvalidOrder(format!("size {size} must be positive")));
    }
    if price <= Decimal::ZERO {
        return Err(ExecutorError::InvalidOrder(format!("price {price} must be positive")));
    }

    let notional = size * price;
    let fee = notional * fee_pct;

    // --- Cash Update ---
    // For a Buy, cash decreases by notional plus fee. For a Sell, it increases by notional less fee.
    let balance_after = match side {
        Side::Buy => {
            let required = notional + fee;
            if required > account.balance {
                return Err(ExecutorError::InsufficientCash {
                    required: required.to_string(),
                    available: account.balance.to_string(),
                });
            }
            account.balance - required
        }
        Side::Sell => {
            if size > held {
                return Err(ExecutorError::InsufficientHoldings {
                    symbol: symbol.to_string(),
                    requested: size.to_string(),
                    available: held.to_string(),
                });
            }
            account.balance + notional - fee
        }
    };

    Ok(Settlement {
        fill: Fill {
            account_id: account.id,
            symbol: symbol.to_string(),
            side,
            quantity: size,
            balance_before: account.balance,
            balance_after,
        },
        notional,
        fee,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::AccountStatus;
    use rust_decimal_macros::dec;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn account(balance: Decimal) -> Account {
        Account {
            id: Uuid::new_v4(),
            name: "alice".to_string(),
            balance,
            risk_multiplier: dec!(1),
            confidence_threshold: dec!(60),
            max_position_value: dec!(2000),
            status: AccountStatus::Active,
            symbols: BTreeSet::new(),
        }
    }

    #[test]
    fn buy_spends_notional_and_fee() {
        let s = settle(&account(dec!(10000)), "BTCUSDT", Side::Buy, dec!(0.04), dec!(50000), dec!(0.001), dec!(0)).unwrap();
        assert_eq!(s.notional, dec!(2000));
        assert_eq!(s.fee, dec!(2));
        assert_eq!(s.fill.balance_after, dec!(7998));
    }

    #[test]
    fn sell_receives_notional_less_fee() {
        let s = settle(&account(dec!(100)), "BTCUSDT", Side::Sell, dec!(0.01), dec!(50000), dec!(0.001), dec!(0.5)).unwrap();
        assert_eq!(s.fill.balance_after, dec!(100) + dec!(500) - dec!(0.5));
    }

    #[test]
    fn buy_must_cover_the_fee_too() {
        let err = settle(&account(dec!(2000)), "BTCUSDT", Side::Buy, dec!(0.04), dec!(50000), dec!(0.001), dec!(0)).unwrap_err();
        assert!(matches!(err, ExecutorError::InsufficientCash { .. }));

        let exact = settle(&account(dec!(2002)), "BTCUSDT", Side::Buy, dec!(0.04), dec!(50000), dec!(0.001), dec!(0)).unwrap();
        assert_eq!(exact.fill.balance_after, Decimal::ZERO);
    }

    #[test]
    fn sell_is_bounded_by_holdings() {
        let err = settle(&account(dec!(0)), "ETHUSDT", Side::Sell, dec!(2), dec!(3000), dec!(0), dec!(1.5)).unwrap_err();
        assert!(matches!(err, ExecutorError::InsufficientHoldings { .. }));
    }

    #[test]
    fn non_positive_inputs_are_invalid() {
        let a = account(dec!(100));
        assert!(matches!(
            settle(&a, "X", Side::Buy, dec!(0), dec!(1), dec!(0), dec!(0)),
            Err(ExecutorError::InvalidOrder(_))
        ));
        assert!(matches!(
            settle(&a, "X", Side::Buy, dec!(1), dec!(0), dec!(0), dec!(0)),
            Err(ExecutorError::InvalidOrder(_))
        ));
    }
}
