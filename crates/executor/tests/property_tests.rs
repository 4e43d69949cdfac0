//! Property tests for paper-fill accounting.
//!
//! Any sequence of buy and sell signals, filled or rejected, leaves the
//! account's balance non-negative and equal to the starting balance plus the
//! balance deltas of the fills that went through.

use alerter::LogNotifier;
use chrono::Utc;
use configuration::ExecutionSettings;
use core_types::{Account, AccountStatus, EnsembleSignal, ExecutionOutcome, Side};
use database::{AccountStore, InMemoryAuditLog, InMemoryStore};
use events::SignalBus;
use executor::{ExecutionCoordinator, Executor};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_balance() -> impl Strategy<Value = Decimal> {
    (100i64..=50_000).prop_map(Decimal::from)
}

/// (side, size, price): sizes in 0.01..2.00, prices in 10..60000.
fn arb_order() -> impl Strategy<Value = (Side, Decimal, Decimal)> {
    (
        prop_oneof![Just(Side::Buy), Just(Side::Sell)],
        (1i64..=200).prop_map(|s| Decimal::new(s, 2)),
        (10i64..=60_000).prop_map(Decimal::from),
    )
}

fn account(balance: Decimal) -> Account {
    Account {
        id: Uuid::new_v4(),
        name: "alice".to_string(),
        balance,
        risk_multiplier: dec!(1),
        confidence_threshold: dec!(60),
        max_position_value: dec!(1000000),
        status: AccountStatus::Active,
        symbols: BTreeSet::from(["BTCUSDT".to_string()]),
    }
}

fn signal(side: Side, price: Decimal, size: Decimal) -> EnsembleSignal {
    EnsembleSignal {
        id: Uuid::new_v4(),
        symbol: "BTCUSDT".to_string(),
        side,
        price,
        size,
        confidence: dec!(80),
        consensus_strength: dec!(0.8),
        votes: vec![],
        reasoning: "generated".to_string(),
        emitted_at: Utc::now(),
    }
}

// ── Balance accounting ───────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Balance never goes negative and always reconciles with the fills.
    #[test]
    fn balance_reconciles_with_filled_deltas(
        initial in arb_balance(),
        orders in prop::collection::vec(arb_order(), 1..20),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let (final_balance, filled_delta, holding, lowest) = runtime.block_on(async {
            let alice = account(initial);
            let audit = Arc::new(InMemoryAuditLog::new());
            let store = Arc::new(InMemoryStore::new(vec![], vec![alice.clone()], audit.clone()));
            let coordinator = ExecutionCoordinator::new(
                store.clone(),
                store.clone(),
                audit,
                Arc::new(LogNotifier),
                SignalBus::default(),
                ExecutionSettings::default(),
            );

            let mut filled_delta = Decimal::ZERO;
            let mut lowest = initial;
            for (side, size, price) in orders {
                let record = coordinator.execute(&alice, &signal(side, price, size), size).await;
                if record.outcome == ExecutionOutcome::Filled {
                    filled_delta += record.balance_delta();
                } else {
                    assert_eq!(record.balance_delta(), Decimal::ZERO);
                }
                lowest = lowest.min(record.balance_after);
            }

            let final_balance = store.get_account(alice.id).await.unwrap().balance;
            let holding = store.holding(alice.id, "BTCUSDT").await.unwrap();
            (final_balance, filled_delta, holding, lowest)
        });

        prop_assert!(final_balance >= Decimal::ZERO);
        prop_assert!(lowest >= Decimal::ZERO);
        prop_assert!(holding >= Decimal::ZERO);
        prop_assert_eq!(final_balance, initial + filled_delta);
    }
}
