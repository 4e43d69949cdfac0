//! Builds domain entities from the operator's configuration.
//!
//! Entities without an explicit `id` get a name-derived UUIDv5, so the same
//! configuration always yields the same ids and re-seeding a database is a no-op.

use configuration::{AccountSettings, StrategySettings};
use core_types::{Account, Strategy};
use uuid::Uuid;

const STRATEGY_NAMESPACE: &str = "quorum.strategy.";
const ACCOUNT_NAMESPACE: &str = "quorum.account.";

fn stable_id(prefix: &str, name: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("{prefix}{name}").as_bytes())
}

pub fn strategy_from_settings(settings: &StrategySettings) -> Strategy {
    Strategy {
        id: settings
            .id
            .unwrap_or_else(|| stable_id(STRATEGY_NAMESPACE, &settings.name)),
        name: settings.name.clone(),
        kind: settings.kind,
        target_symbols: settings.symbols.iter().cloned().collect(),
        status: settings.status,
        confidence_threshold: settings.confidence_threshold,
        performance_weight: settings.performance_weight,
        total_trades: settings.total_trades,
    }
}

pub fn account_from_settings(settings: &AccountSettings) -> Account {
    Account {
        id: settings
            .id
            .unwrap_or_else(|| stable_id(ACCOUNT_NAMESPACE, &settings.name)),
        name: settings.name.clone(),
        balance: settings.balance,
        risk_multiplier: settings.risk_multiplier,
        confidence_threshold: settings.confidence_threshold,
        max_position_value: settings.max_position_value,
        status: settings.status,
        symbols: settings.symbols.iter().cloned().collect(),
    }
}
