use crate::error::DbError;
use crate::seed::{account_from_settings, strategy_from_settings};
use crate::{AccountStore, AuditRecorder, ExecutionJournal, StrategyStore, adjusted_weight};
use async_trait::async_trait;
use configuration::Config;
use core_types::{Account, ExecutionRecord, Fill, Side, Strategy, StrategyStatus};
use events::{AuditEvent, ExecutionAttempted};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct State {
    accounts: HashMap<Uuid, Account>,
    strategies: HashMap<Uuid, Strategy>,
    holdings: HashMap<(Uuid, String), Decimal>,
    journal: HashMap<(Uuid, Uuid), ExecutionRecord>,
}

/// A process-local store behind a single `RwLock`.
///
/// One lock guards every table, which is what makes `apply_fill` atomic: the
/// balance check, the audit write, the holding update and the journal append
/// all happen under the same write guard. Fills are audited through `audit`
/// before anything is committed.
pub struct InMemoryStore {
    state: RwLock<State>,
    audit: Arc<dyn AuditRecorder>,
}

impl InMemoryStore {
    pub fn new(strategies: Vec<Strategy>, accounts: Vec<Account>, audit: Arc<dyn AuditRecorder>) -> Self {
        let state = State {
            accounts: accounts.into_iter().map(|a| (a.id, a)).collect(),
            strategies: strategies.into_iter().map(|s| (s.id, s)).collect(),
            ..State::default()
        };
        Self {
            state: RwLock::new(state),
            audit,
        }
    }

    pub fn from_config(config: &Config, audit: Arc<dyn AuditRecorder>) -> Self {
        Self::new(
            config.strategies.iter().map(strategy_from_settings).collect(),
            config.accounts.iter().map(account_from_settings).collect(),
            audit,
        )
    }

    pub async fn insert_account(&self, account: Account) {
        self.state.write().await.accounts.insert(account.id, account);
    }

    pub async fn insert_strategy(&self, strategy: Strategy) {
        self.state.write().await.strategies.insert(strategy.id, strategy);
    }

    pub async fn set_holding(&self, account_id: Uuid, symbol: &str, quantity: Decimal) {
        self.state
            .write()
            .await
            .holdings
            .insert((account_id, symbol.to_string()), quantity);
    }

    pub async fn accounts(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = self.state.read().await.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.name.cmp(&b.name));
        accounts
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn get_account(&self, id: Uuid) -> Result<Account, DbError> {
        self.state
            .read()
            .await
            .accounts
            .get(&id)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("account {id}")))
    }

    async fn get_active_accounts(&self, symbol: &str) -> Result<Vec<Account>, DbError> {
        let state = self.state.read().await;
        let mut accounts: Vec<Account> = state
            .accounts
            .values()
            .filter(|a| a.is_active() && a.symbols.contains(symbol))
            .cloned()
            .collect();
        accounts.sort_by_key(|a| a.id);
        Ok(accounts)
    }

    async fn holding(&self, account_id: Uuid, symbol: &str) -> Result<Decimal, DbError> {
        let state = self.state.read().await;
        Ok(state
            .holdings
            .get(&(account_id, symbol.to_string()))
            .copied()
            .unwrap_or(Decimal::ZERO))
    }

    async fn apply_fill(&self, fill: &Fill, record: &ExecutionRecord) -> Result<(), DbError> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let key = (record.account_id, record.signal_id);
        if state.journal.contains_key(&key) {
            return Err(DbError::DuplicateExecution {
                account_id: record.account_id,
                signal_id: record.signal_id,
            });
        }

        let account = state
            .accounts
            .get_mut(&fill.account_id)
            .ok_or_else(|| DbError::NotFound(format!("account {}", fill.account_id)))?;
        if account.balance != fill.balance_before {
            return Err(DbError::Conflict(format!(
                "balance of account {} is {}, expected {}",
                fill.account_id, account.balance, fill.balance_before
            )));
        }
        if fill.balance_after < Decimal::ZERO {
            return Err(DbError::Conflict(format!(
                "balance of account {} would become {}",
                fill.account_id, fill.balance_after
            )));
        }

        let held = state
            .holdings
            .get(&(fill.account_id, fill.symbol.clone()))
            .copied()
            .unwrap_or(Decimal::ZERO);
        let new_holding = match fill.side {
            Side::Buy => held + fill.quantity,
            Side::Sell => held - fill.quantity,
        };
        if new_holding < Decimal::ZERO {
            return Err(DbError::Conflict(format!(
                "account {} holds {} {}, cannot sell {}",
                fill.account_id, held, fill.symbol, fill.quantity
            )));
        }

        let event = AuditEvent::ExecutionAttempted(ExecutionAttempted { record: record.clone() });
        self.audit.record(&event).await?;

        // Audited; commit.
        account.balance = fill.balance_after;
        state
            .holdings
            .insert((fill.account_id, fill.symbol.clone()), new_holding);
        state.journal.insert(key, record.clone());
        Ok(())
    }
}

#[async_trait]
impl StrategyStore for InMemoryStore {
    async fn get_active_strategies(&self, symbol: &str) -> Result<Vec<Strategy>, DbError> {
        let state = self.state.read().await;
        let mut strategies: Vec<Strategy> = state
            .strategies
            .values()
            .filter(|s| s.is_active() && s.targets(symbol))
            .cloned()
            .collect();
        strategies.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(strategies)
    }

    async fn set_status(&self, id: Uuid, status: StrategyStatus) -> Result<(), DbError> {
        let mut state = self.state.write().await;
        let strategy = state
            .strategies
            .get_mut(&id)
            .ok_or_else(|| DbError::NotFound(format!("strategy {id}")))?;
        strategy.status = status;
        Ok(())
    }

    async fn record_performance(&self, id: Uuid, won: bool) -> Result<Strategy, DbError> {
        let mut state = self.state.write().await;
        let strategy = state
            .strategies
            .get_mut(&id)
            .ok_or_else(|| DbError::NotFound(format!("strategy {id}")))?;
        strategy.performance_weight = adjusted_weight(strategy.performance_weight, won);
        strategy.total_trades += 1;
        Ok(strategy.clone())
    }
}

#[async_trait]
impl ExecutionJournal for InMemoryStore {
    async fn find(&self, account_id: Uuid, signal_id: Uuid) -> Result<Option<ExecutionRecord>, DbError> {
        Ok(self.state.read().await.journal.get(&(account_id, signal_id)).cloned())
    }

    async fn insert(&self, record: &ExecutionRecord) -> Result<(), DbError> {
        let mut state = self.state.write().await;
        let key = (record.account_id, record.signal_id);
        if state.journal.contains_key(&key) {
            return Err(DbError::DuplicateExecution {
                account_id: record.account_id,
                signal_id: record.signal_id,
            });
        }
        state.journal.insert(key, record.clone());
        Ok(())
    }

    async fn records_for(&self, account_id: Uuid) -> Result<Vec<ExecutionRecord>, DbError> {
        let state = self.state.read().await;
        let mut records: Vec<ExecutionRecord> = state
            .journal
            .values()
            .filter(|r| r.account_id == account_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.timestamp);
        Ok(records)
    }
}
