use crate::error::ExecutorError;
use crate::locks::AccountLocks;
use crate::settlement::settle;
use crate::Executor;
use alerter::NotificationSink;
use async_trait::async_trait;
use chrono::Utc;
use configuration::ExecutionSettings;
use core_types::{Account, EnsembleSignal, ExecutionOutcome, ExecutionRecord, Side};
use database::{AccountStore, AuditRecorder, ExecutionJournal};
use events::{AuditEvent, ExecutionAttempted, SignalBus};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Turns accepted (account, signal) pairs into paper fills.
///
/// For each attempt the coordinator takes the account's lock, re-reads the
/// account, checks the journal and the preconditions, and applies the fill
/// through `AccountStore::apply_fill`, which audits the fill in the same
/// atomic write. Any other outcome is audited here before `execute` returns.
/// The record is then published and handed to the notification sink without
/// waiting.
pub struct ExecutionCoordinator {
    accounts: Arc<dyn AccountStore>,
    journal: Arc<dyn ExecutionJournal>,
    audit: Arc<dyn AuditRecorder>,
    notifier: Arc<dyn NotificationSink>,
    bus: SignalBus,
    settings: ExecutionSettings,
    locks: AccountLocks,
}

impl ExecutionCoordinator {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        journal: Arc<dyn ExecutionJournal>,
        audit: Arc<dyn AuditRecorder>,
        notifier: Arc<dyn NotificationSink>,
        bus: SignalBus,
        settings: ExecutionSettings,
    ) -> Self {
        Self {
            accounts,
            journal,
            audit,
            notifier,
            bus,
            settings,
            locks: AccountLocks::new(),
        }
    }

    /// The lock registry, shared with anything else that mutates accounts.
    pub fn locks(&self) -> &AccountLocks {
        &self.locks
    }

    /// Runs the checks and the fill. Must be called with the account lock held.
    async fn attempt(&self, snapshot: &Account, signal: &EnsembleSignal, size: Decimal) -> ExecutionRecord {
        let account = match self.accounts.get_account(snapshot.id).await {
            Ok(account) => account,
            Err(e) => return unfilled(snapshot, signal, size, &ExecutorError::from(e)),
        };

        match self.journal.find(account.id, signal.id).await {
            // A repeat delivery: report it, but the journal keeps the first record.
            Ok(Some(_)) => {
                let e = ExecutorError::DuplicateSignal {
                    account_id: account.id,
                    signal_id: signal.id,
                };
                return unfilled(&account, signal, size, &e);
            }
            Ok(None) => {}
            Err(e) => return unfilled(&account, signal, size, &ExecutorError::from(e)),
        }

        match self.fill(&account, signal, size).await {
            Ok(record) => record,
            Err(e) => {
                let record = unfilled(&account, signal, size, &e);
                if e.outcome() == ExecutionOutcome::Rejected
                    && !matches!(e, ExecutorError::DuplicateSignal { .. })
                {
                    if let Err(db) = self.journal.insert(&record).await {
                        tracing::warn!(account_id = %account.id, signal_id = %signal.id, error = %db, "Failed to journal rejected execution");
                    }
                }
                record
            }
        }
    }

    async fn fill(&self, account: &Account, signal: &EnsembleSignal, size: Decimal) -> Result<ExecutionRecord, ExecutorError> {
        if !account.is_active() {
            return Err(ExecutorError::AccountInactive(account.status.as_str()));
        }

        let now = Utc::now();
        let validity = self.settings.signal_validity();
        if signal.is_stale(now, validity) {
            return Err(ExecutorError::StaleSignal {
                age_secs: (now - signal.emitted_at).num_seconds(),
                validity_secs: validity.num_seconds(),
            });
        }

        let held = match signal.side {
            Side::Sell => self.accounts.holding(account.id, &signal.symbol).await?,
            Side::Buy => Decimal::ZERO,
        };

        let settlement = settle(
            account,
            &signal.symbol,
            signal.side,
            size,
            signal.price,
            self.settings.fee_pct,
            held,
        )?;

        let record = ExecutionRecord {
            id: Uuid::new_v4(),
            account_id: account.id,
            signal_id: signal.id,
            symbol: signal.symbol.clone(),
            side: signal.side,
            requested_size: size,
            filled_size: size,
            fill_price: signal.price,
            fee: settlement.fee,
            balance_before: settlement.fill.balance_before,
            balance_after: settlement.fill.balance_after,
            outcome: ExecutionOutcome::Filled,
            reason: None,
            timestamp: Utc::now(),
        };

        self.accounts.apply_fill(&settlement.fill, &record).await?;
        Ok(record)
    }

    fn deliver(&self, record: &ExecutionRecord) {
        self.bus.publish_execution(record);

        let notifier = Arc::clone(&self.notifier);
        let record = record.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.notify(record.account_id, &record).await {
                tracing::warn!(account_id = %record.account_id, error = %e, "Failed to deliver execution notification");
            }
        });
    }
}

#[async_trait]
impl Executor for ExecutionCoordinator {
    async fn execute(&self, account: &Account, signal: &EnsembleSignal, size: Decimal) -> ExecutionRecord {
        let guard = self.locks.acquire(account.id, self.settings.lock_timeout()).await;
        let record = match &guard {
            Ok(_) => self.attempt(account, signal, size).await,
            Err(e) => unfilled(account, signal, size, e),
        };

        // Fills were audited by the store. Audit the rest while still holding
        // the lock so the trail is ordered per account.
        if !record.is_filled() {
            let event = AuditEvent::ExecutionAttempted(ExecutionAttempted { record: record.clone() });
            if let Err(e) = self.audit.record(&event).await {
                tracing::error!(account_id = %account.id, signal_id = %signal.id, error = %e, "Failed to audit execution attempt");
            }
        }
        drop(guard);

        match record.outcome {
            ExecutionOutcome::Filled => tracing::info!(
                account_id = %account.id,
                signal_id = %signal.id,
                side = %record.side,
                size = %record.filled_size,
                price = %record.fill_price,
                balance = %record.balance_after,
                "Execution filled"
            ),
            ExecutionOutcome::Rejected => tracing::info!(
                account_id = %account.id,
                signal_id = %signal.id,
                reason = record.reason.as_deref().unwrap_or_default(),
                "Execution rejected"
            ),
            ExecutionOutcome::Error => tracing::warn!(
                account_id = %account.id,
                signal_id = %signal.id,
                reason = record.reason.as_deref().unwrap_or_default(),
                "Execution failed"
            ),
        }

        self.deliver(&record);
        record
    }
}

/// A record for an attempt that changed nothing.
fn unfilled(account: &Account, signal: &EnsembleSignal, size: Decimal, error: &ExecutorError) -> ExecutionRecord {
    ExecutionRecord {
        id: Uuid::new_v4(),
        account_id: account.id,
        signal_id: signal.id,
        symbol: signal.symbol.clone(),
        side: signal.side,
        requested_size: size,
        filled_size: Decimal::ZERO,
        fill_price: signal.price,
        fee: Decimal::ZERO,
        balance_before: account.balance,
        balance_after: account.balance,
        outcome: error.outcome(),
        reason: Some(error.to_string()),
        timestamp: Utc::now(),
    }
}
