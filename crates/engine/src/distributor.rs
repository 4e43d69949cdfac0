use crate::error::EngineError;
use crate::ticker::jitter;
use core_types::{Account, EnsembleSignal, ExecutionRecord};
use database::AccountStore;
use executor::Executor;
use futures::future::join_all;
use risk::RiskFilter;
use std::sync::Arc;
use std::time::Duration;

/// Fans one ensemble signal out to every subscribed account.
///
/// Each account is handled in its own task after a small random delay. The
/// risk decision and the execution are per-account; a failure for one account
/// is logged and never affects the others.
#[derive(Clone)]
pub struct Distributor {
    accounts: Arc<dyn AccountStore>,
    risk: Arc<dyn RiskFilter>,
    executor: Arc<dyn Executor>,
    max_jitter: Duration,
}

impl Distributor {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        risk: Arc<dyn RiskFilter>,
        executor: Arc<dyn Executor>,
        max_jitter: Duration,
    ) -> Self {
        Self {
            accounts,
            risk,
            executor,
            max_jitter,
        }
    }

    /// Returns the execution record of every account whose risk filter accepted the signal.
    pub async fn distribute(&self, signal: &EnsembleSignal) -> Result<Vec<ExecutionRecord>, EngineError> {
        let accounts = self.accounts.get_active_accounts(&signal.symbol).await?;
        tracing::debug!(
            symbol = %signal.symbol,
            signal_id = %signal.id,
            accounts = accounts.len(),
            "Distributing signal"
        );

        let signal = Arc::new(signal.clone());
        let tasks = accounts.into_iter().map(|account| {
            let this = self.clone();
            let signal = Arc::clone(&signal);
            tokio::spawn(async move {
                let delay = jitter(this.max_jitter);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                this.dispatch(account, &signal).await
            })
        });

        let mut records = Vec::new();
        for result in join_all(tasks).await {
            match result {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => tracing::error!(signal_id = %signal.id, error = %e, "Account execution task failed"),
            }
        }
        Ok(records)
    }

    async fn dispatch(&self, account: Account, signal: &EnsembleSignal) -> Option<ExecutionRecord> {
        let decision = self.risk.accept(&account, signal);
        if !decision.accept {
            tracing::info!(
                account_id = %account.id,
                signal_id = %signal.id,
                reason = decision.reason.as_deref().unwrap_or_default(),
                "Signal declined by account risk filter"
            );
            return None;
        }
        Some(self.executor.execute(&account, signal, decision.size).await)
    }
}
