use core_types::ExecutionOutcome;
use database::DbError;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Why an execution attempt did not fill.
///
/// Every variant is turned into an `ExecutionRecord` with a human-readable
/// reason; `outcome()` decides whether that record is a rejection or an error.
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Not enough cash available to execute trade. Required: {required}, Available: {available}")]
    InsufficientCash { required: String, available: String },

    #[error("Not enough {symbol} held to sell. Requested: {requested}, Available: {available}")]
    InsufficientHoldings {
        symbol: String,
        requested: String,
        available: String,
    },

    #[error("Signal is stale: emitted {age_secs}s ago, valid for {validity_secs}s")]
    StaleSignal { age_secs: i64, validity_secs: i64 },

    #[error("Account is {0}, not active")]
    AccountInactive(&'static str),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Signal {signal_id} was already executed for account {account_id}")]
    DuplicateSignal { account_id: Uuid, signal_id: Uuid },

    #[error("Timed out after {0:?} waiting for the account lock")]
    LockTimeout(Duration),

    #[error("Storage failure: {0}")]
    Store(#[source] DbError),
}

impl ExecutorError {
    /// Transient faults (lock contention, storage) are errors; everything else
    /// is a deliberate rejection.
    pub fn outcome(&self) -> ExecutionOutcome {
        match self {
            ExecutorError::LockTimeout(_) | ExecutorError::Store(_) => ExecutionOutcome::Error,
            _ => ExecutionOutcome::Rejected,
        }
    }
}

impl From<DbError> for ExecutorError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::DuplicateExecution { account_id, signal_id } => {
                ExecutorError::DuplicateSignal { account_id, signal_id }
            }
            other => ExecutorError::Store(other),
        }
    }
}
