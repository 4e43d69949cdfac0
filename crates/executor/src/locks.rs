use crate::error::ExecutorError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

/// Held for the duration of one account's read-validate-write sequence.
pub type AccountGuard = OwnedMutexGuard<()>;

/// One async mutex per account, created on first use.
///
/// The registry map itself sits behind a plain `std` mutex: it is only held
/// long enough to clone an `Arc`, never across an `.await`.
#[derive(Default, Clone)]
pub struct AccountLocks {
    locks: Arc<Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, account_id: Uuid) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(account_id).or_default().clone()
    }

    /// Waits at most `timeout` for exclusive access to the account.
    pub async fn acquire(&self, account_id: Uuid, timeout: Duration) -> Result<AccountGuard, ExecutorError> {
        let lock = self.lock_for(account_id);
        tokio::time::timeout(timeout, lock.lock_owned())
            .await
            .map_err(|_| ExecutorError::LockTimeout(timeout))
    }
}
