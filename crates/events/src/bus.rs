//! In-process publish/subscribe streams for ensemble signals and execution records.

use core_types::{EnsembleSignal, ExecutionRecord};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use uuid::Uuid;

const DEFAULT_CAPACITY: usize = 256;

/// Fan-out hub for the two streams the engine exposes.
///
/// Signals are partitioned by symbol and executions by account, with one
/// additional global execution stream. Channels are created lazily on first
/// subscription; publishing to a topic nobody listens to is a no-op.
#[derive(Clone)]
pub struct SignalBus {
    capacity: usize,
    signals: Arc<RwLock<HashMap<String, broadcast::Sender<EnsembleSignal>>>>,
    account_executions: Arc<RwLock<HashMap<Uuid, broadcast::Sender<ExecutionRecord>>>>,
    executions: broadcast::Sender<ExecutionRecord>,
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl SignalBus {
    pub fn new(capacity: usize) -> Self {
        let (executions, _) = broadcast::channel(capacity);
        Self {
            capacity,
            signals: Arc::new(RwLock::new(HashMap::new())),
            account_executions: Arc::new(RwLock::new(HashMap::new())),
            executions,
        }
    }

    /// Subscribes to every ensemble signal emitted for `symbol`.
    pub fn subscribe_signals(&self, symbol: &str) -> broadcast::Receiver<EnsembleSignal> {
        let mut topics = self.signals.write().unwrap_or_else(|e| e.into_inner());
        topics
            .entry(symbol.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Subscribes to execution records for one account, or to all of them with `None`.
    pub fn subscribe_executions(&self, account_id: Option<Uuid>) -> broadcast::Receiver<ExecutionRecord> {
        match account_id {
            None => self.executions.subscribe(),
            Some(id) => {
                let mut topics = self
                    .account_executions
                    .write()
                    .unwrap_or_else(|e| e.into_inner());
                topics
                    .entry(id)
                    .or_insert_with(|| broadcast::channel(self.capacity).0)
                    .subscribe()
            }
        }
    }

    /// Returns the number of receivers the signal reached.
    pub fn publish_signal(&self, signal: &EnsembleSignal) -> usize {
        let topics = self.signals.read().unwrap_or_else(|e| e.into_inner());
        topics
            .get(&signal.symbol)
            .and_then(|tx| tx.send(signal.clone()).ok())
            .unwrap_or(0)
    }

    pub fn publish_execution(&self, record: &ExecutionRecord) {
        let _ = self.executions.send(record.clone());
        let topics = self
            .account_executions
            .read()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(tx) = topics.get(&record.account_id) {
            let _ = tx.send(record.clone());
        }
    }
}
