//! # Quorum Database Crate
//!
//! This crate is the system's storage adapter. It owns the source of truth for
//! account balances and holdings, the strategy registry, the idempotency
//! journal of execution attempts, and the append-only audit trail.
//!
//! ## Architectural Principles
//!
//! - **Trait seams:** the rest of the application depends only on the
//!   `AccountStore`, `StrategyStore`, `ExecutionJournal` and `AuditRecorder`
//!   traits. Which backend sits behind them is decided once, in the binary.
//! - **Atomic fills:** `AccountStore::apply_fill` updates the balance, the
//!   holding and the journal, and appends the fill's audit event, in one step.
//!   Either all of them happen or none do.
//! - **Asynchronous & Pooled:** the PostgreSQL backend uses a connection pool
//!   (`PgPool`) and embedded migrations.
//!
//! ## Public API
//!
//! - `connect` / `run_migrations`: PostgreSQL pool setup.
//! - `PgRepository`: the PostgreSQL implementation of every trait.
//! - `InMemoryStore`: a `tokio::sync::RwLock` implementation for paper runs and tests.
//! - `JsonlAuditLog` / `InMemoryAuditLog`: file and in-memory audit sinks.

// Declare the modules that constitute this crate.
pub mod audit;
pub mod connection;
pub mod error;
pub mod memory;
pub mod repository;
pub mod seed;

use async_trait::async_trait;
use core_types::{Account, ExecutionRecord, Fill, Strategy, StrategyStatus};
use events::AuditEvent;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

// Re-export the key components to create a clean, public-facing API.
pub use audit::{InMemoryAuditLog, JsonlAuditLog};
pub use connection::{connect, run_migrations};
pub use error::DbError;
pub use memory::InMemoryStore;
pub use repository::PgRepository;
pub use seed::{account_from_settings, strategy_from_settings};

/// Change applied to a strategy's performance weight per recorded trade.
pub const WEIGHT_STEP: Decimal = dec!(0.05);
pub const MIN_PERFORMANCE_WEIGHT: Decimal = dec!(0.1);
pub const MAX_PERFORMANCE_WEIGHT: Decimal = dec!(3.0);

/// The weight a strategy carries after one more winning or losing trade.
pub fn adjusted_weight(current: Decimal, won: bool) -> Decimal {
    let step = if won { WEIGHT_STEP } else { -WEIGHT_STEP };
    (current + step).clamp(MIN_PERFORMANCE_WEIGHT, MAX_PERFORMANCE_WEIGHT)
}

/// Accounts, balances and the companion holdings ledger.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_account(&self, id: Uuid) -> Result<Account, DbError>;

    /// Active accounts subscribed to `symbol`.
    async fn get_active_accounts(&self, symbol: &str) -> Result<Vec<Account>, DbError>;

    /// Quantity of `symbol` held by the account; zero when nothing is held.
    async fn holding(&self, account_id: Uuid, symbol: &str) -> Result<Decimal, DbError>;

    /// Applies a fill, journals its record and audits it as one atomic write.
    ///
    /// The `ExecutionAttempted` event for `record` is durably stored before the
    /// fill commits; if the audit write fails nothing is changed.
    ///
    /// Fails with `Conflict` if the stored balance differs from
    /// `fill.balance_before` or if either balance or holding would go negative,
    /// and with `DuplicateExecution` if the record's idempotency key is taken.
    async fn apply_fill(&self, fill: &Fill, record: &ExecutionRecord) -> Result<(), DbError>;
}

#[async_trait]
pub trait StrategyStore: Send + Sync {
    /// Active strategies bound to `symbol`.
    async fn get_active_strategies(&self, symbol: &str) -> Result<Vec<Strategy>, DbError>;

    async fn set_status(&self, id: Uuid, status: StrategyStatus) -> Result<(), DbError>;

    /// Feeds one closed trade back into the strategy's weight and trade count.
    async fn record_performance(&self, id: Uuid, won: bool) -> Result<Strategy, DbError>;
}

/// The idempotency journal: at most one record per (account, signal).
#[async_trait]
pub trait ExecutionJournal: Send + Sync {
    async fn find(&self, account_id: Uuid, signal_id: Uuid) -> Result<Option<ExecutionRecord>, DbError>;

    async fn insert(&self, record: &ExecutionRecord) -> Result<(), DbError>;

    /// Every journaled record for an account, oldest first.
    async fn records_for(&self, account_id: Uuid) -> Result<Vec<ExecutionRecord>, DbError>;
}

/// Append-only sink for votes, consensus decisions and execution outcomes.
/// `record` returns only once the event is durably stored.
#[async_trait]
pub trait AuditRecorder: Send + Sync {
    async fn record(&self, event: &AuditEvent) -> Result<(), DbError>;
}
