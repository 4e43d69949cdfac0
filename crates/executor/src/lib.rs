//! # Quorum Executor Crate
//!
//! This crate converts accepted (account, signal) pairs into paper fills.
//!
//! ## Architectural Principles
//!
//! - **Calculation vs. State Decoupling:** `settle` is a pure calculator that
//!   determines the effect of a fill (notional, fee, new balance) without
//!   mutating anything. The account store applies that effect atomically.
//! - **One writer per account:** every attempt runs under the account's async
//!   lock, acquired with a bounded timeout, and re-reads the account inside it.
//! - **Exactly one record:** the journal is keyed by (account, signal), so a
//!   repeated delivery can never fill twice.
//!
//! ## Public API
//!
//! - `Executor`: the trait the engine executes against.
//! - `ExecutionCoordinator`: the paper-trading implementation.
//! - `AccountLocks`: the per-account lock registry.
//! - `ExecutorError`: the rejection and error taxonomy behind every unfilled record.

// Declare the modules that constitute this crate.
pub mod coordinator;
pub mod error;
pub mod locks;
pub mod settlement;

use async_trait::async_trait;
use core_types::{Account, EnsembleSignal, ExecutionRecord};
use rust_decimal::Decimal;

// Re-export the key components to provide a clean, public-facing API.
pub use coordinator::ExecutionCoordinator;
pub use error::ExecutorError;
pub use locks::{AccountGuard, AccountLocks};
pub use settlement::{settle, Settlement};

/// A generic trait for an execution engine.
///
/// Implementations never fail: every attempt yields an `ExecutionRecord`
/// whose outcome is filled, rejected, or error.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, account: &Account, signal: &EnsembleSignal, size: Decimal) -> ExecutionRecord;
}
