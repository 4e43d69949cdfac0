//! # Quorum Risk
//!
//! Decides, per account, whether to act on an ensemble signal and at what size.

pub mod account_filter;
pub mod error;

pub use account_filter::AccountRiskFilter;
pub use error::RiskError;

use core_types::{Account, EnsembleSignal};
use rust_decimal::Decimal;

/// The outcome of running a signal through an account's risk filter.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskDecision {
    pub accept: bool,
    /// Size to execute, in base units. Zero when rejected.
    pub size: Decimal,
    pub reason: Option<String>,
}

impl RiskDecision {
    pub fn accept(size: Decimal) -> Self {
        Self { accept: true, size, reason: None }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self { accept: false, size: Decimal::ZERO, reason: Some(reason.into()) }
    }
}

/// A stateless, deterministic gate applied to every (account, signal) pair
/// before execution. Implementations must not use randomness.
pub trait RiskFilter: Send + Sync {
    fn accept(&self, account: &Account, signal: &EnsembleSignal) -> RiskDecision;
}
