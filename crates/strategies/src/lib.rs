//! # Quorum Strategy Votes
//!
//! Turns each active strategy's view of a market snapshot into a `Vote`.
//!
//! ## Architectural Principles
//!
//! - **Pure logic:** no databases, no I/O, no clocks. A vote is a function of
//!   the strategy's state and the snapshot it is given.
//! - **Swappable models:** confidence comes from a `ConfidenceModel`. The
//!   production `SensitivityModel` is a per-kind table over the condition
//!   dimensions; tests use `FixedConfidence` to script exact values.
//!
//! ## Public API
//!
//! - `VoteGenerator`: evaluates a strategy and computes its vote weight.
//! - `ConfidenceModel`, `SensitivityModel`, `Sensitivity`, `FixedConfidence`.

pub mod error;
pub mod generator;
pub mod model;

pub use error::StrategyError;
pub use generator::VoteGenerator;
pub use model::{ConfidenceModel, FixedConfidence, Sensitivity, SensitivityModel};
