//! # Quorum Consensus
//!
//! Reduces the votes of independent strategies into one `EnsembleSignal`.
//!
//! The weighted net confidence of all votes is normalized into a consensus
//! strength in 0..1. A signal is only emitted when at least two distinct
//! strategies voted and the strength reaches the configured bar (0.6 by
//! default, inclusive), so narrow or isolated opinions never move capital.

pub mod aggregator;
pub mod error;

pub use aggregator::{ConsensusAggregator, Tally};
pub use error::ConsensusError;
