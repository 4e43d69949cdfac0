use rust_decimal::Decimal;
use thiserror::Error;

/// Why a set of votes did not produce an ensemble signal.
///
/// These are expected outcomes, not faults: the engine logs them at debug
/// level and drops the cycle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConsensusError {
    #[error("Insufficient consensus: {voters} distinct strategies voted, {required} required")]
    TooFewVoters { voters: usize, required: usize },

    #[error("Insufficient consensus: strength {strength} is below {required}")]
    WeakConsensus { strength: Decimal, required: Decimal },

    #[error("Insufficient consensus: buy and sell weight cancel out")]
    Deadlock,

    #[error("Insufficient consensus: total vote weight is zero")]
    ZeroWeight,

    #[error("Invalid signal input: {0}")]
    InvalidInput(String),
}
