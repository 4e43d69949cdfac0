//! # Quorum Events
//!
//! The event shapes the engine exposes and records: the audit trail entries
//! (`AuditEvent`) and the in-process signal and execution streams (`SignalBus`).
//!
//! Like `core-types`, this crate sits at the bottom of the dependency graph so
//! that producers (engine, executor) and sinks (database, alerter) share one
//! definition of every event.

// Declare the modules that make up this crate.
pub mod bus;
pub mod error;
pub mod messages;

// Re-export the core types to provide a clean public API.
pub use bus::SignalBus;
pub use error::EventsError;
pub use messages::{AuditEvent, ExecutionAttempted, SignalEmitted, VoteCast};
