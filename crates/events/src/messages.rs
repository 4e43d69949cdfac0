use crate::error::EventsError;
use chrono::{DateTime, Utc};
use core_types::{EnsembleSignal, ExecutionRecord, Vote};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A vote as it was cast during one evaluation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteCast {
    pub cycle_id: Uuid,
    pub symbol: String,
    pub vote: Vote,
    pub cast_at: DateTime<Utc>,
}

/// The consensus outcome of one evaluation cycle that produced a signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEmitted {
    pub cycle_id: Uuid,
    pub signal: EnsembleSignal,
}

/// The outcome of one (account, signal) execution attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionAttempted {
    pub record: ExecutionRecord,
}

/// Every fact the audit trail records.
///
/// The `#[serde(tag = "type", content = "payload")]` attribute serializes each
/// variant as `{ "type": "VoteCast", "payload": { ... } }`, which keeps the
/// audit rows self-describing in both the JSONB column and the JSON-lines file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum AuditEvent {
    VoteCast(VoteCast),
    SignalEmitted(SignalEmitted),
    ExecutionAttempted(ExecutionAttempted),
}

impl AuditEvent {
    /// A short, stable name for the event kind, used as the indexed column in storage.
    pub fn kind(&self) -> &'static str {
        match self {
            AuditEvent::VoteCast(_) => "vote_cast",
            AuditEvent::SignalEmitted(_) => "signal_emitted",
            AuditEvent::ExecutionAttempted(_) => "execution_attempted",
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            AuditEvent::VoteCast(e) => &e.symbol,
            AuditEvent::SignalEmitted(e) => &e.signal.symbol,
            AuditEvent::ExecutionAttempted(e) => &e.record.symbol,
        }
    }

    /// The account the event concerns, if any.
    pub fn account_id(&self) -> Option<Uuid> {
        match self {
            AuditEvent::ExecutionAttempted(e) => Some(e.record.account_id),
            _ => None,
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AuditEvent::VoteCast(e) => e.cast_at,
            AuditEvent::SignalEmitted(e) => e.signal.emitted_at,
            AuditEvent::ExecutionAttempted(e) => e.record.timestamp,
        }
    }

    /// Serializes the event into a single line of JSON.
    pub fn to_json_line(&self) -> Result<String, EventsError> {
        Ok(serde_json::to_string(self)?)
    }
}
