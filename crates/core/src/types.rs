//! Record and request types shared by both commit engines
//!
//! The TCC side works over two kinds of durable rows:
//! - `ResourceRecord`: a balance-carrying resource with an optimistic-lock
//!   version and the list of transactions holding tentative changes on it
//! - `TxnRecord`: a journal row driving the Try/Confirm/Cancel state machine
//!
//! `TransferRequest`/`TransferResponse` form the orchestrator's API surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a transfer transaction
///
/// Wraps a UUID v4. Journal rows and resource pending lists both refer to
/// transactions through this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxnId(Uuid);

impl TxnId {
    /// Create a new random TxnId using UUID v4
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a TxnId from a string representation
    ///
    /// Accepts standard UUID format (with or without hyphens).
    /// Returns None if the string is not a valid UUID.
    pub fn from_string(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for TxnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A resource record subject to TCC transfers
///
/// `version` implements the optimistic lock: every persisted mutation reads
/// the current version and writes back conditionally on it, incrementing it
/// by exactly one. `pending` holds the ids of transactions that applied a
/// tentative balance change which has not yet been confirmed or cancelled.
///
/// The core does not enforce `balance >= 0`; that business rule belongs to
/// the caller (a try-phase hook is the natural place for it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Opaque unique key
    pub id: String,
    /// Signed balance; deltas are applied at try time
    pub balance: i64,
    /// Transactions currently holding a tentative change against this resource
    pub pending: Vec<TxnId>,
    /// Optimistic-lock version, incremented on every persisted mutation
    pub version: u64,
}

impl ResourceRecord {
    /// Create a fresh record with no pending transactions and version 0
    pub fn new(id: impl Into<String>, balance: i64) -> Self {
        Self {
            id: id.into(),
            balance,
            pending: Vec::new(),
            version: 0,
        }
    }

    /// Position of `txn` in the pending list, if present
    pub fn pending_index(&self, txn: &TxnId) -> Option<usize> {
        self.pending.iter().position(|t| t == txn)
    }

    /// Whether `txn` holds a tentative change against this resource
    pub fn has_pending(&self, txn: &TxnId) -> bool {
        self.pending_index(txn).is_some()
    }
}

/// Journal state of a transfer transaction
///
/// Legal transitions:
///
/// ```text
/// Pending ──> Applied ──> Done
///    │
///    └──> Canceling ──> Cancelled
/// ```
///
/// The orchestrator is the sole writer of transitions; the journal itself
/// stores whatever it is told.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxnState {
    /// Journal row created, try phase not yet finished
    Pending,
    /// Try phase succeeded on both resources
    Applied,
    /// Confirm phase succeeded on both resources; terminal
    Done,
    /// Try phase failed, compensation in progress
    Canceling,
    /// Compensation finished; terminal
    Cancelled,
}

impl TxnState {
    /// Whether this state admits no further transitions
    pub fn is_terminal(self) -> bool {
        matches!(self, TxnState::Done | TxnState::Cancelled)
    }

    /// Whether moving from `self` to `next` is a legal lifecycle transition
    pub fn can_transition_to(self, next: TxnState) -> bool {
        matches!(
            (self, next),
            (TxnState::Pending, TxnState::Applied)
                | (TxnState::Pending, TxnState::Canceling)
                | (TxnState::Applied, TxnState::Done)
                | (TxnState::Canceling, TxnState::Cancelled)
        )
    }
}

impl fmt::Display for TxnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxnState::Pending => "pending",
            TxnState::Applied => "applied",
            TxnState::Done => "done",
            TxnState::Canceling => "canceling",
            TxnState::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// A journal row recording one transfer's durable state
///
/// The journal is the authoritative record of intent: recovery re-derives
/// the correct next action from `state` alone, and `last_modified` gates
/// which rows a recovery sweep may touch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxnRecord {
    /// Transaction id
    pub id: TxnId,
    /// Opaque correlation string supplied by the caller
    pub reference: String,
    /// Current lifecycle state
    pub state: TxnState,
    /// Resource debited by `value`
    pub source: String,
    /// Resource credited by `value`
    pub destination: String,
    /// Transferred quantity
    pub value: i64,
    /// Wall-clock timestamp of the last state transition
    pub last_modified: DateTime<Utc>,
}

/// Request to move `value` from `source` to `destination`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Resource to debit
    pub source: String,
    /// Resource to credit
    pub destination: String,
    /// Opaque correlation string, stored on the journal row
    pub reference: String,
    /// Quantity to move
    pub value: i64,
}

impl TransferRequest {
    /// Create a request with an empty reference
    pub fn new(source: impl Into<String>, destination: impl Into<String>, value: i64) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            reference: String::new(),
            value,
        }
    }

    /// Attach a correlation reference
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }
}

impl From<&TxnRecord> for TransferRequest {
    /// Rebuild the request a journal row was created from, for recovery
    fn from(record: &TxnRecord) -> Self {
        Self {
            source: record.source.clone(),
            destination: record.destination.clone(),
            reference: record.reference.clone(),
            value: record.value,
        }
    }
}

/// Successful outcome of a transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResponse {
    /// Id of the journal row, now in state `Done`
    pub txn_id: TxnId,
    /// Timestamp of the final transition
    pub last_modified: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_txn_id_uniqueness() {
        let a = TxnId::new();
        let b = TxnId::new();
        assert_ne!(a, b, "TxnIds should be unique");
    }

    #[test]
    fn test_txn_id_display_roundtrip() {
        let id = TxnId::new();
        let s = format!("{}", id);
        assert_eq!(s.len(), 36, "UUID v4 formats as 36 chars with hyphens");
        assert_eq!(TxnId::from_string(&s), Some(id));
    }

    #[test]
    fn test_txn_id_from_string_invalid() {
        assert!(TxnId::from_string("").is_none());
        assert!(TxnId::from_string("not-a-uuid").is_none());
    }

    #[test]
    fn test_txn_id_serde_roundtrip() {
        let id = TxnId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: TxnId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn test_resource_record_new() {
        let r = ResourceRecord::new("account1", 100);
        assert_eq!(r.id, "account1");
        assert_eq!(r.balance, 100);
        assert!(r.pending.is_empty());
        assert_eq!(r.version, 0);
    }

    #[test]
    fn test_resource_record_pending_lookup() {
        let txn = TxnId::new();
        let other = TxnId::new();
        let mut r = ResourceRecord::new("a", 0);
        r.pending.push(txn);

        assert!(r.has_pending(&txn));
        assert_eq!(r.pending_index(&txn), Some(0));
        assert!(!r.has_pending(&other));
        assert_eq!(r.pending_index(&other), None);
    }

    #[test]
    fn test_state_legal_transitions() {
        assert!(TxnState::Pending.can_transition_to(TxnState::Applied));
        assert!(TxnState::Pending.can_transition_to(TxnState::Canceling));
        assert!(TxnState::Applied.can_transition_to(TxnState::Done));
        assert!(TxnState::Canceling.can_transition_to(TxnState::Cancelled));
    }

    #[test]
    fn test_state_illegal_transitions() {
        assert!(!TxnState::Pending.can_transition_to(TxnState::Done));
        assert!(!TxnState::Applied.can_transition_to(TxnState::Canceling));
        assert!(!TxnState::Applied.can_transition_to(TxnState::Cancelled));
        assert!(!TxnState::Done.can_transition_to(TxnState::Pending));
        assert!(!TxnState::Cancelled.can_transition_to(TxnState::Canceling));
        assert!(!TxnState::Canceling.can_transition_to(TxnState::Done));
    }

    #[test]
    fn test_terminal_states() {
        assert!(TxnState::Done.is_terminal());
        assert!(TxnState::Cancelled.is_terminal());
        assert!(!TxnState::Pending.is_terminal());
        assert!(!TxnState::Applied.is_terminal());
        assert!(!TxnState::Canceling.is_terminal());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(TxnState::Pending.to_string(), "pending");
        assert_eq!(TxnState::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn test_transfer_request_builder() {
        let req = TransferRequest::new("a", "b", 10).with_reference("order-42");
        assert_eq!(req.source, "a");
        assert_eq!(req.destination, "b");
        assert_eq!(req.value, 10);
        assert_eq!(req.reference, "order-42");
    }

    #[test]
    fn test_transfer_request_from_record() {
        let record = TxnRecord {
            id: TxnId::new(),
            reference: "r".to_string(),
            state: TxnState::Applied,
            source: "a".to_string(),
            destination: "b".to_string(),
            value: 7,
            last_modified: Utc::now(),
        };
        let req = TransferRequest::from(&record);
        assert_eq!(req.source, "a");
        assert_eq!(req.destination, "b");
        assert_eq!(req.value, 7);
        assert_eq!(req.reference, "r");
    }

    #[test]
    fn test_txn_record_serde_roundtrip() {
        let record = TxnRecord {
            id: TxnId::new(),
            reference: String::new(),
            state: TxnState::Pending,
            source: "src".to_string(),
            destination: "dst".to_string(),
            value: -3,
            last_modified: Utc::now(),
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: TxnRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }
}
