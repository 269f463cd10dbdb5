//! Error types for the Tandem commit engines
//!
//! One unified `Error` enum serves both engines. We use `thiserror` for
//! `Display`/`Error` derivation and expose classification predicates so
//! callers can branch on error *kind* instead of matching variants:
//!
//! - `is_conflict` drives the resource manager's retry loop
//! - `is_pending_txn_not_found` lets Confirm/Cancel treat a missing pending
//!   entry as idempotent success
//! - `is_retryable` is true only for optimistic-lock conflicts
//!
//! Everything else bubbles up; the journal is the durable record of intent
//! and recovery re-derives the next action from it.

use crate::types::{TxnId, TxnState};
use std::io;
use thiserror::Error;

/// Result type alias for Tandem operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for both commit engines
#[derive(Debug, Error)]
pub enum Error {
    /// Optimistic-lock conflict that survived the retry budget
    ///
    /// Emitted by the resource manager after `attempts` read-modify-write
    /// rounds all lost the version race.
    #[error("update of resource {resource} conflicted after {attempts} attempts")]
    Conflict {
        /// Resource whose version guard kept failing
        resource: String,
        /// How many attempts were made before giving up
        attempts: u32,
    },

    /// Missing resource record
    #[error("resource not found: {id}")]
    ResourceNotFound {
        /// Id of the missing resource
        id: String,
    },

    /// Missing journal row
    #[error("transaction not found: {id}")]
    TxnNotFound {
        /// Id of the missing transaction
        id: TxnId,
    },

    /// The resource's pending list does not contain the transaction
    ///
    /// Confirm and Cancel treat this as idempotent success; anything else
    /// surfacing it is a bug in phase ordering.
    #[error("pending transaction {txn} not found on resource {resource}")]
    PendingTxnNotFound {
        /// Resource that was inspected
        resource: String,
        /// Transaction that was expected in the pending list
        txn: TxnId,
    },

    /// Non-retryable storage failure
    #[error("storage error: {message}")]
    Storage {
        /// What went wrong
        message: String,
    },

    /// A follower refused a protocol phase
    #[error("follower {addr} rejected {phase}")]
    RemoteNack {
        /// Address of the refusing follower
        addr: String,
        /// Protocol phase that was refused
        phase: &'static str,
    },

    /// A 3PC per-RPC deadline expired
    #[error("{phase} timed out after {timeout_ms}ms")]
    Timeout {
        /// Protocol phase that timed out
        phase: &'static str,
        /// The deadline that expired
        timeout_ms: u64,
    },

    /// A user-supplied policy hook vetoed a phase
    #[error("{phase} hook rejected the request")]
    HookRejected {
        /// Phase the hook was consulted for
        phase: &'static str,
    },

    /// The journal row is not in the state a transition requires
    #[error("transaction {id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Transaction whose row was inspected
        id: TxnId,
        /// State actually observed
        from: TxnState,
        /// State the caller wanted to move to
        to: TxnState,
    },

    /// Configuration parse or validation failure
    #[error("config error: {message}")]
    Config {
        /// What is wrong with the configuration
        message: String,
    },
}

impl Error {
    /// Create a Conflict error
    pub fn conflict(resource: impl Into<String>, attempts: u32) -> Self {
        Error::Conflict {
            resource: resource.into(),
            attempts,
        }
    }

    /// Create a ResourceNotFound error
    pub fn resource_not_found(id: impl Into<String>) -> Self {
        Error::ResourceNotFound { id: id.into() }
    }

    /// Create a TxnNotFound error
    pub fn txn_not_found(id: TxnId) -> Self {
        Error::TxnNotFound { id }
    }

    /// Create a PendingTxnNotFound error
    pub fn pending_txn_not_found(resource: impl Into<String>, txn: TxnId) -> Self {
        Error::PendingTxnNotFound {
            resource: resource.into(),
            txn,
        }
    }

    /// Create a Storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Error::Storage {
            message: message.into(),
        }
    }

    /// Create a RemoteNack error
    pub fn remote_nack(addr: impl Into<String>, phase: &'static str) -> Self {
        Error::RemoteNack {
            addr: addr.into(),
            phase,
        }
    }

    /// Create a Timeout error
    pub fn timeout(phase: &'static str, timeout_ms: u64) -> Self {
        Error::Timeout { phase, timeout_ms }
    }

    /// Create a HookRejected error
    pub fn hook_rejected(phase: &'static str) -> Self {
        Error::HookRejected { phase }
    }

    /// Create an InvalidTransition error
    pub fn invalid_transition(id: TxnId, from: TxnState, to: TxnState) -> Self {
        Error::InvalidTransition { id, from, to }
    }

    /// Create a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// Check if this is an optimistic-lock conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }

    /// Check if this is a "not found" error (resource or journal row)
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::ResourceNotFound { .. } | Error::TxnNotFound { .. }
        )
    }

    /// Check if this is the idempotence signal from a pending-list miss
    pub fn is_pending_txn_not_found(&self) -> bool {
        matches!(self, Error::PendingTxnNotFound { .. })
    }

    /// Check if this is a deadline expiry
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Check if this error may succeed on retry
    ///
    /// Only optimistic-lock conflicts are retryable; re-read the record and
    /// try again. Storage failures and protocol rejections are not.
    pub fn is_retryable(&self) -> bool {
        self.is_conflict()
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Storage {
            message: e.to_string(),
        }
    }
}
