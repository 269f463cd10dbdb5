//! Storage traits decoupling the engines from persistence back-ends
//!
//! Persistence is an external collaborator for both engines. The TCC side
//! needs a resource table with a conditional update (the optimistic lock)
//! and a journal table; the replication side needs a last-write-wins
//! key/value sink. The in-memory reference implementations live in
//! tandem-storage; swapping in a real database must not touch the engines.
//!
//! Thread safety: all methods must be safe to call concurrently from
//! multiple threads (the traits require Send + Sync).

use crate::error::Result;
use crate::types::{ResourceRecord, TxnId, TxnRecord, TxnState};

/// Fields written by a conditional resource update
///
/// The manager computes the full post-image (new balance, new pending list,
/// bumped version) and the store installs it only if the stored version
/// still matches the expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceUpdate {
    /// New balance to install
    pub balance: i64,
    /// New pending-transaction list to install
    pub pending: Vec<TxnId>,
    /// New version to install; by convention expected_version + 1
    pub version: u64,
}

/// Store of `ResourceRecord`s with a version-guarded conditional update
pub trait ResourceStore: Send + Sync {
    /// Fetch a record by id
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if no record exists under `id`, or a
    /// storage error if the read fails.
    fn get(&self, id: &str) -> Result<ResourceRecord>;

    /// Insert a fresh record
    ///
    /// # Errors
    ///
    /// Returns a storage error if a record already exists under the same id
    /// or the write fails.
    fn insert(&self, record: ResourceRecord) -> Result<()>;

    /// Conditionally overwrite the record's mutable fields
    ///
    /// Installs `update` only if the stored version equals
    /// `expected_version`. Returns the number of rows affected: 1 on
    /// success, 0 when the version guard failed (the optimistic-lock
    /// conflict signal; the caller decides whether to retry).
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if no record exists under `id`, or a
    /// storage error if the write fails.
    fn update_if_version(
        &self,
        id: &str,
        expected_version: u64,
        update: ResourceUpdate,
    ) -> Result<u64>;
}

/// Durable journal of transfer transaction states
///
/// The journal is the authoritative state machine record: the orchestrator
/// is the sole writer of legal transitions, and recovery re-derives the
/// next action from whatever state was last durably written. `update_state`
/// itself applies no guard beyond row existence.
pub trait TxnJournal: Send + Sync {
    /// Create a row in state `Pending` with `last_modified = now`
    ///
    /// # Errors
    ///
    /// Returns a storage error if the write fails.
    fn insert(&self, source: &str, destination: &str, reference: &str, value: i64)
        -> Result<TxnId>;

    /// Set the row's state and refresh `last_modified`, returning the row
    ///
    /// # Errors
    ///
    /// Returns `TxnNotFound` if the row does not exist.
    fn update_state(&self, id: TxnId, state: TxnState) -> Result<TxnRecord>;

    /// Fetch a row by id
    ///
    /// # Errors
    ///
    /// Returns `TxnNotFound` if the row does not exist.
    fn get(&self, id: TxnId) -> Result<TxnRecord>;

    /// All rows in `state` carrying the given reference
    ///
    /// # Errors
    ///
    /// Returns a storage error if the read fails.
    fn list_in_state(&self, state: TxnState, reference: &str) -> Result<Vec<TxnRecord>>;

    /// All rows in `state`, regardless of reference
    ///
    /// # Errors
    ///
    /// Returns a storage error if the read fails.
    fn list_all_in_state(&self, state: TxnState) -> Result<Vec<TxnRecord>>;
}

/// Durable key/value sink for the replication engine
///
/// Duplicate keys resolve as last-write-wins; no transactions required.
pub trait KvStore: Send + Sync {
    /// Store `value` under `key`, overwriting any previous value
    ///
    /// # Errors
    ///
    /// Returns a storage error if the write fails.
    fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Fetch the latest value stored under `key`
    ///
    /// Returns None if the key has never been written.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the read fails.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
}
