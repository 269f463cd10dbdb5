//! Per-resource Try/Confirm/Cancel with optimistic-lock retries
//!
//! Every operation is a read-modify-write: read the record and its version,
//! compute the post-image, write back conditionally on the version. A
//! conditional write that affects zero rows means another writer won the
//! race; the operation re-reads and retries, up to `MAX_UPDATE_RETRIES`
//! attempts spaced `RETRY_INTERVAL` apart, then surfaces `Conflict`.
//!
//! Idempotence: Confirm and Cancel check pending-list membership and treat
//! a miss as success, so recovery can re-drive them freely. Try is NOT
//! idempotent; the orchestrator guarantees at most one Try per
//! (resource, txn) by linearizing through the journal state.

use std::sync::Arc;
use std::time::Duration;
use tandem_core::{
    Error, ResourceRecord, ResourceStore, ResourceUpdate, Result, TransferRequest, TxnId,
};
use tracing::{debug, warn};

/// Attempts per operation before surfacing `Conflict`
pub const MAX_UPDATE_RETRIES: u32 = 4;

/// Pause between optimistic-lock retry attempts
pub const RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Which way a delta moves a balance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Increment,
    Decrement,
}

impl Direction {
    fn apply(self, balance: i64, value: i64) -> i64 {
        match self {
            Direction::Increment => balance + value,
            Direction::Decrement => balance - value,
        }
    }

    fn inverse(self) -> Self {
        match self {
            Direction::Increment => Direction::Decrement,
            Direction::Decrement => Direction::Increment,
        }
    }
}

/// The capability the orchestrator consumes
///
/// Narrow on purpose: the service sees Get/Create for seeding plus the
/// three phase operations, and nothing else of the manager. Classifying a
/// pending-list miss is the error type's job (`is_pending_txn_not_found`).
pub trait ResourceHandler: Send + Sync {
    /// Fetch a resource record
    fn get(&self, id: &str) -> Result<ResourceRecord>;

    /// Insert a fresh resource record
    fn create(&self, record: ResourceRecord) -> Result<()>;

    /// Try phase: tentatively apply the transfer delta to one resource
    fn apply(&self, resource: &str, txn: TxnId, req: &TransferRequest) -> Result<()>;

    /// Confirm phase: release the pending entry, keeping the balance
    fn confirm(&self, resource: &str, txn: TxnId) -> Result<()>;

    /// Cancel phase: undo the delta and release the pending entry
    fn cancel(&self, resource: &str, txn: TxnId, req: &TransferRequest) -> Result<()>;
}

/// Try/Confirm/Cancel executor over one `ResourceStore`
pub struct ResourceManager<S> {
    store: Arc<S>,
}

impl<S: ResourceStore> ResourceManager<S> {
    /// Create a manager over the given store
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The delta direction for `resource` within `req`
    ///
    /// The destination is credited; everything else (i.e. the source) is
    /// debited.
    fn direction_for(resource: &str, req: &TransferRequest) -> Direction {
        if resource == req.destination {
            Direction::Increment
        } else {
            Direction::Decrement
        }
    }

    /// Run one read-modify-write attempt under the retry policy
    ///
    /// `f` returns the rows affected by its conditional write; zero rows is
    /// the conflict signal and triggers a retry. A pending-list miss and
    /// every other error abort the loop immediately; only the version race
    /// is worth retrying.
    fn with_retries<F>(&self, resource: &str, op: &'static str, mut f: F) -> Result<()>
    where
        F: FnMut() -> Result<u64>,
    {
        for attempt in 1..=MAX_UPDATE_RETRIES {
            match f() {
                Ok(rows) if rows > 0 => return Ok(()),
                Ok(_) => {
                    warn!(
                        target: "tandem::tcc",
                        resource, op, attempt,
                        "optimistic lock conflict, retrying"
                    );
                    if attempt < MAX_UPDATE_RETRIES {
                        std::thread::sleep(RETRY_INTERVAL);
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Err(Error::conflict(resource, MAX_UPDATE_RETRIES))
    }

    /// One try-phase attempt: delta the balance and append to pending
    fn apply_once(
        &self,
        resource: &str,
        txn: TxnId,
        value: i64,
        direction: Direction,
    ) -> Result<u64> {
        let record = self.store.get(resource)?;
        let balance = direction.apply(record.balance, value);

        let mut pending = record.pending.clone();
        pending.push(txn);

        debug!(
            target: "tandem::tcc",
            resource, txn = %txn,
            balance_before = record.balance,
            balance_after = balance,
            version = record.version,
            "applying tentative delta"
        );
        self.store.update_if_version(
            resource,
            record.version,
            ResourceUpdate {
                balance,
                pending,
                version: record.version + 1,
            },
        )
    }

    /// One confirm attempt: drop the pending entry, balance untouched
    fn confirm_once(&self, resource: &str, txn: TxnId) -> Result<u64> {
        let record = self.store.get(resource)?;
        let index = record
            .pending_index(&txn)
            .ok_or_else(|| Error::pending_txn_not_found(resource, txn))?;

        let mut pending = record.pending.clone();
        pending.remove(index);

        self.store.update_if_version(
            resource,
            record.version,
            ResourceUpdate {
                balance: record.balance,
                pending,
                version: record.version + 1,
            },
        )
    }

    /// One cancel attempt: undo the delta and drop the pending entry
    fn cancel_once(
        &self,
        resource: &str,
        txn: TxnId,
        value: i64,
        direction: Direction,
    ) -> Result<u64> {
        let record = self.store.get(resource)?;
        let index = record
            .pending_index(&txn)
            .ok_or_else(|| Error::pending_txn_not_found(resource, txn))?;

        let balance = direction.apply(record.balance, value);
        let mut pending = record.pending.clone();
        pending.remove(index);

        debug!(
            target: "tandem::tcc",
            resource, txn = %txn,
            balance_before = record.balance,
            balance_after = balance,
            "undoing tentative delta"
        );
        self.store.update_if_version(
            resource,
            record.version,
            ResourceUpdate {
                balance,
                pending,
                version: record.version + 1,
            },
        )
    }
}

impl<S: ResourceStore> ResourceHandler for ResourceManager<S> {
    fn get(&self, id: &str) -> Result<ResourceRecord> {
        self.store.get(id)
    }

    fn create(&self, record: ResourceRecord) -> Result<()> {
        self.store.insert(record)
    }

    fn apply(&self, resource: &str, txn: TxnId, req: &TransferRequest) -> Result<()> {
        let direction = Self::direction_for(resource, req);
        self.with_retries(resource, "apply", || {
            self.apply_once(resource, txn, req.value, direction)
        })
    }

    fn confirm(&self, resource: &str, txn: TxnId) -> Result<()> {
        let result = self.with_retries(resource, "confirm", || self.confirm_once(resource, txn));
        match result {
            Err(e) if e.is_pending_txn_not_found() => {
                debug!(target: "tandem::tcc", resource, txn = %txn, "confirm: already released");
                Ok(())
            }
            other => other,
        }
    }

    fn cancel(&self, resource: &str, txn: TxnId, req: &TransferRequest) -> Result<()> {
        // Undo swaps the try-phase direction
        let direction = Self::direction_for(resource, req).inverse();
        let result = self.with_retries(resource, "cancel", || {
            self.cancel_once(resource, txn, req.value, direction)
        });
        match result {
            Err(e) if e.is_pending_txn_not_found() => {
                debug!(target: "tandem::tcc", resource, txn = %txn, "cancel: already released");
                Ok(())
            }
            other => other,
        }
    }
}
