//! Transfer orchestration across two resources
//!
//! `TransferService` drives a single transfer through its two-phase
//! lifecycle. The journal row is the authoritative state: every phase
//! boundary is a guarded journal transition, and crash recovery re-derives
//! the next action from the state alone.
//!
//! ```text
//! StartTransaction:
//!   insert(Pending)
//!   try:     apply(source), apply(destination), callbacks   then Pending  -> Applied
//!   confirm: confirm(source), confirm(destination)          then Applied  -> Done
//!
//! on try failure:     Pending -> Canceling, cancel(destination), cancel(source),
//!                     Canceling -> Cancelled
//! on confirm failure: re-drive confirm on both, Applied -> Done
//! ```
//!
//! Ordering is fixed for reproducibility: try and confirm run source then
//! destination; cancel unwinds destination then source.

use crate::manager::ResourceHandler;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tandem_core::{
    Error, Result, TransferRequest, TransferResponse, TxnId, TxnJournal, TxnRecord, TxnState,
};
use tracing::{debug, info, warn};

/// Caller-supplied hook run at the end of the try phase
///
/// A hook error fails the try phase and triggers cancellation, which is how
/// callers attach business rules (e.g. balance floors) without the core
/// knowing about them.
pub type TransferCallback = Box<dyn Fn() -> Result<()> + Send + Sync>;

/// Orchestrator for transfers between two resources
///
/// Generic over the two capabilities it consumes; holds no other state, so
/// one service can serve concurrent transfers from many threads.
pub struct TransferService<H, J> {
    handler: Arc<H>,
    journal: Arc<J>,
}

impl<H: ResourceHandler, J: TxnJournal> TransferService<H, J> {
    /// Create a service over a resource handler and a journal
    pub fn new(handler: Arc<H>, journal: Arc<J>) -> Self {
        Self { handler, journal }
    }

    /// The resource handler this service drives
    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    /// Move `req.value` from `req.source` to `req.destination`
    ///
    /// See [`TransferService::start_transaction_with`].
    pub fn start_transaction(&self, req: &TransferRequest) -> Result<TransferResponse> {
        self.start_transaction_with(req, &[])
    }

    /// Move `req.value` from `req.source` to `req.destination`, running
    /// `callbacks` at the end of the try phase
    ///
    /// On success the journal row is `Done` and neither resource carries a
    /// pending entry for the transaction. On failure the original error is
    /// surfaced after recovery has run; if recovery itself fails, the
    /// recovery error wins and a later `recover_transactions` sweep will
    /// finish the job from the journal state.
    ///
    /// # Errors
    ///
    /// Any phase error after recovery, or the recovery error itself.
    pub fn start_transaction_with(
        &self,
        req: &TransferRequest,
        callbacks: &[TransferCallback],
    ) -> Result<TransferResponse> {
        let txn = self
            .journal
            .insert(&req.source, &req.destination, &req.reference, req.value)?;
        info!(target: "tandem::tcc", txn = %txn, source = %req.source,
              destination = %req.destination, value = req.value, "transfer started");

        if let Err(err) = self.apply_transaction(txn, req, callbacks) {
            warn!(target: "tandem::tcc", txn = %txn, error = %err, "try phase failed, cancelling");
            self.recover_from_error(txn, req, TxnState::Pending)?;
            return Err(err);
        }

        match self.commit_transaction(txn, req) {
            Ok(row) => {
                info!(target: "tandem::tcc", txn = %txn, "transfer done");
                Ok(TransferResponse {
                    txn_id: txn,
                    last_modified: row.last_modified,
                })
            }
            Err(err) => {
                warn!(target: "tandem::tcc", txn = %txn, error = %err,
                      "confirm phase failed, re-driving");
                self.recover_from_error(txn, req, TxnState::Applied)?;
                Err(err)
            }
        }
    }

    /// Try phase: tentative deltas on both resources, then caller hooks
    fn apply_transaction(
        &self,
        txn: TxnId,
        req: &TransferRequest,
        callbacks: &[TransferCallback],
    ) -> Result<()> {
        self.handler.apply(&req.source, txn, req)?;
        self.handler.apply(&req.destination, txn, req)?;

        for callback in callbacks {
            callback()?;
        }

        self.transition(txn, TxnState::Pending, TxnState::Applied)?;
        Ok(())
    }

    /// Confirm phase: release both pending entries and finish the row
    fn commit_transaction(&self, txn: TxnId, req: &TransferRequest) -> Result<TxnRecord> {
        self.handler.confirm(&req.source, txn)?;
        self.handler.confirm(&req.destination, txn)?;
        self.transition(txn, TxnState::Applied, TxnState::Done)
    }

    /// Compensation: unwind both resources, destination first
    ///
    /// A pending-list miss on either resource is success; the entry was
    /// never installed or an earlier cancellation already released it.
    fn cancel_transaction(&self, txn: TxnId, req: &TransferRequest) -> Result<()> {
        if let Err(err) = self.handler.cancel(&req.destination, txn, req) {
            if !err.is_pending_txn_not_found() {
                return Err(err);
            }
        }
        if let Err(err) = self.handler.cancel(&req.source, txn, req) {
            if !err.is_pending_txn_not_found() {
                return Err(err);
            }
        }
        self.transition(txn, TxnState::Canceling, TxnState::Cancelled)?;
        info!(target: "tandem::tcc", txn = %txn, "transfer cancelled");
        Ok(())
    }

    /// Drive a transaction to a terminal state from `observed_state`
    ///
    /// - `Pending`: journal `Pending -> Canceling` first, then unwind both
    ///   resources. The early transition is safe even when no try has
    ///   landed, because cancel is idempotent on a pending-list miss.
    /// - `Applied`: both deltas are in place; re-drive confirm to `Done`.
    /// - `Canceling`: an earlier cancellation died part-way; finish it.
    /// - `Done` / `Cancelled`: nothing to do.
    pub fn recover_from_error(
        &self,
        txn: TxnId,
        req: &TransferRequest,
        observed_state: TxnState,
    ) -> Result<()> {
        match observed_state {
            TxnState::Pending => {
                self.transition(txn, TxnState::Pending, TxnState::Canceling)?;
                self.cancel_transaction(txn, req)
            }
            TxnState::Applied => self.commit_transaction(txn, req).map(|_| ()),
            TxnState::Canceling => self.cancel_transaction(txn, req),
            TxnState::Done | TxnState::Cancelled => Ok(()),
        }
    }

    /// Sweep recovery over every non-terminal journal state
    ///
    /// Rows modified at or after `recover_before` are left alone so the
    /// sweep never races a live transfer. Rows whose state moved between
    /// the listing and the recovery action are skipped; safe to run
    /// concurrently with traffic because every resource-level write is
    /// idempotent and version-guarded.
    ///
    /// # Errors
    ///
    /// The first journal or resource error aborts the sweep; rerunning it
    /// is always safe.
    pub fn recover_transactions(&self, recover_before: DateTime<Utc>) -> Result<()> {
        for state in [TxnState::Canceling, TxnState::Applied, TxnState::Pending] {
            for row in self.journal.list_all_in_state(state)? {
                if row.last_modified >= recover_before {
                    continue;
                }
                let req = TransferRequest::from(&row);
                debug!(target: "tandem::tcc", txn = %row.id, state = %state, "recovering");
                match self.recover_from_error(row.id, &req, state) {
                    Ok(()) => {}
                    Err(Error::InvalidTransition { id, from, to }) => {
                        debug!(target: "tandem::tcc", txn = %id, from = %from, to = %to,
                               "row moved since listing, skipping");
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(())
    }

    /// Journal rows in `state` carrying `reference`
    pub fn transactions_in_state(
        &self,
        state: TxnState,
        reference: &str,
    ) -> Result<Vec<TxnRecord>> {
        self.journal.list_in_state(state, reference)
    }

    /// Guarded journal transition
    ///
    /// The journal itself applies no guard, so the service checks the
    /// observed state before writing; a mismatch means another worker (or a
    /// recovery sweep) got there first.
    fn transition(&self, txn: TxnId, from: TxnState, to: TxnState) -> Result<TxnRecord> {
        let row = self.journal.get(txn)?;
        if row.state != from {
            return Err(Error::invalid_transition(txn, row.state, to));
        }
        self.journal.update_state(txn, to)
    }
}
