//! In-memory transaction journal
//!
//! Rows live in a `RwLock<HashMap>`; list queries filter and sort by
//! `last_modified` then id so recovery sweeps see a reproducible order.
//! `update_state` applies no transition guard beyond row existence; the
//! orchestrator owns legality.

use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use tandem_core::{Error, Result, TxnId, TxnJournal, TxnRecord, TxnState};
use tracing::debug;

/// Journal table backed by a `RwLock<HashMap>`
#[derive(Debug, Default)]
pub struct MemoryJournal {
    rows: RwLock<HashMap<TxnId, TxnRecord>>,
}

impl MemoryJournal {
    /// Create an empty journal
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows in the journal
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Whether the journal holds no rows
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    fn sorted(mut rows: Vec<TxnRecord>) -> Vec<TxnRecord> {
        rows.sort_by(|a, b| {
            a.last_modified
                .cmp(&b.last_modified)
                .then_with(|| a.id.to_string().cmp(&b.id.to_string()))
        });
        rows
    }
}

impl TxnJournal for MemoryJournal {
    fn insert(
        &self,
        source: &str,
        destination: &str,
        reference: &str,
        value: i64,
    ) -> Result<TxnId> {
        let id = TxnId::new();
        let record = TxnRecord {
            id,
            reference: reference.to_string(),
            state: TxnState::Pending,
            source: source.to_string(),
            destination: destination.to_string(),
            value,
            last_modified: Utc::now(),
        };
        self.rows.write().insert(id, record);
        debug!(target: "tandem::journal", txn = %id, source, destination, value, "journal row created");
        Ok(id)
    }

    fn update_state(&self, id: TxnId, state: TxnState) -> Result<TxnRecord> {
        let mut rows = self.rows.write();
        let record = rows.get_mut(&id).ok_or_else(|| Error::txn_not_found(id))?;
        record.state = state;
        record.last_modified = Utc::now();
        debug!(target: "tandem::journal", txn = %id, state = %state, "journal state updated");
        Ok(record.clone())
    }

    fn get(&self, id: TxnId) -> Result<TxnRecord> {
        self.rows
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::txn_not_found(id))
    }

    fn list_in_state(&self, state: TxnState, reference: &str) -> Result<Vec<TxnRecord>> {
        let rows = self
            .rows
            .read()
            .values()
            .filter(|r| r.state == state && r.reference == reference)
            .cloned()
            .collect();
        Ok(Self::sorted(rows))
    }

    fn list_all_in_state(&self, state: TxnState) -> Result<Vec<TxnRecord>> {
        let rows = self
            .rows
            .read()
            .values()
            .filter(|r| r.state == state)
            .cloned()
            .collect();
        Ok(Self::sorted(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_creates_pending_row() {
        let journal = MemoryJournal::new();
        let id = journal.insert("a", "b", "ref-1", 10).unwrap();

        let row = journal.get(id).unwrap();
        assert_eq!(row.state, TxnState::Pending);
        assert_eq!(row.source, "a");
        assert_eq!(row.destination, "b");
        assert_eq!(row.reference, "ref-1");
        assert_eq!(row.value, 10);
    }

    #[test]
    fn test_update_state_refreshes_last_modified() {
        let journal = MemoryJournal::new();
        let id = journal.insert("a", "b", "", 1).unwrap();
        let before = journal.get(id).unwrap().last_modified;

        std::thread::sleep(std::time::Duration::from_millis(2));
        let row = journal.update_state(id, TxnState::Applied).unwrap();

        assert_eq!(row.state, TxnState::Applied);
        assert!(row.last_modified > before);
    }

    #[test]
    fn test_update_state_missing_row() {
        let journal = MemoryJournal::new();
        let err = journal
            .update_state(TxnId::new(), TxnState::Done)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_list_all_in_state_filters() {
        let journal = MemoryJournal::new();
        let a = journal.insert("x", "y", "", 1).unwrap();
        let b = journal.insert("x", "y", "", 2).unwrap();
        journal.update_state(b, TxnState::Applied).unwrap();

        let pending = journal.list_all_in_state(TxnState::Pending).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, a);

        let applied = journal.list_all_in_state(TxnState::Applied).unwrap();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].id, b);

        assert!(journal.list_all_in_state(TxnState::Done).unwrap().is_empty());
    }

    #[test]
    fn test_list_in_state_filters_by_reference() {
        let journal = MemoryJournal::new();
        let a = journal.insert("x", "y", "batch-1", 1).unwrap();
        journal.insert("x", "y", "batch-2", 2).unwrap();

        let rows = journal.list_in_state(TxnState::Pending, "batch-1").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, a);
    }

    #[test]
    fn test_list_order_is_oldest_first() {
        let journal = MemoryJournal::new();
        let first = journal.insert("x", "y", "", 1).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = journal.insert("x", "y", "", 2).unwrap();

        let rows = journal.list_all_in_state(TxnState::Pending).unwrap();
        assert_eq!(rows[0].id, first);
        assert_eq!(rows[1].id, second);
    }
}
