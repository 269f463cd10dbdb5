//! In-memory resource store with optimistic locking
//!
//! `update_if_version` is the heart of the TCC engine: the manager reads a
//! record, computes the post-image, and asks the store to install it only
//! if nobody else won the version race in between. Losing the race is not
//! an error here; it is reported as zero rows affected and the manager
//! decides whether to retry.

use parking_lot::RwLock;
use std::collections::HashMap;
use tandem_core::{Error, ResourceRecord, ResourceStore, ResourceUpdate, Result};
use tracing::debug;

/// Resource table backed by a `RwLock<HashMap>`
///
/// The write lock makes compare-version-then-install atomic, which is the
/// whole contract of `update_if_version`. Reads clone the record so callers
/// never observe a half-applied update.
#[derive(Debug, Default)]
pub struct MemoryResourceStore {
    records: RwLock<HashMap<String, ResourceRecord>>,
}

impl MemoryResourceStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in the store
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the store holds no records
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl ResourceStore for MemoryResourceStore {
    fn get(&self, id: &str) -> Result<ResourceRecord> {
        self.records
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::resource_not_found(id))
    }

    fn insert(&self, record: ResourceRecord) -> Result<()> {
        let mut records = self.records.write();
        if records.contains_key(&record.id) {
            return Err(Error::storage(format!(
                "resource {} already exists",
                record.id
            )));
        }
        records.insert(record.id.clone(), record);
        Ok(())
    }

    fn update_if_version(
        &self,
        id: &str,
        expected_version: u64,
        update: ResourceUpdate,
    ) -> Result<u64> {
        let mut records = self.records.write();
        let record = records
            .get_mut(id)
            .ok_or_else(|| Error::resource_not_found(id))?;

        if record.version != expected_version {
            debug!(
                target: "tandem::storage",
                resource = id,
                expected = expected_version,
                actual = record.version,
                "conditional update lost the version race"
            );
            return Ok(0);
        }

        record.balance = update.balance;
        record.pending = update.pending;
        record.version = update.version;
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tandem_core::TxnId;

    fn update_from(record: &ResourceRecord, delta: i64) -> ResourceUpdate {
        ResourceUpdate {
            balance: record.balance + delta,
            pending: record.pending.clone(),
            version: record.version + 1,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let store = MemoryResourceStore::new();
        store.insert(ResourceRecord::new("a", 100)).unwrap();

        let record = store.get("a").unwrap();
        assert_eq!(record.balance, 100);
        assert_eq!(record.version, 0);
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let store = MemoryResourceStore::new();
        let err = store.get("ghost").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_double_insert_rejected() {
        let store = MemoryResourceStore::new();
        store.insert(ResourceRecord::new("a", 1)).unwrap();
        assert!(store.insert(ResourceRecord::new("a", 2)).is_err());
        // First record untouched
        assert_eq!(store.get("a").unwrap().balance, 1);
    }

    #[test]
    fn test_conditional_update_succeeds_on_matching_version() {
        let store = MemoryResourceStore::new();
        store.insert(ResourceRecord::new("a", 100)).unwrap();

        let record = store.get("a").unwrap();
        let rows = store
            .update_if_version("a", record.version, update_from(&record, -10))
            .unwrap();
        assert_eq!(rows, 1);

        let after = store.get("a").unwrap();
        assert_eq!(after.balance, 90);
        assert_eq!(after.version, 1);
    }

    #[test]
    fn test_conditional_update_stale_version_affects_zero_rows() {
        let store = MemoryResourceStore::new();
        store.insert(ResourceRecord::new("a", 100)).unwrap();

        let stale = store.get("a").unwrap();
        // Another writer bumps the version first
        store
            .update_if_version("a", 0, update_from(&stale, -10))
            .unwrap();

        let rows = store
            .update_if_version("a", 0, update_from(&stale, -10))
            .unwrap();
        assert_eq!(rows, 0, "stale writer must lose");
        assert_eq!(store.get("a").unwrap().balance, 90, "only one delta landed");
    }

    #[test]
    fn test_conditional_update_missing_resource() {
        let store = MemoryResourceStore::new();
        let err = store
            .update_if_version(
                "ghost",
                0,
                ResourceUpdate {
                    balance: 0,
                    pending: vec![],
                    version: 1,
                },
            )
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_pending_list_installed_verbatim() {
        let store = MemoryResourceStore::new();
        store.insert(ResourceRecord::new("a", 50)).unwrap();
        let txn = TxnId::new();

        let record = store.get("a").unwrap();
        let mut pending = record.pending.clone();
        pending.push(txn);
        store
            .update_if_version(
                "a",
                record.version,
                ResourceUpdate {
                    balance: record.balance,
                    pending,
                    version: record.version + 1,
                },
            )
            .unwrap();

        let after = store.get("a").unwrap();
        assert!(after.has_pending(&txn));
    }

    #[test]
    fn test_concurrent_writers_apply_each_delta_once() {
        let store = Arc::new(MemoryResourceStore::new());
        store.insert(ResourceRecord::new("a", 0)).unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                // Retry until this writer's increment lands
                loop {
                    let record = store.get("a").unwrap();
                    let rows = store
                        .update_if_version("a", record.version, update_from(&record, 1))
                        .unwrap();
                    if rows == 1 {
                        break;
                    }
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        let record = store.get("a").unwrap();
        assert_eq!(record.balance, 8);
        assert_eq!(record.version, 8, "one version bump per landed write");
    }
}
