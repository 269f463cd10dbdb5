//! # Tandem
//!
//! Two independent distributed-commit engines in one workspace, a study in
//! atomic updates across multiple resource managers:
//!
//! - **TCC transfer coordinator**: moves a quantity between two
//!   independently owned resources with Try/Confirm/Cancel compensation,
//!   optimistic locking, and journal-driven crash recovery.
//! - **2PC/3PC replication engine**: a coordinator replicates key/value
//!   writes to a fixed set of followers through propose, precommit, and
//!   commit, with timeout-driven autocommit in three-phase mode.
//!
//! # Quick start
//!
//! ```
//! use std::sync::Arc;
//! use tandem::{
//!     MemoryJournal, MemoryResourceStore, ResourceHandler, ResourceManager,
//!     ResourceRecord, TransferRequest, TransferService,
//! };
//!
//! fn main() -> tandem::Result<()> {
//!     let store = Arc::new(MemoryResourceStore::new());
//!     let manager = Arc::new(ResourceManager::new(Arc::clone(&store)));
//!     manager.create(ResourceRecord::new("alice", 100))?;
//!     manager.create(ResourceRecord::new("bob", 100))?;
//!
//!     let service = TransferService::new(manager, Arc::new(MemoryJournal::new()));
//!     let response = service.start_transaction(&TransferRequest::new("alice", "bob", 25))?;
//!     println!("transfer {} done", response.txn_id);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! The engines share only their vocabulary crate: tandem-core holds the
//! record types, the error taxonomy, and the storage traits. In-memory
//! reference stores live in tandem-storage; durable back-ends and network
//! transports are external collaborators behind the same seams
//! (`ResourceStore`, `TxnJournal`, `KvStore`, `FollowerClient`).

pub use tandem_core::{
    Error, KvStore, ResourceRecord, ResourceStore, ResourceUpdate, Result, TransferRequest,
    TransferResponse, TxnId, TxnJournal, TxnRecord, TxnState,
};
pub use tandem_storage::{MemoryJournal, MemoryKvStore, MemoryResourceStore};
pub use tandem_tcc::{
    ResourceHandler, ResourceManager, TransferCallback, TransferService, MAX_UPDATE_RETRIES,
    RETRY_INTERVAL,
};

/// The 2PC/3PC replication engine
pub mod repl {
    pub use tandem_repl::{
        call_with_deadline, AckType, CommitOrigin, CommitRequest, CommitType, CoordinatorNode,
        Entry, FollowerClient, FollowerNode, Hooks, Info, LocalClient, Msg, NodeCache,
        PendingWrite, PrecommitRequest, ProposeRequest, ReplicationConfig, Response, Role, Value,
    };
}
