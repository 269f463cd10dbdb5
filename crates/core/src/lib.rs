//! Core types for the Tandem commit engines
//!
//! This crate defines the foundational vocabulary shared by both engines:
//! - Resource and transaction records for the TCC transfer coordinator
//! - The transaction state machine (`TxnState`)
//! - Storage traits (`ResourceStore`, `TxnJournal`, `KvStore`) that decouple
//!   the engines from any particular persistence back-end
//! - The unified `Error` type and `Result` alias
//!
//! Upper layers (tandem-tcc, tandem-repl) depend only on this crate's traits;
//! the in-memory reference implementations live in tandem-storage.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::{KvStore, ResourceStore, ResourceUpdate, TxnJournal};
pub use types::{
    ResourceRecord, TransferRequest, TransferResponse, TxnId, TxnRecord, TxnState,
};
