//! TCC (Try/Confirm/Cancel) transfer coordinator
//!
//! This crate implements compensation-based transfers between two
//! independently owned resources without distributed locks:
//! - `ResourceManager`: Try/Confirm/Cancel on a single resource, retrying
//!   optimistic-lock conflicts
//! - `TransferService`: drives the two-phase lifecycle across both
//!   resources, with the journal as the authoritative state machine and a
//!   sweep-based crash recovery path
//!
//! The service consumes two narrow capabilities, `ResourceHandler` and
//! `TxnJournal`; no back-references between layers.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod manager;
pub mod service;

pub use manager::{ResourceHandler, ResourceManager, MAX_UPDATE_RETRIES, RETRY_INTERVAL};
pub use service::{TransferCallback, TransferService};
