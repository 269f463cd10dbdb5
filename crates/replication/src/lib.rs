//! 2PC/3PC key/value replication engine
//!
//! A coordinator replicates writes to a fixed set of followers through a
//! staged protocol:
//!
//! ```text
//! Put(k, v):  propose -> precommit -> persist locally -> commit -> height++
//! ```
//!
//! Every node keeps pending writes in a per-height cache until commit. In
//! three-phase mode each follower arms a timer at precommit; if no commit
//! order arrives within the deadline it commits the height on its own, and
//! a per-height once-token keeps the two paths from persisting twice.
//!
//! The RPC transport is a seam (`FollowerClient`); `LocalClient` wires a
//! follower in-process for tests and single-process deployments.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod follower;
pub mod hooks;
pub mod message;
pub mod transport;

pub use cache::{NodeCache, PendingWrite};
pub use config::{ReplicationConfig, Role};
pub use coordinator::CoordinatorNode;
pub use follower::FollowerNode;
pub use hooks::{CommitHook, Hooks, ProposeHook};
pub use message::{
    AckType, CommitOrigin, CommitRequest, CommitType, Entry, Info, Msg, PrecommitRequest,
    ProposeRequest, Response, Value,
};
pub use transport::{call_with_deadline, FollowerClient, LocalClient};
