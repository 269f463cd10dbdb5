//! Wire messages for the replication protocol
//!
//! These are the transport-neutral request/response shapes; a real
//! transport maps them onto its own encoding. The autocommit marker of the
//! commit phase travels as `CommitOrigin`, out of band of `CommitRequest`
//! itself, mirroring request metadata.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which commit protocol a deployment runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitType {
    /// Two-phase commit; calls block, no timers
    #[serde(rename = "two-phase")]
    TwoPhase,
    /// Three-phase commit; deadlines on every RPC plus follower autocommit
    #[serde(rename = "three-phase")]
    ThreePhase,
}

impl Default for CommitType {
    fn default() -> Self {
        CommitType::TwoPhase
    }
}

impl fmt::Display for CommitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitType::TwoPhase => write!(f, "two-phase"),
            CommitType::ThreePhase => write!(f, "three-phase"),
        }
    }
}

/// Acknowledgment kind carried by every protocol response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AckType {
    /// Phase accepted
    Ack,
    /// Phase refused
    Nack,
}

/// Protocol response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Whether the phase was accepted
    #[serde(rename = "type")]
    pub kind: AckType,
}

impl Response {
    /// An accepting response
    pub fn ack() -> Self {
        Self { kind: AckType::Ack }
    }

    /// A refusing response
    pub fn nack() -> Self {
        Self {
            kind: AckType::Nack,
        }
    }

    /// Whether this response accepts the phase
    pub fn is_ack(&self) -> bool {
        self.kind == AckType::Ack
    }
}

/// Phase 1: ask a follower to stage a write at a height
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposeRequest {
    /// Key to replicate
    pub key: String,
    /// Value to replicate
    pub value: Vec<u8>,
    /// Protocol the coordinator is running
    pub commit_type: CommitType,
    /// Height the write is staged at
    pub index: u64,
}

/// Phase 2: announce that all followers accepted the proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecommitRequest {
    /// Height being precommitted
    pub index: u64,
}

/// Phase 3: order the staged write persisted (or rolled back)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRequest {
    /// Height being committed
    pub index: u64,
    /// Discard the staged write instead of persisting it (3PC only)
    pub is_rollback: bool,
}

/// Where a commit order came from
///
/// Carried as request metadata, not as a `CommitRequest` field: the
/// coordinator never sends it, only the follower's own timeout path does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOrigin {
    /// The coordinator ordered the commit
    Coordinator,
    /// The follower's precommit timer fired without a commit order
    Autocommit,
}

/// A key/value pair submitted for replication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Key
    pub key: String,
    /// Value
    pub value: Vec<u8>,
}

/// A key lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Msg {
    /// Key to look up
    pub key: String,
}

/// A lookup result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Value {
    /// Stored bytes
    pub value: Vec<u8>,
}

/// Node status report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    /// The node's current height
    pub height: u64,
}
