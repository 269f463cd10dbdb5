//! Replication engine configuration
//!
//! One explicit record passed at construction; no process-global state.
//! Loadable from a TOML file, with defaults matching a single local
//! follower. `normalize` applies the membership conveniences: a
//! non-coordinator lists itself as a follower, the loopback host is always
//! whitelisted, and a coordinator advertises its own address.

use crate::message::CommitType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tandem_core::{Error, Result};

/// Which protocol role a node plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Fans the protocol out to the followers
    Coordinator,
    /// Serves propose/precommit/commit
    Follower,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Coordinator => write!(f, "coordinator"),
            Role::Follower => write!(f, "follower"),
        }
    }
}

fn default_node_addr() -> String {
    "localhost:3050".to_string()
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_role() -> Role {
    Role::Follower
}

/// Configuration record for one replication node
///
/// # Example
///
/// ```toml
/// role = "coordinator"
/// node_addr = "localhost:3000"
/// followers = ["localhost:3001", "localhost:3002"]
/// commit_type = "three-phase"
/// timeout_ms = 1000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationConfig {
    /// Role this node plays
    #[serde(default = "default_role")]
    pub role: Role,
    /// This node's bind address
    #[serde(default = "default_node_addr")]
    pub node_addr: String,
    /// Coordinator address, for followers
    #[serde(default)]
    pub coordinator: Option<String>,
    /// Follower addresses, for the coordinator
    #[serde(default)]
    pub followers: Vec<String>,
    /// Peer hosts allowed to connect; enforcement belongs to the transport
    #[serde(default)]
    pub whitelist: Vec<String>,
    /// Protocol variant
    #[serde(default)]
    pub commit_type: CommitType,
    /// Per-RPC deadline and autocommit delay in three-phase mode
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Path to a user-supplied hook bundle; loading it is the caller's job
    #[serde(default)]
    pub hooks: Option<PathBuf>,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            role: default_role(),
            node_addr: default_node_addr(),
            coordinator: None,
            followers: Vec::new(),
            whitelist: Vec::new(),
            commit_type: CommitType::default(),
            timeout_ms: default_timeout_ms(),
            hooks: None,
        }
    }
}

impl ReplicationConfig {
    /// Parse a config from TOML text
    ///
    /// # Errors
    ///
    /// Returns `Config` on malformed TOML or unknown field values.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::config(e.to_string()))
    }

    /// Load a config from a TOML file
    ///
    /// # Errors
    ///
    /// Returns `Config` when the file cannot be read or parsed.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::config(format!("cannot read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Apply the membership conveniences
    ///
    /// - a non-coordinator appends its own address to `followers` if absent
    /// - `127.0.0.1` is always whitelisted
    /// - a coordinator advertises its own address as the coordinator
    pub fn normalize(mut self) -> Self {
        match self.role {
            Role::Coordinator => {
                self.coordinator = Some(self.node_addr.clone());
            }
            Role::Follower => {
                if !self.followers.contains(&self.node_addr) {
                    self.followers.push(self.node_addr.clone());
                }
            }
        }
        let loopback = "127.0.0.1".to_string();
        if !self.whitelist.contains(&loopback) {
            self.whitelist.push(loopback);
        }
        self
    }

    /// Check the record for contradictions
    ///
    /// # Errors
    ///
    /// Returns `Config` when three-phase mode has a zero timeout or a
    /// coordinator has no followers to replicate to.
    pub fn validate(&self) -> Result<()> {
        if self.commit_type == CommitType::ThreePhase && self.timeout_ms == 0 {
            return Err(Error::config(
                "three-phase mode requires a non-zero timeout_ms",
            ));
        }
        if self.role == Role::Coordinator && self.followers.is_empty() {
            return Err(Error::config("coordinator configured with no followers"));
        }
        Ok(())
    }
}
