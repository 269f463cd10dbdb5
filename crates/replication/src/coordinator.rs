//! Coordinator node: fans the protocol out to the followers
//!
//! `put` stages the write in the coordinator's own cache, walks the
//! followers through propose and precommit, persists locally, orders the
//! commit, then releases the cache slot and advances the height. Any
//! follower error, deadline expiry, or NACK turns the whole put into a
//! NACK with no cleanup broadcast; followers either time out into
//! autocommit (3PC) or keep the staged write for an operator to sweep.

use crate::cache::NodeCache;
use crate::config::ReplicationConfig;
use crate::message::{
    CommitOrigin, CommitRequest, CommitType, Entry, Info, PrecommitRequest, ProposeRequest,
    Response,
};
use crate::transport::{call_with_deadline, FollowerClient};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tandem_core::{Error, KvStore, Result};
use tracing::{info, warn};

/// The replication coordinator
pub struct CoordinatorNode {
    followers: Vec<Arc<dyn FollowerClient>>,
    cache: NodeCache,
    kv: Arc<dyn KvStore>,
    height: AtomicU64,
    commit_type: CommitType,
    timeout: Duration,
}

impl CoordinatorNode {
    /// Build a coordinator from its config, follower clients, and KV sink
    pub fn new(
        config: &ReplicationConfig,
        followers: Vec<Arc<dyn FollowerClient>>,
        kv: Arc<dyn KvStore>,
    ) -> Self {
        info!(
            target: "tandem::repl",
            addr = %config.node_addr,
            commit_type = %config.commit_type,
            followers = followers.len(),
            "coordinator starting"
        );
        Self {
            followers,
            cache: NodeCache::new(),
            kv,
            height: AtomicU64::new(0),
            commit_type: config.commit_type,
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// The coordinator's current height
    pub fn height(&self) -> u64 {
        self.height.load(Ordering::SeqCst)
    }

    /// The coordinator's pending-write cache, for inspection
    pub fn cache(&self) -> &NodeCache {
        &self.cache
    }

    /// Status report
    pub fn node_info(&self) -> Info {
        Info {
            height: self.height(),
        }
    }

    /// One follower call, wrapped with the deadline in three-phase mode
    fn call_follower<F>(&self, phase: &'static str, call: F) -> Result<Response>
    where
        F: FnOnce() -> Result<Response> + Send + 'static,
    {
        match self.commit_type {
            CommitType::ThreePhase => call_with_deadline(phase, self.timeout, call),
            CommitType::TwoPhase => call(),
        }
    }

    /// Replicate one entry to every follower
    ///
    /// Returns ACK when all followers acknowledged all three phases and
    /// the local persist succeeded; returns NACK on any follower error,
    /// deadline expiry, or refusal.
    ///
    /// # Errors
    ///
    /// Only local failures are errors: a missing cache slot or a KV write
    /// failure on the coordinator itself.
    pub fn put(&self, entry: &Entry) -> Result<Response> {
        let height = self.height.load(Ordering::SeqCst);
        self.cache.set(height, &entry.key, &entry.value);

        // Propose phase
        let propose = ProposeRequest {
            key: entry.key.clone(),
            value: entry.value.clone(),
            commit_type: self.commit_type,
            index: height,
        };
        for follower in &self.followers {
            let client = Arc::clone(follower);
            let req = propose.clone();
            let result = self.call_follower("propose", move || client.propose(&req));
            if !self.phase_accepted("propose", follower.addr(), result) {
                return Ok(Response::nack());
            }
        }

        // Precommit phase
        let precommit = PrecommitRequest { index: height };
        for follower in &self.followers {
            let client = Arc::clone(follower);
            let result = self.call_follower("precommit", move || client.precommit(&precommit));
            if !self.phase_accepted("precommit", follower.addr(), result) {
                return Ok(Response::nack());
            }
        }

        // Persist locally before ordering the commit; the coordinator keeps
        // its own copy of every replicated entry
        let staged = self.cache.get(height).ok_or_else(|| {
            Error::storage(format!("no staged write at height {height} on coordinator"))
        })?;
        self.kv.put(&staged.key, &staged.value)?;

        // Commit phase
        let commit = CommitRequest {
            index: height,
            is_rollback: false,
        };
        for follower in &self.followers {
            let client = Arc::clone(follower);
            let result = self.call_follower("commit", move || {
                client.commit(&commit, CommitOrigin::Coordinator)
            });
            if !self.phase_accepted("commit", follower.addr(), result) {
                return Ok(Response::nack());
            }
        }

        self.cache.delete(height);
        self.height.fetch_add(1, Ordering::SeqCst);
        info!(target: "tandem::repl", height, key = %entry.key, "put replicated");
        Ok(Response::ack())
    }

    /// Whether a phase call came back as an ACK, logging the failure if not
    fn phase_accepted(&self, phase: &str, addr: &str, result: Result<Response>) -> bool {
        match result {
            Ok(resp) if resp.is_ack() => true,
            Ok(_) => {
                warn!(target: "tandem::repl", phase, follower = addr, "follower refused phase");
                false
            }
            Err(err) => {
                warn!(target: "tandem::repl", phase, follower = addr, error = %err,
                      "phase call failed");
                false
            }
        }
    }

    /// Read a key straight from the coordinator's KV store
    ///
    /// # Errors
    ///
    /// Returns a storage error if the read fails.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.kv.get(key)
    }
}

impl std::fmt::Debug for CoordinatorNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinatorNode")
            .field("height", &self.height())
            .field("followers", &self.followers.len())
            .field("commit_type", &self.commit_type)
            .finish_non_exhaustive()
    }
}
