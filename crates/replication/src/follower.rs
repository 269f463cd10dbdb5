//! Follower node: serves the three protocol phases
//!
//! State lives in an inner structure shared with the autocommit timer
//! threads. The follower is the sole writer of its own height, cache, and
//! cancel map.
//!
//! ## Commit once-token
//!
//! In three-phase mode a height can be committed by two racing paths: the
//! coordinator's commit order and the follower's own precommit timer. The
//! cancel flag suppresses a timer that has not fired yet; for the window
//! where both paths are already running, the commit application path is
//! serialized by `commit_lock` and gated on `index == height`. Whichever
//! branch takes the lock first persists and bumps the height; the other
//! observes a stale index and acknowledges without writing. At most one
//! persistent write per height.

use crate::cache::NodeCache;
use crate::config::ReplicationConfig;
use crate::hooks::Hooks;
use crate::message::{
    CommitOrigin, CommitRequest, CommitType, Info, PrecommitRequest, ProposeRequest, Response,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tandem_core::{KvStore, Result};
use tracing::{debug, error, info, warn};

struct FollowerInner {
    addr: String,
    commit_type: CommitType,
    timeout: Duration,
    cache: NodeCache,
    height: AtomicU64,
    cancel_commit: RwLock<HashMap<u64, bool>>,
    commit_lock: Mutex<()>,
    kv: Arc<dyn KvStore>,
    hooks: Hooks,
}

impl FollowerInner {
    fn set_cancel(&self, height: u64, do_cancel: bool) {
        self.cancel_commit.write().insert(height, do_cancel);
    }

    fn cancel_requested(&self, height: u64) -> bool {
        self.cancel_commit
            .read()
            .get(&height)
            .copied()
            .unwrap_or(false)
    }

    /// The single commit application path, shared by coordinator-ordered
    /// commits and timer autocommits
    fn apply_commit(&self, req: &CommitRequest, origin: CommitOrigin) -> Result<Response> {
        let _guard = self.commit_lock.lock();

        let height = self.height.load(Ordering::SeqCst);
        if req.index < height {
            // The racing branch already committed this height
            debug!(
                target: "tandem::repl",
                addr = %self.addr, index = req.index, height,
                "height already committed, acknowledging"
            );
            return Ok(Response::ack());
        }
        if req.index > height {
            warn!(
                target: "tandem::repl",
                addr = %self.addr, index = req.index, height,
                "commit ahead of local height refused"
            );
            return Ok(Response::nack());
        }

        if !(self.hooks.commit)(req) {
            warn!(target: "tandem::repl", addr = %self.addr, index = req.index,
                  "commit hook rejected, dropping staged write");
            self.cache.delete(req.index);
            return Ok(Response::nack());
        }

        let write = match self.cache.get(req.index) {
            Some(write) => write,
            None => {
                warn!(target: "tandem::repl", addr = %self.addr, index = req.index,
                      "no staged write at height");
                self.cache.delete(req.index);
                return Ok(Response::nack());
            }
        };

        self.kv.put(&write.key, &write.value)?;
        self.cache.delete(req.index);
        self.height.fetch_add(1, Ordering::SeqCst);
        self.cancel_commit.write().remove(&req.index);
        info!(
            target: "tandem::repl",
            addr = %self.addr, index = req.index, key = %write.key, ?origin,
            "committed"
        );
        Ok(Response::ack())
    }

    /// Discard the staged write at the current height without persisting
    fn rollback(&self) {
        let height = self.height.load(Ordering::SeqCst);
        self.cache.delete(height);
        info!(target: "tandem::repl", addr = %self.addr, height, "rolled back staged write");
    }
}

/// A single replication follower
///
/// Cloneable handle over shared state; the precommit timer threads hold
/// their own reference to it.
#[derive(Clone)]
pub struct FollowerNode {
    inner: Arc<FollowerInner>,
}

impl FollowerNode {
    /// Build a follower from its config, KV sink, and policy hooks
    pub fn new(config: &ReplicationConfig, kv: Arc<dyn KvStore>, hooks: Hooks) -> Self {
        info!(
            target: "tandem::repl",
            addr = %config.node_addr,
            commit_type = %config.commit_type,
            "follower starting"
        );
        Self {
            inner: Arc::new(FollowerInner {
                addr: config.node_addr.clone(),
                commit_type: config.commit_type,
                timeout: Duration::from_millis(config.timeout_ms),
                cache: NodeCache::new(),
                height: AtomicU64::new(0),
                cancel_commit: RwLock::new(HashMap::new()),
                commit_lock: Mutex::new(()),
                kv,
                hooks,
            }),
        }
    }

    /// This node's bind address
    pub fn addr(&self) -> &str {
        &self.inner.addr
    }

    /// The node's current height
    pub fn height(&self) -> u64 {
        self.inner.height.load(Ordering::SeqCst)
    }

    /// The node's pending-write cache, for inspection
    pub fn cache(&self) -> &NodeCache {
        &self.inner.cache
    }

    /// Status report
    pub fn node_info(&self) -> Info {
        Info {
            height: self.height(),
        }
    }

    /// Phase 1: stage the proposed write if the propose hook accepts it
    pub fn propose(&self, req: &ProposeRequest) -> Response {
        self.inner.set_cancel(req.index, false);

        if !(self.inner.hooks.propose)(req) {
            warn!(target: "tandem::repl", addr = %self.addr(), index = req.index,
                  key = %req.key, "propose hook rejected");
            return Response::nack();
        }

        info!(target: "tandem::repl", addr = %self.addr(), index = req.index,
              key = %req.key, "proposal staged");
        self.inner.cache.set(req.index, &req.key, &req.value);
        Response::ack()
    }

    /// Phase 2: acknowledge; in three-phase mode also arm the autocommit
    /// timer for this height
    ///
    /// The reply never waits for the timer. When the deadline passes
    /// without a coordinator commit (cancel flag still false), the timer
    /// drives the node's own commit path tagged as an autocommit.
    pub fn precommit(&self, req: &PrecommitRequest) -> Response {
        if self.inner.commit_type == CommitType::ThreePhase {
            let inner = Arc::clone(&self.inner);
            let index = req.index;
            std::thread::spawn(move || {
                std::thread::sleep(inner.timeout);
                if inner.cancel_requested(index) {
                    return;
                }
                info!(target: "tandem::repl", addr = %inner.addr, index,
                      "no commit order within deadline, autocommitting");
                let request = CommitRequest {
                    index,
                    is_rollback: false,
                };
                if let Err(e) = inner.apply_commit(&request, CommitOrigin::Autocommit) {
                    error!(target: "tandem::repl", addr = %inner.addr, index,
                           error = %e, "autocommit failed");
                }
            });
        }
        Response::ack()
    }

    /// Phase 3: persist the staged write, roll it back, or absorb the
    /// autocommit race
    ///
    /// # Errors
    ///
    /// Returns a storage error if the KV write fails; protocol refusals
    /// are NACK responses, not errors.
    pub fn commit(&self, req: &CommitRequest, origin: CommitOrigin) -> Result<Response> {
        match self.inner.commit_type {
            CommitType::TwoPhase => self.inner.apply_commit(req, origin),
            CommitType::ThreePhase => {
                if req.is_rollback {
                    self.inner.rollback();
                    return Ok(Response::ack());
                }
                if origin == CommitOrigin::Coordinator {
                    // Inhibit the precommit timer before touching anything
                    self.inner.set_cancel(req.index, true);
                }
                self.inner.apply_commit(req, origin)
            }
        }
    }
}

impl std::fmt::Debug for FollowerNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FollowerNode")
            .field("addr", &self.inner.addr)
            .field("height", &self.height())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tandem_core::KvStore;
    use tandem_storage::MemoryKvStore;

    fn follower(commit_type: CommitType, timeout_ms: u64) -> (FollowerNode, Arc<MemoryKvStore>) {
        let kv = Arc::new(MemoryKvStore::new());
        let config = ReplicationConfig {
            commit_type,
            timeout_ms,
            ..Default::default()
        };
        let kv_sink: Arc<dyn KvStore> = kv.clone();
        let node = FollowerNode::new(&config, kv_sink, Hooks::allow_all());
        (node, kv)
    }

    fn propose_at(node: &FollowerNode, index: u64, key: &str, value: &[u8]) {
        let resp = node.propose(&ProposeRequest {
            key: key.to_string(),
            value: value.to_vec(),
            commit_type: CommitType::TwoPhase,
            index,
        });
        assert!(resp.is_ack());
    }

    #[test]
    fn test_propose_stages_write() {
        let (node, _) = follower(CommitType::TwoPhase, 1000);
        propose_at(&node, 0, "k", b"v");

        let staged = node.cache().get(0).unwrap();
        assert_eq!(staged.key, "k");
        assert_eq!(staged.value, b"v");
    }

    #[test]
    fn test_propose_hook_veto_stages_nothing() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let hooks = Hooks::new(Arc::new(|_| false), Arc::new(|_| true));
        let node = FollowerNode::new(&ReplicationConfig::default(), kv, hooks);

        let resp = node.propose(&ProposeRequest {
            key: "k".to_string(),
            value: b"v".to_vec(),
            commit_type: CommitType::TwoPhase,
            index: 0,
        });

        assert!(!resp.is_ack());
        assert!(node.cache().is_empty());
    }

    #[test]
    fn test_two_phase_commit_persists_and_advances() {
        let (node, kv) = follower(CommitType::TwoPhase, 1000);
        propose_at(&node, 0, "k", b"v");
        assert!(node.precommit(&PrecommitRequest { index: 0 }).is_ack());

        let resp = node
            .commit(
                &CommitRequest {
                    index: 0,
                    is_rollback: false,
                },
                CommitOrigin::Coordinator,
            )
            .unwrap();

        assert!(resp.is_ack());
        assert_eq!(kv.get("k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(node.height(), 1);
        assert!(node.cache().is_empty());
    }

    #[test]
    fn test_commit_hook_veto_drops_staged_write() {
        let kv = Arc::new(MemoryKvStore::new());
        let kv_sink: Arc<dyn KvStore> = kv.clone();
        let hooks = Hooks::new(Arc::new(|_| true), Arc::new(|_| false));
        let node = FollowerNode::new(&ReplicationConfig::default(), kv_sink, hooks);
        propose_at(&node, 0, "k", b"v");

        let resp = node
            .commit(
                &CommitRequest {
                    index: 0,
                    is_rollback: false,
                },
                CommitOrigin::Coordinator,
            )
            .unwrap();

        assert!(!resp.is_ack());
        assert!(node.cache().is_empty(), "veto discards the staged write");
        assert_eq!(kv.get("k").unwrap(), None);
        assert_eq!(node.height(), 0, "vetoed commit must not advance height");
    }

    #[test]
    fn test_commit_without_staged_write_nacks() {
        let (node, _) = follower(CommitType::TwoPhase, 1000);
        let resp = node
            .commit(
                &CommitRequest {
                    index: 0,
                    is_rollback: false,
                },
                CommitOrigin::Coordinator,
            )
            .unwrap();
        assert!(!resp.is_ack());
        assert_eq!(node.height(), 0);
    }

    #[test]
    fn test_commit_ahead_of_height_nacks() {
        let (node, kv) = follower(CommitType::TwoPhase, 1000);
        propose_at(&node, 5, "k", b"v");

        let resp = node
            .commit(
                &CommitRequest {
                    index: 5,
                    is_rollback: false,
                },
                CommitOrigin::Coordinator,
            )
            .unwrap();

        assert!(!resp.is_ack());
        assert_eq!(kv.get("k").unwrap(), None);
    }

    #[test]
    fn test_stale_commit_acks_without_writing() {
        let (node, kv) = follower(CommitType::TwoPhase, 1000);
        propose_at(&node, 0, "k", b"v1");
        node.commit(
            &CommitRequest {
                index: 0,
                is_rollback: false,
            },
            CommitOrigin::Coordinator,
        )
        .unwrap();

        // A replayed commit for height 0 must be absorbed idempotently
        let resp = node
            .commit(
                &CommitRequest {
                    index: 0,
                    is_rollback: false,
                },
                CommitOrigin::Coordinator,
            )
            .unwrap();

        assert!(resp.is_ack());
        assert_eq!(node.height(), 1, "height advanced exactly once");
        assert_eq!(kv.get("k").unwrap(), Some(b"v1".to_vec()));
    }

    #[test]
    fn test_three_phase_rollback_discards_staged_write() {
        let (node, kv) = follower(CommitType::ThreePhase, 10_000);
        propose_at(&node, 0, "k", b"v");

        let resp = node
            .commit(
                &CommitRequest {
                    index: 0,
                    is_rollback: true,
                },
                CommitOrigin::Coordinator,
            )
            .unwrap();

        assert!(resp.is_ack());
        assert!(node.cache().is_empty());
        assert_eq!(kv.get("k").unwrap(), None);
        assert_eq!(node.height(), 0);
    }

    #[test]
    fn test_three_phase_autocommit_fires_after_deadline() {
        let (node, kv) = follower(CommitType::ThreePhase, 30);
        propose_at(&node, 0, "k", b"v");
        assert!(node.precommit(&PrecommitRequest { index: 0 }).is_ack());

        // No commit order arrives; the timer must finish the job
        std::thread::sleep(Duration::from_millis(120));

        assert_eq!(kv.get("k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(node.height(), 1);
        assert!(node.cache().is_empty());
    }

    #[test]
    fn test_three_phase_commit_suppresses_autocommit() {
        let (node, kv) = follower(CommitType::ThreePhase, 40);
        propose_at(&node, 0, "k", b"v");
        assert!(node.precommit(&PrecommitRequest { index: 0 }).is_ack());

        // Coordinator commit lands before the deadline
        let resp = node
            .commit(
                &CommitRequest {
                    index: 0,
                    is_rollback: false,
                },
                CommitOrigin::Coordinator,
            )
            .unwrap();
        assert!(resp.is_ack());

        // Wait out the timer; the height must not advance twice
        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(node.height(), 1);
        assert_eq!(kv.get("k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn test_autocommit_and_commit_race_is_single_write() {
        // A near-zero deadline makes the timer race the commit order directly
        let (node, kv) = follower(CommitType::ThreePhase, 1);
        propose_at(&node, 0, "k", b"v");
        assert!(node.precommit(&PrecommitRequest { index: 0 }).is_ack());

        let resp = node
            .commit(
                &CommitRequest {
                    index: 0,
                    is_rollback: false,
                },
                CommitOrigin::Coordinator,
            )
            .unwrap();
        assert!(resp.is_ack());

        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(node.height(), 1, "exactly one branch may commit");
        assert_eq!(kv.get("k").unwrap(), Some(b"v".to_vec()));
    }
}
