//! RPC seam between coordinator and followers
//!
//! The real transport is an external collaborator; the engine sees only
//! `FollowerClient`. `LocalClient` wires a follower in-process, which is
//! what the tests and single-process deployments use.

use crate::follower::FollowerNode;
use crate::message::{
    CommitOrigin, CommitRequest, Info, PrecommitRequest, ProposeRequest, Response,
};
use std::sync::mpsc;
use std::time::Duration;
use tandem_core::{Error, Result};

/// Client-side view of one follower
pub trait FollowerClient: Send + Sync {
    /// Address of the follower this client reaches
    fn addr(&self) -> &str;

    /// Send a propose request
    ///
    /// # Errors
    ///
    /// Returns a transport or storage error; a NACK is a response, not an
    /// error.
    fn propose(&self, req: &ProposeRequest) -> Result<Response>;

    /// Send a precommit request
    ///
    /// # Errors
    ///
    /// Returns a transport or storage error.
    fn precommit(&self, req: &PrecommitRequest) -> Result<Response>;

    /// Send a commit request with its origin metadata
    ///
    /// # Errors
    ///
    /// Returns a transport or storage error.
    fn commit(&self, req: &CommitRequest, origin: CommitOrigin) -> Result<Response>;

    /// Ask for the follower's status
    ///
    /// # Errors
    ///
    /// Returns a transport error.
    fn node_info(&self) -> Result<Info>;
}

/// In-process client calling a follower directly
#[derive(Clone, Debug)]
pub struct LocalClient {
    node: FollowerNode,
}

impl LocalClient {
    /// Wrap a follower node
    pub fn new(node: FollowerNode) -> Self {
        Self { node }
    }
}

impl FollowerClient for LocalClient {
    fn addr(&self) -> &str {
        self.node.addr()
    }

    fn propose(&self, req: &ProposeRequest) -> Result<Response> {
        Ok(self.node.propose(req))
    }

    fn precommit(&self, req: &PrecommitRequest) -> Result<Response> {
        Ok(self.node.precommit(req))
    }

    fn commit(&self, req: &CommitRequest, origin: CommitOrigin) -> Result<Response> {
        self.node.commit(req, origin)
    }

    fn node_info(&self) -> Result<Info> {
        Ok(self.node.node_info())
    }
}

/// Run `call` with a deadline
///
/// The call executes on a helper thread while the caller waits on a
/// channel. On expiry the caller gets `Timeout` and moves on; the call
/// itself may still complete on the remote side, which is exactly the
/// window the follower's autocommit timer exists for.
///
/// # Errors
///
/// `Timeout` on expiry, otherwise whatever the call returned.
pub fn call_with_deadline<T, F>(phase: &'static str, timeout: Duration, call: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        // The receiver may be gone if the deadline already expired
        let _ = tx.send(call());
    });
    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(_) => Err(Error::timeout(phase, timeout.as_millis() as u64)),
    }
}
