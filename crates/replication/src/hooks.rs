//! User-supplied policy hooks
//!
//! Both follower phases consult a pure, synchronous predicate before
//! acting; a `false` return converts the phase to NACK without side
//! effects. Hooks are injected at construction, so replacing policy is a
//! wiring concern, not a protocol one.

use crate::message::{CommitRequest, ProposeRequest};
use std::fmt;
use std::sync::Arc;

/// Predicate consulted before staging a proposed write
pub type ProposeHook = Arc<dyn Fn(&ProposeRequest) -> bool + Send + Sync>;

/// Predicate consulted before persisting a staged write
pub type CommitHook = Arc<dyn Fn(&CommitRequest) -> bool + Send + Sync>;

/// The hook bundle a follower is constructed with
#[derive(Clone)]
pub struct Hooks {
    /// Propose-phase predicate
    pub propose: ProposeHook,
    /// Commit-phase predicate
    pub commit: CommitHook,
}

impl Hooks {
    /// Bundle two custom predicates
    pub fn new(propose: ProposeHook, commit: CommitHook) -> Self {
        Self { propose, commit }
    }

    /// The default policy: accept every phase
    pub fn allow_all() -> Self {
        Self {
            propose: Arc::new(|_| true),
            commit: Arc::new(|_| true),
        }
    }
}

impl Default for Hooks {
    fn default() -> Self {
        Self::allow_all()
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks").finish_non_exhaustive()
    }
}
