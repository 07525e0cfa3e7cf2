use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Identity of one immutable context snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(pub u64);

/// Identity of a fragment, stable across snapshots that share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FragmentId(pub u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic id source owned by a context manager.
///
/// Ids loaded from disk are fed back through `observe_*` so that fresh ids
/// never collide with persisted ones.
#[derive(Debug)]
pub struct IdGenerator {
    next_context: AtomicU64,
    next_fragment: AtomicU64,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator {
    pub fn new() -> Self {
        Self {
            next_context: AtomicU64::new(1),
            next_fragment: AtomicU64::new(1),
        }
    }

    pub fn next_context_id(&self) -> ContextId {
        ContextId(self.next_context.fetch_add(1, Ordering::SeqCst))
    }

    pub fn next_fragment_id(&self) -> FragmentId {
        FragmentId(self.next_fragment.fetch_add(1, Ordering::SeqCst))
    }

    pub fn observe_context_id(&self, id: ContextId) {
        self.next_context
            .fetch_max(id.0.saturating_add(1), Ordering::SeqCst);
    }

    pub fn observe_fragment_id(&self, id: FragmentId) {
        self.next_fragment
            .fetch_max(id.0.saturating_add(1), Ordering::SeqCst);
    }
}
