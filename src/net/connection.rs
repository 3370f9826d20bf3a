//! In-flight request tracking.
//!
//! # Responsibilities
//! - Count forwarded requests still waiting on the backend
//! - Give each forwarded request a unique ID for tracing
//! - Report how much work a bounded shutdown abandoned

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Global atomic counter for forward IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static FORWARD_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for one forwarded request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ForwardId(u64);

impl ForwardId {
    pub fn new() -> Self {
        Self(FORWARD_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ForwardId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ForwardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fwd-{}", self.0)
    }
}

/// Tracks forwarded requests that have not completed yet.
#[derive(Debug, Clone, Default)]
pub struct InFlightTracker {
    active_count: Arc<AtomicU64>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new in-flight request. Returns a guard that decrements on drop.
    pub fn track(&self) -> InFlightGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            active_count: Arc::clone(&self.active_count),
            id: ForwardId::new(),
        }
    }

    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }
}

/// Guard held for the lifetime of one forwarded request.
///
/// Dropping it (completion, error, or client disconnect) releases the slot.
#[derive(Debug)]
pub struct InFlightGuard {
    active_count: Arc<AtomicU64>,
    id: ForwardId,
}

impl InFlightGuard {
    pub fn id(&self) -> ForwardId {
        self.id
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(forward_id = %self.id, "Forward finished");
    }
}
