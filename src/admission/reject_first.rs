//! Reject-first-N: a retry window fault injector.

use crate::admission::counter::RequestCounter;
use crate::admission::{AdmissionDecision, AdmissionPolicy, Rejection};

/// Rejects the first `limit` requests, then forwards everything.
///
/// Emulates a backend that is unavailable for a fixed number of attempts
/// before recovering, which is what client retry loops are tested against.
/// The rejection is the same one [`CutoffAfterN`](super::CutoffAfterN)
/// produces; only its timing differs.
#[derive(Debug)]
pub struct RejectFirstN {
    limit: u64,
    counter: RequestCounter,
}

impl RejectFirstN {
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            counter: RequestCounter::new(),
        }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }
}

impl AdmissionPolicy for RejectFirstN {
    fn decide(&self) -> AdmissionDecision {
        let seq = self.counter.next();
        let decision = if seq <= self.limit {
            AdmissionDecision::Reject(Rejection::rate_limited())
        } else {
            AdmissionDecision::Allow
        };

        tracing::debug!(
            policy = self.name(),
            seq,
            limit = self.limit,
            allowed = decision.is_allowed(),
            "Admission decided"
        );
        decision
    }

    fn requests_seen(&self) -> u64 {
        self.counter.current()
    }

    fn name(&self) -> &'static str {
        "reject_first"
    }
}
