//! Cutoff-after-N: a one-shot request-count rate limiter.

use crate::admission::counter::RequestCounter;
use crate::admission::{AdmissionDecision, AdmissionPolicy, Rejection};

/// Allows the first `limit` requests and rejects every request after that.
///
/// There is no refill: once the cutoff is reached the proxy rejects for the
/// rest of its lifetime. A `limit` of zero rejects everything.
#[derive(Debug)]
pub struct CutoffAfterN {
    limit: u64,
    counter: RequestCounter,
}

impl CutoffAfterN {
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

impl AdmissionPolicy for CutoffAfterN {
    fn decide(&self) -> AdmissionDecision {
        let seq = self.counter.next();
        let decision = if seq <= self.limit {
            AdmissionDecision::Allow
        } else {
            AdmissionDecision::Reject(Rejection::rate_limited())
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
        "cutoff_after"
    }
}
