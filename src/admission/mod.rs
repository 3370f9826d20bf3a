//! Admission control subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → AdmissionPolicy::decide() (exactly once per request)
//!         → counter.rs (atomic increment-and-read, 1-indexed)
//!         → cutoff.rs / reject_first.rs (compare against limit)
//!     → Allow       → forwarded to the backend
//!     → Reject(..)  → synthetic 429, backend never contacted
//! ```
//!
//! # Design Decisions
//! - Each policy owns its own counter; nothing is shared between policies
//! - Both policies produce an identical rejection so clients cannot tell
//!   them apart, only when rejection happens differs
//! - Policies never validate their limit; zero is a legal threshold

pub mod counter;
pub mod cutoff;
pub mod reject_first;

use std::fmt;

use axum::http::StatusCode;

pub use counter::RequestCounter;
pub use cutoff::CutoffAfterN;
pub use reject_first::RejectFirstN;

/// Header set on every response the proxy synthesizes itself.
pub const REJECTION_MARKER_HEADER: &str = "x-limiting-proxy";

/// Value of [`REJECTION_MARKER_HEADER`] on admission rejections.
pub const REJECTION_MARKER_VALUE: &str = "rejected";

/// Message carried in the JSON body of a rate-limit rejection.
pub const RATE_LIMITED_MESSAGE: &str = "Rate limit exceeded by limiting proxy";

/// A synthetic error returned instead of forwarding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub status: StatusCode,
    pub message: &'static str,
}

impl Rejection {
    /// The rejection shared by every counted threshold policy.
    pub fn rate_limited() -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            message: RATE_LIMITED_MESSAGE,
        }
    }
}

/// Outcome of consulting an admission policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionDecision {
    Allow,
    Reject(Rejection),
}

impl AdmissionDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AdmissionDecision::Allow)
    }

    /// Label used for logs and metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            AdmissionDecision::Allow => "allowed",
            AdmissionDecision::Reject(_) => "rejected",
        }
    }
}

/// Decides, once per inbound request, whether it may reach the backend.
pub trait AdmissionPolicy: Send + Sync + fmt::Debug {
    /// Count the current request and decide its fate.
    ///
    /// Must be called exactly once per request.
    fn decide(&self) -> AdmissionDecision;

    /// Number of requests counted so far.
    fn requests_seen(&self) -> u64;

    /// Short policy name for logs.
    fn name(&self) -> &'static str;
}
