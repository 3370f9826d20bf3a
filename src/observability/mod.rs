//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events, filtered by EnvFilter)
//!     → metrics.rs (decision, forward and backend error counters)
//!
//! Consumers:
//!     → stdout (tracing-subscriber fmt layer)
//!     → Prometheus scrape endpoint (optional, binary only)
//! ```
//!
//! # Design Decisions
//! - Library code only emits; installing subscribers/recorders is left to
//!   the binary or the embedding test harness
//! - Request IDs live in log spans, never in forwarded headers

pub mod logging;
pub mod metrics;
