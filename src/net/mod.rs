//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! LimitingProxy::start
//!     → listener.rs (synchronous bind, ephemeral port resolution)
//!     → handed to the HTTP server accept loop (http/server.rs)
//!     → connection.rs (in-flight tracking per forwarded request)
//! ```
//!
//! # Design Decisions
//! - No accept-side backpressure beyond the kernel backlog
//! - Bind errors are fatal and never retried

pub mod connection;
pub mod listener;
