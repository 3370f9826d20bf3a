//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Start (proxy.rs):
//!     Validate config → Bind listener → Spawn serve loop → Ready signal
//!
//! Stop (proxy.rs + shutdown.rs):
//!     Trigger shutdown → Close listener → Drain for grace period → Stopped
//! ```
//!
//! # Design Decisions
//! - Bind is synchronous: a busy port fails `start()` itself
//! - Readiness is a watch channel, so callers may await it or poll it
//! - Shutdown has a deadline: connections still open after the grace period
//!   are aborted along with their backend requests

pub mod proxy;
pub mod shutdown;

pub use proxy::{LimitingProxy, ProxyError, ProxyState, ReadySignal};
pub use shutdown::Shutdown;
