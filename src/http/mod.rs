//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted connection (server.rs accept loop, one task per connection)
//!     → server.rs (catch-all handler, request span)
//!     → AdmissionPolicy::decide()
//!         Reject → response.rs (synthetic 429 + marker)
//!         Allow  → request.rs (retarget URI, strip hop-by-hop headers)
//!                → pooled backend client
//!                → response.rs (strip hop-by-hop, stream body back)
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use response::ForwardError;
pub use server::{AppState, HttpServer};
