//! Admission-controlled intercepting HTTP proxy.
//!
//! Sits between a client and one backend HTTP service and decides, per
//! request, whether to forward it or answer with a synthetic `429`:
//!
//! - [`LimitingProxy::rate_limiting`] forwards the first N requests, then rejects.
//! - [`LimitingProxy::retry_limiting`] rejects the first N requests, then forwards.
//!
//! Paths, including tenant prefixes such as `/t/{tenantId}/...`, are passed
//! through untouched.
//!
//! ```no_run
//! # async fn demo() -> Result<(), limiting_proxy::ProxyError> {
//! let proxy = limiting_proxy::LimitingProxy::rate_limiting(2, "localhost", 8080);
//! proxy.start()?.wait().await?;
//! let url = proxy.tenant_url("abc123");
//! // ... drive a client against `url` ...
//! proxy.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod admission;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use admission::{AdmissionDecision, AdmissionPolicy, Rejection};
pub use config::ProxyConfig;
pub use lifecycle::{LimitingProxy, ProxyError, ProxyState, ReadySignal};
