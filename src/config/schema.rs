//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::admission::{AdmissionPolicy, CutoffAfterN, RejectFirstN};

/// Root configuration for a limiting proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// The single backend every admitted request is forwarded to.
    pub backend: BackendConfig,

    /// Listener configuration (bind host and port).
    pub listener: ListenerConfig,

    /// Admission policy consulted once per request.
    pub policy: PolicyConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ProxyConfig {
    /// Build a config forwarding to `host:port` under the given policy.
    pub fn new(backend_host: impl Into<String>, backend_port: u16, policy: PolicyConfig) -> Self {
        Self {
            backend: BackendConfig {
                host: backend_host.into(),
                port: backend_port,
            },
            policy,
            ..Self::default()
        }
    }

    /// Use a fixed listen port instead of an ephemeral one.
    pub fn with_listen_port(mut self, port: u16) -> Self {
        self.listener.port = port;
        self
    }
}

/// Backend server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend host name or IP address.
    pub host: String,

    /// Backend TCP port (1-65535).
    pub port: u16,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Host or IP to bind.
    pub host: String,

    /// Port to bind; 0 picks an ephemeral port.
    pub port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
        }
    }
}

/// Admission policy selection.
///
/// ```toml
/// [policy]
/// kind = "cutoff_after"
/// limit = 2
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyConfig {
    /// Allow the first `limit` requests, reject the rest.
    CutoffAfter { limit: u64 },
    /// Reject the first `limit` requests, allow the rest.
    RejectFirst { limit: u64 },
}

impl PolicyConfig {
    /// Instantiate the policy with a fresh request counter.
    pub fn build(&self) -> Arc<dyn AdmissionPolicy> {
        match *self {
            PolicyConfig::CutoffAfter { limit } => Arc::new(CutoffAfterN::new(limit)),
            PolicyConfig::RejectFirst { limit } => Arc::new(RejectFirstN::new(limit)),
        }
    }

    /// The configured threshold.
    pub fn limit(&self) -> u64 {
        match *self {
            PolicyConfig::CutoffAfter { limit } | PolicyConfig::RejectFirst { limit } => limit,
        }
    }
}

impl Default for PolicyConfig {
    /// Rejecting the first zero requests forwards everything.
    fn default() -> Self {
        PolicyConfig::RejectFirst { limit: 0 }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Backend connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// How long an idle pooled backend connection is kept, in seconds.
    pub pool_idle_secs: u64,

    /// Grace period for in-flight requests during `stop()`, in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            pool_idle_secs: 30,
            shutdown_grace_secs: 5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Prometheus endpoint bind address. Disabled when unset.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_address: None,
        }
    }
}
