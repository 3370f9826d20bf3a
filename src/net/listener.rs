//! TCP listener binding.
//!
//! # Responsibilities
//! - Bind the configured host and port (port 0 = ephemeral)
//! - Surface bind failures synchronously so `start()` can fail fast
//! - Resolve the externally reachable address for the server URL

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// A bound, listening socket ready to be served.
#[derive(Debug)]
pub struct BoundListener {
    inner: TcpListener,
    local_addr: SocketAddr,
}

impl BoundListener {
    /// The address the socket is actually bound to, with the resolved port.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Base URL clients should use to reach this listener.
    pub fn base_url(&self) -> String {
        format!("http://{}", reachable_addr(self.local_addr))
    }

    pub fn into_inner(self) -> TcpListener {
        self.inner
    }
}

/// Bind to the configured address.
///
/// Binding is synchronous so the caller learns about a port conflict
/// immediately. Must be called from within a Tokio runtime.
pub fn bind(config: &ListenerConfig) -> Result<BoundListener, ListenerError> {
    let address = format!("{}:{}", config.host, config.port);
    let bind_err = |source| ListenerError::Bind {
        address: address.clone(),
        source,
    };

    let std_listener =
        std::net::TcpListener::bind((config.host.as_str(), config.port)).map_err(bind_err)?;
    std_listener.set_nonblocking(true).map_err(bind_err)?;
    let local_addr = std_listener.local_addr().map_err(bind_err)?;
    let inner = TcpListener::from_std(std_listener).map_err(bind_err)?;

    tracing::info!(address = %local_addr, "Listener bound");

    Ok(BoundListener { inner, local_addr })
}

/// Replace a wildcard bind address with loopback so the URL is dialable.
fn reachable_addr(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), addr.port())
        }
        _ => addr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_becomes_loopback() {
        let addr: SocketAddr = "0.0.0.0:4000".parse().unwrap();
        assert_eq!(reachable_addr(addr).to_string(), "127.0.0.1:4000");

        let addr: SocketAddr = "[::]:4000".parse().unwrap();
        assert_eq!(reachable_addr(addr).to_string(), "[::1]:4000");

        let addr: SocketAddr = "10.1.2.3:4000".parse().unwrap();
        assert_eq!(reachable_addr(addr), addr);
    }

    #[tokio::test]
    async fn ephemeral_port_is_resolved() {
        let listener = bind(&ListenerConfig::default()).unwrap();
        assert_ne!(listener.local_addr().port(), 0);
        assert_eq!(
            listener.base_url(),
            format!("http://127.0.0.1:{}", listener.local_addr().port())
        );
    }

    #[tokio::test]
    async fn port_in_use_is_a_bind_error() {
        let first = bind(&ListenerConfig::default()).unwrap();
        let config = ListenerConfig {
            host: "127.0.0.1".into(),
            port: first.local_addr().port(),
        };

        let err = bind(&config).unwrap_err();
        let ListenerError::Bind { address, .. } = err;
        assert_eq!(address, format!("127.0.0.1:{}", first.local_addr().port()));
    }
}
