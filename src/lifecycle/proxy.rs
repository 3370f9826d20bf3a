//! The limiting proxy handle and its lifecycle.
//!
//! ```text
//! Created ──start()──▶ Starting ──accepting──▶ Running ──stop()──▶ Stopping ──▶ Stopped
//!                          │                                                      ▲
//!                          └───────────────── bind failure ───────────────────────┘
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::uri::InvalidUri;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::admission::AdmissionPolicy;
use crate::config::validation::describe;
use crate::config::{validate_config, PolicyConfig, ProxyConfig, ValidationError};
use crate::http::request::backend_authority;
use crate::http::{AppState, HttpServer};
use crate::lifecycle::shutdown::Shutdown;
use crate::net::connection::InFlightTracker;
use crate::net::listener::{self, ListenerError};

/// Where a proxy is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
    /// Configured, no socket bound.
    Created,
    /// Socket bound, accept loop not yet running.
    Starting,
    /// Accepting traffic.
    Running,
    /// No longer accepting; draining in-flight requests.
    Stopping,
    /// Terminal. Reached after `stop()` or a failed bind.
    Stopped,
}

impl fmt::Display for ProxyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProxyState::Created => "created",
            ProxyState::Starting => "starting",
            ProxyState::Running => "running",
            ProxyState::Stopping => "stopping",
            ProxyState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Error type for proxy lifecycle operations.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The listening socket could not be established. Fatal; not retried.
    #[error(transparent)]
    Bind(#[from] ListenerError),

    #[error("invalid proxy configuration: {}", describe(.0))]
    InvalidConfig(Vec<ValidationError>),

    #[error("invalid backend address: {0}")]
    InvalidBackend(#[from] InvalidUri),

    #[error("start() must be called from within a Tokio runtime")]
    NoRuntime,

    #[error("proxy cannot be started from the {0} state")]
    AlreadyStarted(ProxyState),

    #[error("proxy is not running (state: {0})")]
    NotRunning(ProxyState),
}

/// Completes once the proxy is accepting traffic.
///
/// Returned by [`LimitingProxy::start`]. Await [`ReadySignal::wait`] or poll
/// [`ReadySignal::is_ready`]; neither is required for the proxy to run.
#[derive(Debug, Clone)]
pub struct ReadySignal {
    rx: watch::Receiver<ProxyState>,
}

impl ReadySignal {
    pub fn is_ready(&self) -> bool {
        *self.rx.borrow() == ProxyState::Running
    }

    /// Wait until the proxy leaves `Starting`.
    ///
    /// Fails if it was stopped before it ever became ready.
    pub async fn wait(mut self) -> Result<(), ProxyError> {
        let state = match self.rx.wait_for(|state| *state != ProxyState::Starting).await {
            Ok(state) => *state,
            Err(_) => ProxyState::Stopped,
        };

        match state {
            ProxyState::Running => Ok(()),
            other => Err(ProxyError::NotRunning(other)),
        }
    }
}

/// Runtime resources owned while the proxy is started.
struct RunningServer {
    local_addr: SocketAddr,
    url: String,
    shutdown: Shutdown,
    task: JoinHandle<Result<(), std::io::Error>>,
    in_flight: InFlightTracker,
}

/// An admission-controlled HTTP proxy in front of a single backend.
///
/// Each instance owns one request counter for its whole life; a fresh
/// count needs a fresh instance. Dropping a running proxy shuts its server
/// down without waiting for the drain.
pub struct LimitingProxy {
    config: ProxyConfig,
    policy: Arc<dyn AdmissionPolicy>,
    state: Arc<watch::Sender<ProxyState>>,
    running: Mutex<Option<RunningServer>>,
}

impl LimitingProxy {
    pub fn new(config: ProxyConfig) -> Self {
        let policy = config.policy.build();
        let (state, _) = watch::channel(ProxyState::Created);
        Self {
            config,
            policy,
            state: Arc::new(state),
            running: Mutex::new(None),
        }
    }

    /// A proxy that forwards the first `limit` requests and rejects the rest.
    pub fn rate_limiting(limit: u64, backend_host: impl Into<String>, backend_port: u16) -> Self {
        Self::new(ProxyConfig::new(
            backend_host,
            backend_port,
            PolicyConfig::CutoffAfter { limit },
        ))
    }

    /// A proxy that rejects the first `limit` requests and forwards the rest.
    pub fn retry_limiting(limit: u64, backend_host: impl Into<String>, backend_port: u16) -> Self {
        Self::new(ProxyConfig::new(
            backend_host,
            backend_port,
            PolicyConfig::RejectFirst { limit },
        ))
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn state(&self) -> ProxyState {
        *self.state.borrow()
    }

    /// Requests counted by the admission policy so far.
    pub fn requests_seen(&self) -> u64 {
        self.policy.requests_seen()
    }

    /// Bound address, available while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.with_running(|server| server.local_addr)
    }

    /// Base URL (`http://host:port`), available while running.
    pub fn server_url(&self) -> Option<String> {
        self.with_running(|server| server.url.clone())
    }

    /// Base URL scoped to a tenant: `{server_url}/t/{tenant_id}`.
    pub fn tenant_url(&self, tenant_id: &str) -> Option<String> {
        self.server_url()
            .map(|url| format!("{url}/t/{tenant_id}"))
    }

    fn with_running<T>(&self, f: impl FnOnce(&RunningServer) -> T) -> Option<T> {
        let running = self.running.lock().expect("proxy lifecycle mutex poisoned");
        if self.state() != ProxyState::Running {
            return None;
        }
        running.as_ref().map(f)
    }

    /// Bind the listener and start serving in the background.
    ///
    /// Binding happens before this returns, so a port conflict fails here
    /// with [`ProxyError::Bind`] and leaves the proxy `Stopped`. The accept
    /// loop is spawned on the current Tokio runtime; the returned
    /// [`ReadySignal`] completes once it is running.
    pub fn start(&self) -> Result<ReadySignal, ProxyError> {
        let runtime = Handle::try_current().map_err(|_| ProxyError::NoRuntime)?;
        let mut running = self.running.lock().expect("proxy lifecycle mutex poisoned");

        let current = self.state();
        if current != ProxyState::Created {
            return Err(ProxyError::AlreadyStarted(current));
        }

        validate_config(&self.config).map_err(ProxyError::InvalidConfig)?;
        let backend = backend_authority(&self.config.backend.host, self.config.backend.port)?;

        self.state.send_replace(ProxyState::Starting);
        let bound = match listener::bind(&self.config.listener) {
            Ok(bound) => bound,
            Err(err) => {
                tracing::error!(error = %err, "Proxy failed to bind");
                self.state.send_replace(ProxyState::Stopped);
                return Err(err.into());
            }
        };
        let local_addr = bound.local_addr();
        let url = bound.base_url();

        let in_flight = InFlightTracker::new();
        let server = HttpServer::new(AppState {
            policy: Arc::clone(&self.policy),
            client: HttpServer::build_client(&self.config.timeouts),
            backend: backend.clone(),
            in_flight: in_flight.clone(),
        });

        let shutdown = Shutdown::new();
        let signal = shutdown.signalled();
        let ready = ReadySignal {
            rx: self.state.subscribe(),
        };

        let grace = Duration::from_secs(self.config.timeouts.shutdown_grace_secs);
        let state = Arc::clone(&self.state);
        let task = runtime.spawn(async move {
            // A concurrent stop() may already have moved us past Starting.
            let promoted = state.send_if_modified(|state| {
                if *state == ProxyState::Starting {
                    *state = ProxyState::Running;
                    true
                } else {
                    false
                }
            });
            if promoted {
                tracing::info!(address = %local_addr, "Proxy ready");
            }
            server.run(bound.into_inner(), signal, grace).await
        });

        tracing::info!(
            address = %local_addr,
            backend = %backend,
            policy = self.policy.name(),
            limit = self.config.policy.limit(),
            "Proxy starting"
        );

        *running = Some(RunningServer {
            local_addr,
            url,
            shutdown,
            task,
            in_flight,
        });
        Ok(ready)
    }

    /// Stop accepting, drain in-flight requests for the grace period, then
    /// close. Idempotent, and safe to call on a proxy that never started.
    pub async fn stop(&self) -> Result<(), ProxyError> {
        let server = {
            let mut running = self.running.lock().expect("proxy lifecycle mutex poisoned");
            let current = self.state();
            if matches!(current, ProxyState::Stopping | ProxyState::Stopped) {
                return Ok(());
            }
            self.state.send_replace(ProxyState::Stopping);
            running.take()
        };

        if let Some(server) = server {
            self.drain(server).await;
        }

        self.state.send_replace(ProxyState::Stopped);
        tracing::info!(requests_seen = self.requests_seen(), "Proxy stopped");
        Ok(())
    }

    /// Signal the server and wait for it. The server itself bounds the
    /// drain by the grace period and aborts what is left.
    async fn drain(&self, server: RunningServer) {
        let RunningServer {
            local_addr,
            shutdown,
            task,
            in_flight,
            ..
        } = server;

        tracing::info!(
            address = %local_addr,
            in_flight = in_flight.active_count(),
            "Proxy stopping"
        );
        shutdown.trigger();

        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(error = %err, "Proxy server exited with an error"),
            Err(err) => tracing::warn!(error = %err, "Proxy server task failed"),
        }
    }
}

impl fmt::Debug for LimitingProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LimitingProxy")
            .field("state", &self.state())
            .field("policy", &self.policy)
            .field("backend", &self.config.backend)
            .finish()
    }
}
