//! HTTP server setup and the forwarding core.
//!
//! # Responsibilities
//! - Create the Axum router with a catch-all proxy handler
//! - Consult the admission policy once per request
//! - Forward admitted requests to the fixed backend over a pooled client
//! - Stream backend responses back; map backend failures to 502
//! - Own every accepted connection so a bounded drain can abandon them

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{uri::Authority, Request},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper::{body::Incoming, server::conn::http1, service::service_fn};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioIo, TokioTimer},
    server::graceful::GracefulShutdown,
};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tower::ServiceExt;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

use crate::admission::{AdmissionDecision, AdmissionPolicy};
use crate::config::TimeoutConfig;
use crate::http::request::prepare_forward;
use crate::http::response::{relay, ForwardError};
use crate::net::connection::InFlightTracker;
use crate::observability::metrics;

/// Pooled HTTP/1.1 client used for the backend hop.
pub type BackendClient = Client<HttpConnector, Body>;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub policy: Arc<dyn AdmissionPolicy>,
    pub client: BackendClient,
    pub backend: Authority,
    pub in_flight: InFlightTracker,
}

/// HTTP server for the limiting proxy.
pub struct HttpServer {
    router: Router,
    in_flight: InFlightTracker,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        Self {
            in_flight: state.in_flight.clone(),
            router: Self::build_router(state),
        }
    }

    /// Build the backend client.
    ///
    /// Idle pooled connections are dropped after `pool_idle_secs`; no
    /// deadline is put on the round-trip itself.
    pub fn build_client(timeouts: &TimeoutConfig) -> BackendClient {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
        connector.set_nodelay(true);

        Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(timeouts.pool_idle_secs))
            .pool_timer(TokioTimer::new())
            .build(connector)
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
    }

    /// The router, for driving requests without a socket.
    #[cfg(test)]
    fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve connections from `listener` until `signal` completes.
    ///
    /// On shutdown the listener is closed first, so new connections are
    /// refused. Open connections finish their current exchange within
    /// `grace`; whatever is still running after that is aborted, which
    /// closes the client connection and drops the backend request.
    pub async fn run<F>(
        self,
        listener: TcpListener,
        signal: F,
        grace: Duration,
    ) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let graceful = GracefulShutdown::new();
        let mut connections = JoinSet::new();
        tokio::pin!(signal);

        loop {
            tokio::select! {
                () = &mut signal => break,
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(err) => {
                            tracing::warn!(error = %err, "Failed to accept connection");
                            continue;
                        }
                    };
                    let router = self.router.clone();
                    let service = service_fn(move |mut request: Request<Incoming>| {
                        request.extensions_mut().insert(ConnectInfo(peer));
                        router.clone().oneshot(request)
                    });
                    let conn = http1::Builder::new()
                        .timer(TokioTimer::new())
                        .serve_connection(TokioIo::new(stream), service);
                    let conn = graceful.watch(conn);
                    connections.spawn(async move {
                        if let Err(err) = conn.await {
                            tracing::debug!(peer = %peer, error = %err, "Connection closed with error");
                        }
                    });
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        drop(listener);
        tracing::info!(
            address = %addr,
            connections = connections.len(),
            in_flight = self.in_flight.active_count(),
            "Listener closed, draining connections"
        );

        if tokio::time::timeout(grace, graceful.shutdown()).await.is_err() {
            tracing::warn!(
                grace_secs = grace.as_secs(),
                connections = connections.len(),
                abandoned = self.in_flight.active_count(),
                "Grace period elapsed, abandoning in-flight requests"
            );
            connections.abort_all();
        }
        while connections.join_next().await.is_some() {}

        tracing::info!(address = %addr, "HTTP server stopped");
        Ok(())
    }
}

/// Main proxy handler.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let span = tracing::info_span!(
        "proxy_request",
        request_id = %Uuid::new_v4(),
        peer = %peer,
        method = %request.method(),
        path = %request.uri().path(),
    );
    admit_and_forward(state, request).instrument(span).await
}

async fn admit_and_forward(state: AppState, request: Request<Body>) -> Response {
    let decision = state.policy.decide();
    metrics::record_decision(decision.outcome());

    if let AdmissionDecision::Reject(rejection) = decision {
        tracing::info!(
            policy = state.policy.name(),
            status = %rejection.status,
            "Request rejected by admission policy"
        );
        return rejection.into_response();
    }

    match forward(&state, request).await {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(backend = %state.backend, error = %err, "Backend request failed");
            metrics::record_backend_error();
            err.into_response()
        }
    }
}

/// Forward one admitted request and relay the backend's answer.
///
/// If the client goes away this future is dropped, which drops the
/// pending backend request and its connection with it.
async fn forward(state: &AppState, request: Request<Body>) -> Result<Response, ForwardError> {
    let start = Instant::now();
    let guard = state.in_flight.track();

    let outbound = prepare_forward(request, &state.backend)?;
    tracing::debug!(forward_id = %guard.id(), uri = %outbound.uri(), "Forwarding to backend");

    let response = state
        .client
        .request(outbound)
        .await
        .map_err(|source| ForwardError::BackendUnreachable {
            backend: state.backend.to_string(),
            source,
        })?;

    let status = response.status();
    metrics::record_forward(status.as_u16(), start);
    tracing::debug!(forward_id = %guard.id(), status = %status, "Backend responded");

    Ok(relay(response, guard))
}
