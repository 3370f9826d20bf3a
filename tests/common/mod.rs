//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Request};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Router;
use tokio::net::TcpListener;

use limiting_proxy::LimitingProxy;

/// What the echo backend saw for one request.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Handle to a running echo backend.
#[derive(Clone)]
pub struct EchoBackend {
    pub addr: SocketAddr,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl EchoBackend {
    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn hits(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

async fn bind_ephemeral() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Start a backend that records every request and echoes its body back.
///
/// The response carries `x-echo-method` and `x-echo-path` so tests can see
/// what arrived without inspecting the recording.
pub async fn start_echo_backend() -> EchoBackend {
    let (listener, addr) = bind_ephemeral().await;
    let seen = Arc::new(Mutex::new(Vec::new()));

    let recorder = Arc::clone(&seen);
    let app = Router::new()
        .fallback(move |request: Request| {
            let recorder = Arc::clone(&recorder);
            async move {
                let (parts, body) = request.into_parts();
                let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
                let path_and_query = parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str().to_string())
                    .unwrap_or_default();

                recorder.lock().unwrap().push(SeenRequest {
                    method: parts.method.to_string(),
                    path_and_query: path_and_query.clone(),
                    headers: parts.headers.clone(),
                    body: body.clone(),
                });

                (
                    StatusCode::OK,
                    [
                        ("x-echo-method", parts.method.to_string()),
                        ("x-echo-path", path_and_query),
                    ],
                    body,
                )
                    .into_response()
            }
        })
        .layer(DefaultBodyLimit::disable());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    EchoBackend { addr, seen }
}

/// Start a programmable backend; `f` decides status and body per request.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = (u16, Vec<u8>)> + Send + 'static,
{
    let (listener, addr) = bind_ephemeral().await;

    let app = Router::new().fallback(move || {
        let f = f.clone();
        async move {
            let (status, body) = f().await;
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);
            (status, body).into_response()
        }
    });

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

/// Start a backend that answers every request with a fixed body and counts hits.
pub async fn start_counting_backend(response: &'static str) -> (SocketAddr, Arc<AtomicU32>) {
    let hits = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&hits);
    let addr = start_programmable_backend(move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            (200, response.as_bytes().to_vec())
        }
    })
    .await;
    (addr, hits)
}

/// A loopback port with nothing listening on it.
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Start the proxy and wait until it accepts traffic.
pub async fn start_proxy(proxy: &LimitingProxy) -> String {
    proxy.start().expect("proxy should bind").wait().await.unwrap();
    proxy.server_url().expect("running proxy has a url")
}

/// Client with pooling disabled so every request is a fresh exchange.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
