//! Start/stop behaviour of the proxy server.

use std::time::{Duration, Instant};

use limiting_proxy::config::{PolicyConfig, ProxyConfig};
use limiting_proxy::{LimitingProxy, ProxyError, ProxyState};
use reqwest::StatusCode;

mod common;

#[tokio::test]
async fn url_is_only_available_while_running() {
    let (backend, _) = common::start_counting_backend("ok").await;
    let proxy = LimitingProxy::rate_limiting(2, "127.0.0.1", backend.port());

    assert_eq!(proxy.state(), ProxyState::Created);
    assert_eq!(proxy.server_url(), None);

    let ready = proxy.start().unwrap();
    ready.clone().wait().await.unwrap();
    assert!(ready.is_ready());
    assert_eq!(proxy.state(), ProxyState::Running);

    let addr = proxy.local_addr().unwrap();
    assert_ne!(addr.port(), 0);
    assert_eq!(proxy.server_url(), Some(format!("http://{addr}")));
    assert_eq!(
        proxy.tenant_url("abc123"),
        Some(format!("http://{addr}/t/abc123"))
    );

    proxy.stop().await.unwrap();
    assert_eq!(proxy.state(), ProxyState::Stopped);
    assert_eq!(proxy.server_url(), None);
    assert!(!ready.is_ready());
}

#[tokio::test]
async fn stop_is_idempotent() {
    let (backend, _) = common::start_counting_backend("ok").await;
    let proxy = LimitingProxy::rate_limiting(2, "127.0.0.1", backend.port());
    common::start_proxy(&proxy).await;

    proxy.stop().await.unwrap();
    proxy.stop().await.unwrap();
    assert_eq!(proxy.state(), ProxyState::Stopped);
}

#[tokio::test]
async fn stopped_proxy_refuses_connections() {
    let (backend, _) = common::start_counting_backend("ok").await;
    let proxy = LimitingProxy::retry_limiting(0, "127.0.0.1", backend.port());
    let url = common::start_proxy(&proxy).await;
    let client = common::client();

    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    proxy.stop().await.unwrap();

    let err = client
        .get(&url)
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .unwrap_err();
    assert!(err.is_connect(), "expected connection refused, got {err}");
}

#[tokio::test]
async fn start_twice_is_refused() {
    let (backend, _) = common::start_counting_backend("ok").await;
    let proxy = LimitingProxy::rate_limiting(2, "127.0.0.1", backend.port());
    common::start_proxy(&proxy).await;

    match proxy.start() {
        Err(ProxyError::AlreadyStarted(ProxyState::Running)) => {}
        other => panic!("expected AlreadyStarted, got {other:?}"),
    }

    proxy.stop().await.unwrap();
}

#[tokio::test]
async fn busy_port_fails_start_with_bind_error() {
    let (backend, _) = common::start_counting_backend("ok").await;
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = occupied.local_addr().unwrap().port();

    let config = ProxyConfig::new(
        "127.0.0.1",
        backend.port(),
        PolicyConfig::CutoffAfter { limit: 2 },
    )
    .with_listen_port(port);
    let proxy = LimitingProxy::new(config);

    match proxy.start() {
        Err(ProxyError::Bind(_)) => {}
        other => panic!("expected bind error, got {other:?}"),
    }
    assert_eq!(proxy.state(), ProxyState::Stopped);
    assert_eq!(proxy.server_url(), None);

    // Cleanup after a failed start is still safe.
    proxy.stop().await.unwrap();
}

#[tokio::test]
async fn fixed_listen_port_is_honoured() {
    let (backend, _) = common::start_counting_backend("ok").await;
    let port = common::closed_port();

    let config = ProxyConfig::new(
        "127.0.0.1",
        backend.port(),
        PolicyConfig::RejectFirst { limit: 0 },
    )
    .with_listen_port(port);
    let proxy = LimitingProxy::new(config);
    let url = common::start_proxy(&proxy).await;

    assert_eq!(url, format!("http://127.0.0.1:{port}"));
    let res = common::client().get(&url).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "ok");

    proxy.stop().await.unwrap();
}

#[tokio::test]
async fn stop_waits_for_in_flight_request() {
    let backend = common::start_programmable_backend(|| async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        (200, b"slow".to_vec())
    })
    .await;
    let proxy = LimitingProxy::retry_limiting(0, "127.0.0.1", backend.port());
    let url = common::start_proxy(&proxy).await;

    let in_flight = tokio::spawn(async move { common::client().get(&url).send().await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    proxy.stop().await.unwrap();

    let res = in_flight.await.unwrap().unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "slow");
}

#[tokio::test]
async fn stop_abandons_requests_still_running_after_grace_period() {
    let backend = common::start_programmable_backend(|| async {
        tokio::time::sleep(Duration::from_secs(4)).await;
        (200, b"too late".to_vec())
    })
    .await;

    let mut config = ProxyConfig::new(
        "127.0.0.1",
        backend.port(),
        PolicyConfig::RejectFirst { limit: 0 },
    );
    config.timeouts.shutdown_grace_secs = 1;
    let proxy = LimitingProxy::new(config);
    let url = common::start_proxy(&proxy).await;

    let in_flight = tokio::spawn(async move { common::client().get(&url).send().await });
    tokio::time::sleep(Duration::from_millis(200)).await;

    let started = Instant::now();
    proxy.stop().await.unwrap();
    assert!(
        started.elapsed() < Duration::from_secs(3),
        "stop took {:?}",
        started.elapsed()
    );
    assert_eq!(proxy.state(), ProxyState::Stopped);

    let result = tokio::time::timeout(Duration::from_secs(1), in_flight)
        .await
        .expect("abandoned request should fail promptly, not wait for the backend")
        .unwrap();
    match result {
        Err(err) => assert!(!err.is_timeout(), "expected a closed connection, got {err}"),
        Ok(res) => panic!("abandoned request still completed with {}", res.status()),
    }
}
