//! Readiness probing against local stub servers

mod common;

use std::time::{Duration, Instant};

use common::{closed_port, http_stub, tcp_stub};
use mahjong_e2e::probe::{ReadinessProbe, ReadinessTarget};
use mahjong_e2e::E2eError;

fn probe() -> ReadinessProbe {
    ReadinessProbe::new(Duration::from_secs(1), Duration::from_millis(500)).unwrap()
}

fn http_target(port: u16) -> ReadinessTarget {
    ReadinessTarget::http("127.0.0.1", port, "/")
        .with_timeout(Duration::from_millis(400))
        .with_poll_interval(Duration::from_millis(50))
}

#[tokio::test]
async fn no_content_is_ready() {
    let (port, _server) = http_stub(|_| 204).await;
    let report = probe().wait_until_ready(http_target(port)).await.unwrap();
    assert_eq!(report.attempts, 1);
}

#[tokio::test]
async fn not_found_is_ready() {
    let (port, _server) = http_stub(|_| 404).await;
    probe().wait_until_ready(http_target(port)).await.unwrap();
}

#[tokio::test]
async fn server_error_is_not_ready() {
    let (port, _server) = http_stub(|_| 500).await;
    let err = probe().wait_until_ready(http_target(port)).await.unwrap_err();
    match err {
        E2eError::Unreachable { last_error, .. } => assert!(last_error.contains("500")),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn connection_refused_is_not_ready() {
    let port = closed_port();
    let err = probe().wait_until_ready(http_target(port)).await.unwrap_err();
    assert!(matches!(err, E2eError::Unreachable { .. }));
}

#[tokio::test]
async fn fallback_asset_counts_within_one_attempt() {
    let (port, _server) = http_stub(|path| if path == "/index.html" { 200 } else { 503 }).await;
    let target = http_target(port).with_fallback_path("/index.html");
    let report = probe().wait_until_ready(target).await.unwrap();
    assert_eq!(report.attempts, 1);
}

#[tokio::test]
async fn ready_target_returns_without_sleeping() {
    let (port, _server) = http_stub(|_| 200).await;
    let probe = probe();

    for _ in 0..2 {
        let target = ReadinessTarget::http("127.0.0.1", port, "/")
            .with_poll_interval(Duration::from_secs(5));
        let start = Instant::now();
        let report = probe.wait_until_ready(target).await.unwrap();
        assert_eq!(report.attempts, 1);
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}

#[tokio::test]
async fn tcp_listener_is_ready() {
    let (port, _server) = tcp_stub().await;
    let target = ReadinessTarget::tcp("127.0.0.1", port).with_timeout(Duration::from_millis(400));
    probe().wait_until_ready(target).await.unwrap();
}

#[tokio::test]
async fn tcp_never_listening_is_fatal() {
    let port = closed_port();
    let target = ReadinessTarget::tcp("127.0.0.1", port)
        .with_timeout(Duration::from_millis(300))
        .with_poll_interval(Duration::from_millis(50));

    match probe().wait_until_ready(target).await {
        Err(E2eError::Unreachable {
            target, last_error, ..
        }) => {
            assert_eq!(target, format!("tcp://127.0.0.1:{}", port));
            assert!(!last_error.is_empty());
        }
        other => panic!("expected unreachable, got {:?}", other.map(|r| r.attempts)),
    }
}
