//! Integration tests for the webhook HTTP boundary.
//!
//! The router is served on an ephemeral port; requests are written as raw
//! HTTP/1.1 so the tests see exactly the status line Alertmanager sees.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use amsig_core::{Receiver, ReceiverTable};
use amsigd::http::build_router;
use amsigd::templates::PlaceholderTemplates;
use amsigd::{AppContext, DaemonConnection};
use serde_json::Value;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream, UnixListener};
use tokio::time::timeout;

const IO_TIMEOUT: Duration = Duration::from_secs(5);

const FIRING: &str = r#"{
  "version": "4",
  "groupKey": "{}:{alertname=\"HighLoad\"}",
  "status": "firing",
  "receiver": "ops",
  "groupLabels": {"alertname": "HighLoad"},
  "commonLabels": {"alertname": "HighLoad", "severity": "page"},
  "commonAnnotations": {"summary": "load is high"},
  "externalURL": "http://alertmanager:9093",
  "alerts": [{
    "status": "firing",
    "labels": {"alertname": "HighLoad", "instance": "web-1"},
    "annotations": {},
    "startsAt": "2024-01-01T00:00:00Z",
    "endsAt": "0001-01-01T00:00:00Z",
    "generatorURL": "http://prometheus:9090/graph"
  }]
}"#;

struct TestApp {
    addr: SocketAddr,
    daemon: UnixListener,
    _temp_dir: TempDir,
}

impl TestApp {
    async fn spawn() -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let socket_path = temp_dir.path().join("signald.sock");
        let daemon = UnixListener::bind(&socket_path).unwrap();

        let receivers = ReceiverTable::new(vec![Receiver {
            name: "ops".to_string(),
            sender: "+1000".to_string(),
            to: vec!["tel:+15551234567".to_string()],
            template: "default".to_string(),
            subscribe: false,
        }])
        .unwrap();
        let ctx = AppContext::with_connection(
            Arc::new(DaemonConnection::new(&socket_path)),
            Arc::new(receivers),
            Arc::new(PlaceholderTemplates::new()),
            false,
            None,
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, build_router(ctx)).await.unwrap();
        });

        Self {
            addr,
            daemon,
            _temp_dir: temp_dir,
        }
    }

    async fn request(&self, method: &str, path: &str, body: &str) -> (u16, String) {
        let mut stream = TcpStream::connect(self.addr).await.unwrap();
        let head = format!(
            "{method} {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        stream.write_all(head.as_bytes()).await.unwrap();
        stream.write_all(body.as_bytes()).await.unwrap();

        let mut raw = String::new();
        timeout(IO_TIMEOUT, stream.read_to_string(&mut raw))
            .await
            .expect("response timed out")
            .unwrap();

        let status = raw
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .expect("status code");
        let body = raw
            .split_once("\r\n\r\n")
            .map(|(_, b)| b.to_string())
            .unwrap_or_default();
        (status, body)
    }
}

#[tokio::test]
async fn test_alert_delivered_returns_ok() {
    let app = TestApp::spawn().await;

    let (status, body) = app.request("POST", "/alert", FIRING).await;
    assert_eq!(status, 200);
    assert_eq!(body, "ok\n");

    let (stream, _) = timeout(IO_TIMEOUT, app.daemon.accept())
        .await
        .unwrap()
        .unwrap();
    let mut lines = BufReader::new(stream).lines();
    let line = timeout(IO_TIMEOUT, lines.next_line())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let req: Value = serde_json::from_str(&line).unwrap();

    assert_eq!(req["type"], "send");
    assert_eq!(req["username"], "+1000");
    assert_eq!(req["recipientAddress"]["number"], "+15551234567");
    let text = req["messageBody"].as_str().unwrap();
    assert!(text.starts_with("[firing] alertname=HighLoad"));
    assert!(text.contains("summary=load is high"));
}

#[tokio::test]
async fn test_connected_gauge_follows_socket_opened_by_alert() {
    let app = TestApp::spawn().await;

    let (_, metrics) = app.request("GET", "/metrics", "").await;
    assert!(metrics.contains("# TYPE amsig_daemon_connected gauge\namsig_daemon_connected 0"));

    // No dispatch loop runs here; the alert send opens the socket itself
    let (status, _) = app.request("POST", "/alert", FIRING).await;
    assert_eq!(status, 200);
    let (_stream, _) = timeout(IO_TIMEOUT, app.daemon.accept())
        .await
        .unwrap()
        .unwrap();

    let (_, metrics) = app.request("GET", "/metrics", "").await;
    assert!(metrics.contains("amsig_daemon_connected 1"));
    assert!(metrics.contains(
        "# TYPE amsig_daemon_connect_attempts_total counter\namsig_daemon_connect_attempts_total 1"
    ));
}

#[tokio::test]
async fn test_malformed_json_returns_bad_request() {
    let app = TestApp::spawn().await;

    let (status, body) = app.request("POST", "/alert", "{not json").await;

    assert_eq!(status, 400);
    assert!(body.contains("Decode failed"));
}

#[tokio::test]
async fn test_unknown_receiver_returns_server_error() {
    let app = TestApp::spawn().await;
    let payload = FIRING.replace(r#""receiver": "ops""#, r#""receiver": "nobody""#);

    let (status, _) = app.request("POST", "/alert", &payload).await;
    assert_eq!(status, 500);

    let (_, metrics) = app.request("GET", "/metrics", "").await;
    assert!(metrics.contains("amsig_alert_errors_total{reason=\"receiver_not_configured\"} 1"));
    assert!(metrics.contains("amsig_daemon_connect_attempts_total 0"));
}

#[tokio::test]
async fn test_daemon_down_returns_server_error() {
    let app = TestApp::spawn().await;
    let path = app._temp_dir.path().join("signald.sock");
    std::fs::remove_file(path).unwrap();

    let (status, body) = app.request("POST", "/alert", FIRING).await;

    assert_eq!(status, 500);
    assert!(body.contains("Handling alert failed"));
}

#[tokio::test]
async fn test_healthz() {
    let app = TestApp::spawn().await;
    let (status, body) = app.request("GET", "/healthz", "").await;
    assert_eq!(status, 200);
    assert_eq!(body, "ok");
}
