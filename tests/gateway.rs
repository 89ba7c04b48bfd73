//! HTTP gateway tests against a bound listener.

mod common;

use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use common::{start_mock_backend, test_config, Harness};
use intercept_router::http::{AppState, Body, GatewayServer};

const CLIENT_HEADER: &str = "x-client-id";

async fn serve(harness: &Harness) -> SocketAddr {
    let state = AppState::new(
        Arc::clone(&harness.point),
        Arc::clone(&harness.host),
        Arc::new(harness.config.clone()),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(GatewayServer::new(state).run(listener, harness.shutdown.subscribe()));
    addr
}

#[tokio::test]
async fn test_tab_header_routes_to_consumer() {
    let harness = Harness::new();
    let tab = harness.open_tab();
    let session = harness.session(&tab);
    session.get("/hello/:name", |req, _reply| {
        Box::pin(async move {
            let name = req.params.get("name").cloned().unwrap_or_default();
            Ok(Some(Body::Text(format!("hello {name}"))))
        })
    });
    session.listen().await.unwrap();
    let addr = serve(&harness).await;

    let res = reqwest::Client::new()
        .get(format!("http://{addr}/hello/tab"))
        .header(CLIENT_HEADER, tab.client_id())
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "hello tab");
}

#[tokio::test]
async fn test_remote_tab_handshake() {
    let harness = Harness::new();
    let addr = serve(&harness).await;

    let res = reqwest::Client::new()
        .post(format!("http://{addr}/__intercept/register-session"))
        .header(CLIENT_HEADER, "remote-tab")
        .json(&json!({ "consumerId": "consumer-remote" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "clientId": "remote-tab", "consumerId": "consumer-remote" }));
    assert_eq!(
        harness.point.registry().consumer_for("remote-tab").as_deref(),
        Some("consumer-remote")
    );
}

#[tokio::test]
async fn test_passthrough_without_upstream_is_bad_gateway() {
    let harness = Harness::new();
    let addr = serve(&harness).await;

    let res = reqwest::get(format!("http://{addr}/anything")).await.unwrap();
    assert_eq!(res.status(), 502);
}

#[tokio::test]
async fn test_passthrough_reaches_upstream() {
    let backend = start_mock_backend("from upstream").await;
    let mut config = test_config();
    config.passthrough.upstream = Some(format!("http://{backend}"));
    let harness = Harness::with_config(config);
    let tab = harness.open_tab();
    let addr = serve(&harness).await;

    // A registered tab without a matching route still goes upstream.
    let res = reqwest::Client::new()
        .get(format!("http://{addr}/static/app.js"))
        .header(CLIENT_HEADER, tab.client_id())
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "from upstream");
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let mut config = test_config();
    config.listener.max_body_bytes = 16;
    let harness = Harness::with_config(config);
    let tab = harness.open_tab();
    let session = harness.session(&tab);
    session.post("/upload", |_req, _reply| Box::pin(async { Ok(Some(Body::Text("stored".into()))) }));
    session.listen().await.unwrap();
    let addr = serve(&harness).await;

    let res = reqwest::Client::new()
        .post(format!("http://{addr}/upload"))
        .header(CLIENT_HEADER, tab.client_id())
        .body("x".repeat(64))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 413);

    let res = reqwest::Client::new()
        .post(format!("http://{addr}/upload"))
        .header(CLIENT_HEADER, tab.client_id())
        .body("small")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "stored");
}

#[tokio::test]
async fn test_admin_requires_bearer_key() {
    let mut config = test_config();
    config.admin.enabled = true;
    config.admin.api_key = "test-key".to_string();
    let harness = Harness::with_config(config);
    let addr = serve(&harness).await;
    let client = reqwest::Client::new();

    let denied = client
        .get(format!("http://{addr}/admin/status"))
        .send()
        .await
        .unwrap();
    assert_eq!(denied.status(), 401);

    let allowed = client
        .get(format!("http://{addr}/admin/status"))
        .bearer_auth("test-key")
        .send()
        .await
        .unwrap();
    assert_eq!(allowed.status(), 200);
    let status: Value = allowed.json().await.unwrap();
    assert_eq!(status["status"], "operational");
    assert_eq!(status["clients"], 0);

    let sweep = client
        .post(format!("http://{addr}/admin/sweep"))
        .bearer_auth("test-key")
        .send()
        .await
        .unwrap();
    assert_eq!(sweep.status(), 200);
}
