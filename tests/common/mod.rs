//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

use intercept_router::config::RouterConfig;
use intercept_router::consumer::{ConsumerOptions, ConsumerSession};
use intercept_router::error::RouterResult;
use intercept_router::http::{Method, Reply, Request};
use intercept_router::interception::{ClientHost, FetchOutcome, InterceptionPoint, Tab, TabHost};
use intercept_router::lifecycle::Shutdown;
use intercept_router::transport::BroadcastBus;

pub const ORIGIN: &str = "http://localhost:8080";

/// Configuration with short waits and no background sweep.
pub fn test_config() -> RouterConfig {
    let mut config = RouterConfig::default();
    config.listener.origin = ORIGIN.to_string();
    config.interception.forward_timeout_ms = 500;
    config.interception.sweep_interval_secs = 0;
    config.consumer.ready_timeout_ms = 200;
    config.consumer.ack_timeout_ms = 200;
    config.demo.enabled = false;
    config
}

/// A running interception point with its bus and tab host.
pub struct Harness {
    pub config: RouterConfig,
    pub bus: BroadcastBus,
    pub host: Arc<TabHost>,
    pub point: Arc<InterceptionPoint>,
    pub shutdown: Shutdown,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: RouterConfig) -> Self {
        let bus = BroadcastBus::new(config.interception.bus_capacity);
        let host = Arc::new(TabHost::new(Duration::from_secs(config.listener.client_idle_secs)));
        let point = InterceptionPoint::new(
            &bus,
            Arc::clone(&host) as Arc<dyn ClientHost>,
            config.interception.clone(),
        );
        let shutdown = Shutdown::new();
        point.start(&shutdown);

        Self {
            config,
            bus,
            host,
            point,
            shutdown,
        }
    }

    pub fn open_tab(&self) -> Tab {
        self.host.open_tab(&self.point)
    }

    /// A consumer session whose calls go out through `tab`.
    pub fn session(&self, tab: &Tab) -> ConsumerSession {
        ConsumerSession::new(
            &self.bus,
            Arc::new(tab.clone()),
            ConsumerOptions::from_config(&self.config),
        )
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub fn url(path: &str) -> String {
    format!("{ORIGIN}{path}")
}

pub fn get(path: &str) -> Request {
    Request::new(Method::Get, url(path))
}

/// The reply of a call a consumer answered.
pub fn responded(outcome: RouterResult<FetchOutcome>) -> Reply {
    match outcome {
        Ok(FetchOutcome::Responded(reply)) => reply,
        Ok(FetchOutcome::Passthrough(request)) => panic!("{} was passed through", request.url),
        Err(e) => panic!("fetch failed: {e}"),
    }
}

pub fn is_passthrough(outcome: &RouterResult<FetchOutcome>) -> bool {
    matches!(outcome, Ok(FetchOutcome::Passthrough(_)))
}

/// Start a simple mock backend that returns a fixed response.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let response_str = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            response.len(),
                            response
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });
    addr
}
