//! HTTP gateway in front of the interception point.
//!
//! # Responsibilities
//! - Create Axum Router with the admin API and the catch-all gateway
//! - Wire up middleware (tracing, limits, timeout, request ID)
//! - Turn each HTTP request into a call from the tab named by its header
//! - Answer from the tab's consumer, or pass the call through upstream

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{request::Parts, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::config::RouterConfig;
use crate::error::RouterError;
use crate::http::{Method, Payload, Request};
use crate::interception::{FetchOutcome, InterceptionPoint, TabHost};

const X_REQUEST_ID: &str = "x-request-id";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub point: Arc<InterceptionPoint>,
    pub host: Arc<TabHost>,
    pub client: Client<HttpConnector, Body>,
    pub config: Arc<RouterConfig>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(point: Arc<InterceptionPoint>, host: Arc<TabHost>, config: Arc<RouterConfig>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            point,
            host,
            client,
            config,
            started_at: Instant::now(),
        }
    }
}

/// HTTP gateway server.
pub struct GatewayServer {
    router: Router,
}

impl GatewayServer {
    pub fn new(state: AppState) -> Self {
        Self {
            router: Self::build_router(state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        let listener = &state.config.listener;
        let timeout = Duration::from_secs(listener.request_timeout_secs);
        let body_limit = listener.max_body_bytes;

        let mut router = Router::new()
            .route("/", any(intercept_handler))
            .route("/{*path}", any(intercept_handler));
        if state.config.admin.enabled {
            router = router.merge(setup_admin_router(state.clone()));
        }

        router.with_state(state).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(RequestBodyLimitLayer::new(body_limit))
                .layer(TimeoutLayer::new(timeout)),
        )
    }

    /// The configured router, for serving on a custom listener.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Serve on `listener` until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Gateway starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Gateway received shutdown signal");
            })
            .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

/// Offer the request to the calling tab, falling back to the upstream.
async fn intercept_handler(State(state): State<AppState>, request: axum::extract::Request) -> Response {
    let (parts, body) = request.into_parts();
    let request_id = header_value(&parts.headers, X_REQUEST_ID).unwrap_or("unknown").to_string();

    let bytes = match axum::body::to_bytes(body, state.config.listener.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to read request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let client_id = header_value(&parts.headers, &state.config.listener.client_id_header).map(str::to_string);
    let Some(client_id) = client_id else {
        return passthrough(&state, &parts, bytes, &request_id).await;
    };
    state.host.touch(&client_id);

    let Some(request) = to_request(&state.config.listener.origin, &parts, &bytes) else {
        return passthrough(&state, &parts, bytes, &request_id).await;
    };

    tracing::debug!(
        request_id = %request_id,
        client_id = %client_id,
        method = %request.method,
        url = %request.url,
        "Intercepting request"
    );

    match state.point.fetch(&client_id, request).await {
        Ok(FetchOutcome::Responded(reply)) => reply.into_response(),
        Ok(FetchOutcome::Passthrough(_)) => passthrough(&state, &parts, bytes, &request_id).await,
        Err(RouterError::Timeout { id, timeout_ms }) => {
            tracing::warn!(request_id = %request_id, id = %id, timeout_ms, "Consumer did not reply");
            (StatusCode::GATEWAY_TIMEOUT, "Consumer did not reply in time").into_response()
        }
        Err(e @ RouterError::InvalidUrl { .. }) => {
            tracing::warn!(request_id = %request_id, error = %e, "Rejected request URL");
            (StatusCode::BAD_REQUEST, "Invalid request URL").into_response()
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Interception failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Interception failed").into_response()
        }
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn path_and_query(uri: &Uri) -> &str {
    uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/")
}

/// Build the intercepted request, or `None` for methods the router does not serve.
fn to_request(origin: &str, parts: &Parts, body: &Bytes) -> Option<Request> {
    let method = Method::from_str(parts.method.as_str()).ok()?;
    let url = format!("{}{}", origin.trim_end_matches('/'), path_and_query(&parts.uri));

    let mut request = Request::new(method, url);
    for (name, value) in parts.headers.iter() {
        if let Ok(value) = value.to_str() {
            request.headers.insert(name.as_str(), value);
        }
    }
    if !body.is_empty() {
        request.body = Some(Payload::Raw(body.to_vec()));
    }
    Some(request)
}

/// Send a call no tab serves to the configured upstream.
async fn passthrough(state: &AppState, parts: &Parts, body: Bytes, request_id: &str) -> Response {
    crate::observability::metrics::record_intercept("passthrough");

    let Some(upstream) = state.config.passthrough.upstream.as_deref() else {
        tracing::debug!(request_id, path = %parts.uri.path(), "No upstream configured");
        return (StatusCode::BAD_GATEWAY, "No upstream configured").into_response();
    };

    let uri = format!("{}{}", upstream.trim_end_matches('/'), path_and_query(&parts.uri));
    let mut builder = axum::http::Request::builder()
        .method(parts.method.clone())
        .uri(&uri);
    if let Some(headers) = builder.headers_mut() {
        for (name, value) in parts.headers.iter() {
            if name != axum::http::header::HOST {
                headers.insert(name.clone(), value.clone());
            }
        }
    }
    let upstream_request = match builder.body(Body::from(body)) {
        Ok(request) => request,
        Err(e) => {
            tracing::error!(request_id, uri = %uri, error = %e, "Failed to build upstream request");
            return (StatusCode::BAD_GATEWAY, "Invalid upstream request").into_response();
        }
    };

    let timeout = Duration::from_secs(state.config.passthrough.timeout_secs);
    match tokio::time::timeout(timeout, state.client.request(upstream_request)).await {
        Ok(Ok(response)) => {
            tracing::debug!(request_id, uri = %uri, status = %response.status(), "Passed through");
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Ok(Err(e)) => {
            tracing::error!(request_id, uri = %uri, error = %e, "Upstream error");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
        Err(_) => {
            tracing::warn!(request_id, uri = %uri, "Upstream timed out");
            (StatusCode::GATEWAY_TIMEOUT, "Upstream timed out").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_request_builds_absolute_url() {
        let (parts, _) = axum::http::Request::builder()
            .method("POST")
            .uri("/api/todos?draft=1")
            .header("content-type", "application/json")
            .body(())
            .unwrap()
            .into_parts();

        let request = to_request("http://localhost:8080/", &parts, &Bytes::from_static(b"{}")).unwrap();
        assert_eq!(request.url, "http://localhost:8080/api/todos?draft=1");
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.content_type(), Some("application/json"));
        assert_eq!(request.raw_body(), Some(&b"{}"[..]));
    }

    #[test]
    fn test_unknown_method_is_not_intercepted() {
        let (parts, _) = axum::http::Request::builder()
            .method("TRACE")
            .uri("/")
            .body(())
            .unwrap()
            .into_parts();
        assert!(to_request("http://localhost:8080", &parts, &Bytes::new()).is_none());
    }
}
