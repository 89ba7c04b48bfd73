use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::http::server::AppState;
use crate::interception::ReapReport;
use crate::routing::RoutePattern;
use crate::transport::Message;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub clients: usize,
    pub consumers: usize,
    pub pending_requests: usize,
}

#[derive(Debug, Serialize)]
pub struct ClearedRoutes {
    pub cleared: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let registry = state.point.registry();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        clients: registry.client_count(),
        consumers: registry.consumer_count(),
        pending_requests: state.point.pending(),
    })
}

/// Route snapshots by consumer id.
pub async fn get_routes(State(state): State<AppState>) -> Json<BTreeMap<String, Vec<RoutePattern>>> {
    Json(state.point.registry().routes())
}

/// Forget every route snapshot; tabs stay bound until their consumer pushes again.
pub async fn clear_routes(State(state): State<AppState>) -> Json<ClearedRoutes> {
    let cleared = state.point.registry().consumer_count();
    state.point.handle_message(Message::RoutesClear);
    Json(ClearedRoutes { cleared })
}

/// Tab to consumer bindings.
pub async fn get_clients(State(state): State<AppState>) -> Json<BTreeMap<String, String>> {
    Json(state.point.registry().clients())
}

/// Run a liveness sweep now.
pub async fn run_sweep(State(state): State<AppState>) -> Result<Json<ReapReport>, (StatusCode, String)> {
    state
        .point
        .sweep()
        .await
        .map(Json)
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
}
