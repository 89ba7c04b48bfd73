//! Admin API.
//!
//! Bearer-key protected introspection of the interception point, mounted
//! on the gateway when `admin.enabled` is set.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/routes", get(get_routes).delete(clear_routes))
        .route("/admin/clients", get(get_clients))
        .route("/admin/sweep", post(run_sweep))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}
