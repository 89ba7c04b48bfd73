//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP client
//!     → server.rs (axum gateway, client id header, body limit)
//!     → request.rs (intercepted Request with absolute URL)
//!     → [interception point: tab lookup, pre-filter, forward]
//!     → response.rs (Reply → HTTP response)
//!     → Send to client
//!
//! Passthrough:
//!     → server.rs forwards the untouched request upstream
//! ```

pub mod headers;
pub mod request;
pub mod response;
pub mod server;

pub use headers::Headers;
pub use request::{Method, Payload, Request};
pub use response::{Body, BodyType, Reply};
pub use server::{AppState, GatewayServer};
