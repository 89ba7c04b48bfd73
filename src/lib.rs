//! In-process HTTP request interception router library

pub mod admin;
pub mod config;
pub mod consumer;
pub mod demo;
pub mod dispatch;
pub mod error;
pub mod hooks;
pub mod http;
pub mod interception;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod transport;

pub use config::schema::RouterConfig;
pub use consumer::ConsumerSession;
pub use error::{RouterError, RouterResult};
pub use http::GatewayServer;
pub use interception::InterceptionPoint;
pub use lifecycle::Shutdown;
