//! Consumer session options.

use futures_util::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RouterConfig;
use crate::dispatch::ErrorReplyPolicy;
use crate::http::{Method, Reply, Request};
use crate::routing::{HandlerResult, RouteHandler};

/// Settings for one consumer session.
#[derive(Debug, Clone)]
pub struct ConsumerOptions {
    /// Global prefix applied to every route.
    pub scope: Option<String>,
    /// Broadcast channel shared with the interception point.
    pub channel_name: String,
    /// Origin the handshake call is addressed to.
    pub origin: String,
    pub handshake_path: String,
    /// Bounded wait for the readiness probe.
    pub ready_timeout: Duration,
    /// Bounded wait for the route snapshot acknowledgement.
    pub ack_timeout: Duration,
    pub error_policy: ErrorReplyPolicy,
}

impl ConsumerOptions {
    pub fn from_config(config: &RouterConfig) -> Self {
        Self {
            scope: config.consumer.scope.clone(),
            channel_name: config.interception.channel_name.clone(),
            origin: config.listener.origin.clone(),
            handshake_path: config.interception.handshake_path.clone(),
            ready_timeout: Duration::from_millis(config.consumer.ready_timeout_ms),
            ack_timeout: Duration::from_millis(config.consumer.ack_timeout_ms),
            error_policy: config.consumer.error_policy,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Absolute URL of the session handshake.
    pub fn handshake_url(&self) -> String {
        format!(
            "{}/{}",
            self.origin.trim_end_matches('/'),
            self.handshake_path.trim_start_matches('/')
        )
    }
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self::from_config(&RouterConfig::default())
    }
}

/// A route registered through [`ConsumerSession::route`](crate::consumer::ConsumerSession::route).
#[derive(Clone)]
pub struct RouteConfig {
    /// `None` matches every method.
    pub method: Option<Method>,
    pub path: String,
    pub handler: RouteHandler,
}

impl RouteConfig {
    pub fn new<F>(method: Option<Method>, path: impl Into<String>, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Reply) -> BoxFuture<'a, HandlerResult>
            + Send
            + Sync
            + 'static,
    {
        Self {
            method,
            path: path.into(),
            handler: Arc::new(handler),
        }
    }
}

impl fmt::Debug for RouteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteConfig")
            .field("method", &self.method)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Options for [`ConsumerSession::register`](crate::consumer::ConsumerSession::register).
#[derive(Debug, Clone, Default)]
pub struct RegisterOptions {
    /// Prefix applied to routes the plugin registers.
    pub path: Option<String>,
}

impl RegisterOptions {
    pub fn prefix(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }
}
