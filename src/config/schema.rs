//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::dispatch::ErrorReplyPolicy;

/// Root configuration for the router.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// Gateway listener settings.
    pub listener: ListenerConfig,

    /// Interception point settings.
    pub interception: InterceptionConfig,

    /// Defaults for consumer sessions.
    pub consumer: ConsumerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,

    /// Where calls no tab serves are sent.
    pub passthrough: PassthroughConfig,

    pub demo: DemoConfig,
}

/// Gateway listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind_address: String,

    /// Origin used to build absolute request URLs.
    pub origin: String,

    /// Header carrying the calling tab's id.
    pub client_id_header: String,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Total time allowed per gateway request, in seconds.
    pub request_timeout_secs: u64,

    /// How long a tab seen only over the gateway stays alive without traffic.
    pub client_idle_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            origin: "http://localhost:8080".to_string(),
            client_id_header: "x-client-id".to_string(),
            max_body_bytes: 2 * 1024 * 1024, // 2MB
            request_timeout_secs: 30,
            client_idle_secs: 300,
        }
    }
}

/// Interception point configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InterceptionConfig {
    /// Broadcast channel shared with consumer sessions.
    pub channel_name: String,

    /// Per-channel message buffer.
    pub bus_capacity: usize,

    /// Same-origin path of the session handshake.
    pub handshake_path: String,

    /// How long a forwarded call waits for its reply, in milliseconds.
    pub forward_timeout_ms: u64,

    /// Liveness sweep interval in seconds (0 disables the sweep).
    pub sweep_interval_secs: u64,

    /// Optional JSON file for the registry snapshot.
    pub snapshot_path: Option<String>,
}

impl Default for InterceptionConfig {
    fn default() -> Self {
        Self {
            channel_name: "intercept-router".to_string(),
            bus_capacity: 256,
            handshake_path: "/__intercept/register-session".to_string(),
            forward_timeout_ms: 30_000,
            sweep_interval_secs: 30,
            snapshot_path: None,
        }
    }
}

/// Consumer session defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Global path prefix for every route.
    pub scope: Option<String>,

    /// Readiness probe wait in milliseconds.
    pub ready_timeout_ms: u64,

    /// Route snapshot acknowledgement wait in milliseconds.
    pub ack_timeout_ms: u64,

    /// Reply sent after `onError` hooks ran.
    pub error_policy: ErrorReplyPolicy,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            scope: None,
            ready_timeout_ms: 1000,
            ack_timeout_ms: 1000,
            error_policy: ErrorReplyPolicy::default(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directive; `RUST_LOG` takes precedence.
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "intercept_router=info,tower_http=info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount the admin API on the gateway.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

/// Passthrough configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PassthroughConfig {
    /// Upstream base URL (e.g., "http://127.0.0.1:3000"); unset answers 502.
    pub upstream: Option<String>,

    /// Upstream request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for PassthroughConfig {
    fn default() -> Self {
        Self {
            upstream: None,
            timeout_secs: 10,
        }
    }
}

/// Built-in demo application.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Open a demo tab serving the todo application at startup.
    pub enabled: bool,

    /// Client id of the demo tab.
    pub client_id: String,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            client_id: "demo".to_string(),
        }
    }
}
