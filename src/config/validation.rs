//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, URLs and paths
//! - Validate value ranges (timeouts > 0, buffers non-empty)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::RouterConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    match url::Url::parse(&config.listener.origin) {
        Ok(origin) if origin.path() == "/" && origin.query().is_none() => {}
        Ok(_) => errors.push(ValidationError::new(
            "listener.origin",
            "must be a bare origin without path or query",
        )),
        Err(e) => errors.push(ValidationError::new("listener.origin", e.to_string())),
    }
    if config.listener.client_id_header.trim().is_empty() {
        errors.push(ValidationError::new("listener.client_id_header", "must not be empty"));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be greater than 0"));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new("listener.request_timeout_secs", "must be greater than 0"));
    }

    if config.interception.channel_name.is_empty() {
        errors.push(ValidationError::new("interception.channel_name", "must not be empty"));
    }
    if config.interception.bus_capacity == 0 {
        errors.push(ValidationError::new("interception.bus_capacity", "must be greater than 0"));
    }
    if !config.interception.handshake_path.starts_with('/') {
        errors.push(ValidationError::new("interception.handshake_path", "must start with '/'"));
    }
    if config.interception.forward_timeout_ms == 0 {
        errors.push(ValidationError::new("interception.forward_timeout_ms", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        errors.push(ValidationError::new("admin.api_key", "must be set when admin is enabled"));
    }

    if let Some(upstream) = &config.passthrough.upstream {
        if let Err(e) = url::Url::parse(upstream) {
            errors.push(ValidationError::new("passthrough.upstream", e.to_string()));
        }
    }

    if config.demo.enabled && config.demo.client_id.is_empty() {
        errors.push(ValidationError::new("demo.client_id", "must not be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
