//! Error types shared by every subsystem.
//!
//! # Taxonomy
//! - No route match is a 404 reply, never an error
//! - Handler and hook failures are `BoxError`s caught at the dispatcher boundary
//! - Everything that escapes to a caller is a [`RouterError`]

use thiserror::Error;

use crate::hooks::HookStage;

/// Error type returned by route handlers and hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can escape the router to its callers.
#[derive(Debug, Error)]
pub enum RouterError {
    /// A request URL could not be parsed as an absolute URL.
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// A plugin passed to `register` failed.
    #[error("Plugin registration failed: {0}")]
    Registration(#[source] BoxError),

    /// A lifecycle hook failed outside the request pipeline.
    #[error("{stage} hook failed: {source}")]
    Hook {
        stage: HookStage,
        #[source]
        source: BoxError,
    },

    /// A forwarded request got no reply in time.
    #[error("No reply for request {id} after {timeout_ms} ms")]
    Timeout { id: String, timeout_ms: u64 },

    /// The transport dropped a pending reply.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The session handshake was refused or malformed.
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// A same-origin call fell through to the network.
    #[error("Request to {url} was not intercepted")]
    NotIntercepted { url: String },

    /// Reading or writing the registry snapshot failed.
    #[error("Snapshot I/O error: {0}")]
    SnapshotIo(#[from] std::io::Error),

    /// The registry snapshot is not valid JSON.
    #[error("Snapshot format error: {0}")]
    SnapshotFormat(#[from] serde_json::Error),
}

/// Result type for router operations.
pub type RouterResult<T> = Result<T, RouterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RouterError::Timeout {
            id: "abc".into(),
            timeout_ms: 250,
        };
        assert_eq!(err.to_string(), "No reply for request abc after 250 ms");

        let err = RouterError::Hook {
            stage: HookStage::OnReady,
            source: "not ready".into(),
        };
        assert_eq!(err.to_string(), "onReady hook failed: not ready");
    }
}
