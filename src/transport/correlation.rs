//! Request/response correlation over the broadcast bus.
//!
//! # Responsibilities
//! - Issue a random id for each outbound `handle` message
//! - Resolve the waiting caller when the matching `response` arrives
//! - Bound the wait and drop the entry on timeout
//!
//! # Design Decisions
//! - Each entry resolves at most once; late or duplicate replies are ignored
//! - No cancellation: once posted, a request runs to completion on the consumer

use dashmap::DashMap;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::time::Duration;
use tokio::sync::oneshot;

use crate::error::{RouterError, RouterResult};
use crate::http::Reply;

const ID_LEN: usize = 16;

/// Generate a random correlation id.
pub fn correlation_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}

/// Replies awaited by id.
#[derive(Debug, Default)]
pub struct PendingReplies {
    entries: DashMap<String, oneshot::Sender<Reply>>,
}

impl PendingReplies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a pending entry under a fresh id.
    pub fn register(&self) -> (String, oneshot::Receiver<Reply>) {
        let (tx, rx) = oneshot::channel();
        let id = correlation_id();
        self.entries.insert(id.clone(), tx);
        (id, rx)
    }

    /// Resolve an entry. Returns `false` for unknown or already resolved ids.
    pub fn resolve(&self, id: &str, reply: Reply) -> bool {
        match self.entries.remove(id) {
            Some((_, tx)) => tx.send(reply).is_ok(),
            None => {
                tracing::debug!(id, "Reply for unknown or settled request ignored");
                false
            }
        }
    }

    /// Drop an entry without resolving it.
    pub fn cancel(&self, id: &str) {
        self.entries.remove(id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Wait for the reply to `id`, failing with `Timeout` after `timeout`.
    pub async fn wait(
        &self,
        id: &str,
        rx: oneshot::Receiver<Reply>,
        timeout: Duration,
    ) -> RouterResult<Reply> {
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(RouterError::Transport(format!(
                "reply channel for request {id} closed"
            ))),
            Err(_) => {
                self.cancel(id);
                Err(RouterError::Timeout {
                    id: id.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }
}
