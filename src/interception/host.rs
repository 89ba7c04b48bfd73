//! Hosting context: the source of tab identities.
//!
//! # Responsibilities
//! - Issue tab ids for in-process tabs
//! - Track tabs seen over the gateway by their client-id header
//! - Enumerate live tabs for the liveness sweep

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::interception::point::InterceptionPoint;
use crate::interception::tab::Tab;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("Client enumeration failed: {0}")]
    Enumeration(String),
}

/// Enumerates the tabs that are still alive.
pub trait ClientHost: Send + Sync {
    fn live_clients(&self) -> BoxFuture<'_, Result<HashSet<String>, HostError>>;
}

#[derive(Debug, Clone, Copy)]
enum Presence {
    /// Opened in-process; alive until closed.
    Open,
    /// Seen over the gateway; alive until idle too long.
    SeenAt(Instant),
}

/// In-process host for tabs.
#[derive(Debug)]
pub struct TabHost {
    tabs: DashMap<String, Presence>,
    idle_timeout: Duration,
}

impl TabHost {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            tabs: DashMap::new(),
            idle_timeout,
        }
    }

    /// Open a tab with a fresh id.
    pub fn open_tab(&self, point: &Arc<InterceptionPoint>) -> Tab {
        self.open_tab_with_id(uuid::Uuid::new_v4().to_string(), point)
    }

    pub fn open_tab_with_id(&self, client_id: impl Into<String>, point: &Arc<InterceptionPoint>) -> Tab {
        let client_id = client_id.into();
        self.tabs.insert(client_id.clone(), Presence::Open);
        tracing::debug!(client_id = %client_id, "Tab opened");
        Tab::new(client_id, Arc::clone(point))
    }

    /// Record activity from a tab known only by id.
    pub fn touch(&self, client_id: &str) {
        let mut entry = self
            .tabs
            .entry(client_id.to_string())
            .or_insert(Presence::SeenAt(Instant::now()));
        if let Presence::SeenAt(seen) = entry.value_mut() {
            *seen = Instant::now();
        }
    }

    pub fn close_tab(&self, client_id: &str) -> bool {
        let closed = self.tabs.remove(client_id).is_some();
        if closed {
            tracing::debug!(client_id, "Tab closed");
        }
        closed
    }

    pub fn is_open(&self, client_id: &str) -> bool {
        self.tabs
            .get(client_id)
            .is_some_and(|presence| self.is_alive(*presence.value()))
    }

    fn is_alive(&self, presence: Presence) -> bool {
        match presence {
            Presence::Open => true,
            Presence::SeenAt(seen) => seen.elapsed() < self.idle_timeout,
        }
    }
}

impl Default for TabHost {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

impl ClientHost for TabHost {
    fn live_clients(&self) -> BoxFuture<'_, Result<HashSet<String>, HostError>> {
        Box::pin(async move {
            self.tabs.retain(|_, presence| self.is_alive(*presence));
            Ok(self.tabs.iter().map(|entry| entry.key().clone()).collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_touched_tabs_expire_after_idle_timeout() {
        let host = TabHost::new(Duration::from_millis(20));
        host.touch("tab-1");
        assert!(host.is_open("tab-1"));

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!host.is_open("tab-1"));
        assert!(host.live_clients().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_closed_tab_is_not_live() {
        let host = TabHost::default();
        host.touch("tab-1");
        host.touch("tab-2");
        assert!(host.close_tab("tab-1"));
        assert!(!host.close_tab("tab-1"));

        let live = host.live_clients().await.unwrap();
        assert_eq!(live.len(), 1);
        assert!(live.contains("tab-2"));
    }
}
