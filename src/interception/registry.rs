//! Tab and consumer session registry.
//!
//! # Responsibilities
//! - Map each tab to the consumer serving it
//! - Hold each consumer's latest route snapshot
//! - Drop tabs that are no longer alive, then their orphaned consumers
//!
//! # Design Decisions
//! - Reads are public; writes are crate-private and only issued by the
//!   interception point's message entry point, handshake and sweep
//! - Each write is one synchronous step, never split across an await

use dashmap::DashMap;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::interception::snapshot::RegistrySnapshot;
use crate::routing::RoutePattern;

/// Entries removed by one liveness sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReapReport {
    pub clients: Vec<String>,
    pub consumers: Vec<String>,
}

impl ReapReport {
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty() && self.consumers.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    clients: DashMap<String, String>,
    routes: DashMap<String, Arc<Vec<RoutePattern>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: RegistrySnapshot) -> Self {
        let registry = Self::new();
        for (client, consumer) in snapshot.clients {
            registry.clients.insert(client, consumer);
        }
        for (consumer, routes) in snapshot.routes {
            registry.routes.insert(consumer, Arc::new(routes));
        }
        registry
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            clients: self.clients(),
            routes: self.routes(),
        }
    }

    /// Consumer bound to a tab.
    pub fn consumer_for(&self, client_id: &str) -> Option<String> {
        self.clients.get(client_id).map(|entry| entry.value().clone())
    }

    /// Route snapshot pushed by a consumer.
    pub fn routes_for(&self, consumer_id: &str) -> Option<Arc<Vec<RoutePattern>>> {
        self.routes.get(consumer_id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn clients(&self) -> BTreeMap<String, String> {
        self.clients
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn routes(&self) -> BTreeMap<String, Vec<RoutePattern>> {
        self.routes
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().as_ref().clone()))
            .collect()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn consumer_count(&self) -> usize {
        self.routes.len()
    }

    /// Bind a tab to a consumer, replacing any earlier binding.
    ///
    /// A replaced consumer that no other tab maps to loses its route
    /// snapshot. Returns that orphaned consumer.
    pub(crate) fn bind_client(&self, client_id: &str, consumer_id: &str) -> Option<String> {
        let previous = self
            .clients
            .insert(client_id.to_string(), consumer_id.to_string())?;
        if previous == consumer_id || self.is_bound(&previous) {
            return None;
        }
        self.routes.remove(&previous);
        Some(previous)
    }

    fn is_bound(&self, consumer_id: &str) -> bool {
        self.clients.iter().any(|entry| entry.value() == consumer_id)
    }

    /// Replace a consumer's route snapshot.
    pub(crate) fn set_routes(&self, consumer_id: &str, routes: Vec<RoutePattern>) {
        self.routes.insert(consumer_id.to_string(), Arc::new(routes));
    }

    /// Forget every route snapshot. Tab bindings are kept.
    pub(crate) fn clear_routes(&self) -> usize {
        let cleared = self.routes.len();
        self.routes.clear();
        cleared
    }

    /// Remove tabs missing from `live`, then the route snapshots of
    /// consumers that no surviving tab maps to.
    pub(crate) fn reap(&self, live: &HashSet<String>) -> ReapReport {
        let mut report = ReapReport::default();
        let mut candidates = HashSet::new();

        self.clients.retain(|client, consumer| {
            if live.contains(client) {
                true
            } else {
                report.clients.push(client.clone());
                candidates.insert(consumer.clone());
                false
            }
        });

        let survivors: HashSet<String> = self
            .clients
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        for consumer in candidates {
            if !survivors.contains(&consumer) && self.routes.remove(&consumer).is_some() {
                report.consumers.push(consumer);
            }
        }

        report.clients.sort();
        report.consumers.sort();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;
    use crate::routing::MatchMode;

    fn shared_route() -> Vec<RoutePattern> {
        vec![RoutePattern::new(Some(Method::Get), "/shared", MatchMode::Exact)]
    }

    fn live(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn test_bind_and_lookup() {
        let registry = SessionRegistry::new();
        assert!(registry.consumer_for("tab-1").is_none());

        assert!(registry.bind_client("tab-1", "consumer-a").is_none());
        registry.set_routes("consumer-a", shared_route());

        assert_eq!(registry.consumer_for("tab-1").as_deref(), Some("consumer-a"));
        assert_eq!(registry.routes_for("consumer-a").unwrap().len(), 1);

        // Rebinding to the same consumer orphans nothing.
        assert!(registry.bind_client("tab-1", "consumer-a").is_none());
        assert!(registry.routes_for("consumer-a").is_some());
    }

    #[test]
    fn test_reload_drops_orphaned_consumer() {
        let registry = SessionRegistry::new();
        registry.bind_client("tab-1", "consumer-a");
        registry.set_routes("consumer-a", shared_route());

        let orphaned = registry.bind_client("tab-1", "consumer-b");
        registry.set_routes("consumer-b", shared_route());

        assert_eq!(orphaned.as_deref(), Some("consumer-a"));
        assert!(registry.routes_for("consumer-a").is_none());
        assert_eq!(registry.consumer_count(), 1);
        assert_eq!(registry.consumer_for("tab-1").as_deref(), Some("consumer-b"));
    }

    #[test]
    fn test_reload_keeps_consumer_bound_elsewhere() {
        let registry = SessionRegistry::new();
        registry.bind_client("tab-1", "consumer-a");
        registry.bind_client("tab-2", "consumer-a");
        registry.set_routes("consumer-a", shared_route());

        assert!(registry.bind_client("tab-1", "consumer-b").is_none());
        assert!(registry.routes_for("consumer-a").is_some());
    }

    #[test]
    fn test_reap_removes_dead_tabs_and_orphans() {
        let registry = SessionRegistry::new();
        registry.bind_client("tab-1", "consumer-a");
        registry.bind_client("tab-2", "consumer-b");
        registry.set_routes("consumer-a", shared_route());
        registry.set_routes("consumer-b", shared_route());

        let report = registry.reap(&live(&["tab-2"]));

        assert_eq!(report.clients, vec!["tab-1".to_string()]);
        assert_eq!(report.consumers, vec!["consumer-a".to_string()]);
        assert!(registry.routes_for("consumer-a").is_none());
        assert!(registry.routes_for("consumer-b").is_some());
    }

    #[test]
    fn test_reap_keeps_consumer_with_surviving_tab() {
        let registry = SessionRegistry::new();
        registry.bind_client("tab-1", "consumer-a");
        registry.bind_client("tab-2", "consumer-a");
        registry.set_routes("consumer-a", shared_route());

        let report = registry.reap(&live(&["tab-2"]));

        assert_eq!(report.clients, vec!["tab-1".to_string()]);
        assert!(report.consumers.is_empty());
        assert!(registry.routes_for("consumer-a").is_some());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let registry = SessionRegistry::new();
        registry.bind_client("tab-1", "consumer-a");
        registry.set_routes("consumer-a", shared_route());

        let restored = SessionRegistry::from_snapshot(registry.snapshot());
        assert_eq!(restored.consumer_for("tab-1").as_deref(), Some("consumer-a"));
        assert_eq!(restored.consumer_count(), 1);
    }

    #[test]
    fn test_clear_routes_keeps_bindings() {
        let registry = SessionRegistry::new();
        registry.bind_client("tab-1", "consumer-a");
        registry.set_routes("consumer-a", shared_route());

        assert_eq!(registry.clear_routes(), 1);
        assert_eq!(registry.client_count(), 1);
        assert_eq!(registry.consumer_count(), 0);
    }
}
