//! The shared interception point.
//!
//! # Responsibilities
//! - Answer the session handshake and bind tabs to consumers
//! - Apply registry messages arriving on the bus
//! - Pre-filter intercepted calls against the calling tab's routes
//! - Forward accepted calls to the consumer and await the reply
//!
//! # Design Decisions
//! - Sole writer of the [`SessionRegistry`]
//! - Every bus message goes through [`InterceptionPoint::handle_message`]
//! - Calls this point does not serve are handed back, never answered with 404

use serde_json::json;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::InterceptionConfig;
use crate::error::RouterResult;
use crate::http::{Method, Reply, Request};
use crate::interception::host::{ClientHost, HostError};
use crate::interception::registry::{ReapReport, SessionRegistry};
use crate::interception::snapshot::SnapshotStore;
use crate::interception::sweep::LivenessSweeper;
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::metrics;
use crate::routing::{find_match, parse_url};
use crate::transport::{BroadcastBus, Channel, Message, PendingReplies, RegisterSession, Subscription};

/// Result of offering a call to the interception point.
#[derive(Debug)]
pub enum FetchOutcome {
    /// A consumer answered the call.
    Responded(Reply),
    /// Not served here; the call goes to the network unchanged.
    Passthrough(Request),
}

pub struct InterceptionPoint {
    channel: Channel,
    registry: SessionRegistry,
    pending: PendingReplies,
    host: Arc<dyn ClientHost>,
    store: Option<SnapshotStore>,
    config: InterceptionConfig,
}

impl InterceptionPoint {
    /// Create a point on the configured channel, restoring the registry
    /// snapshot when one is configured.
    ///
    /// An unreadable snapshot is logged and the point starts empty.
    pub fn new(bus: &BroadcastBus, host: Arc<dyn ClientHost>, config: InterceptionConfig) -> Arc<Self> {
        let store = config.snapshot_path.as_ref().map(SnapshotStore::new);
        let registry = match store.as_ref().map(SnapshotStore::load) {
            Some(Ok(Some(snapshot))) => SessionRegistry::from_snapshot(snapshot),
            Some(Err(error)) => {
                tracing::warn!(
                    path = ?config.snapshot_path,
                    error = %error,
                    "Ignoring unreadable registry snapshot, starting empty"
                );
                SessionRegistry::new()
            }
            Some(Ok(None)) | None => SessionRegistry::new(),
        };
        metrics::set_registered_clients(registry.client_count());

        Arc::new(Self {
            channel: bus.channel(&config.channel_name),
            registry,
            pending: PendingReplies::new(),
            host,
            store,
            config,
        })
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn config(&self) -> &InterceptionConfig {
        &self.config
    }

    /// Number of forwarded calls still awaiting a reply.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Start the message loop and the liveness sweeper.
    pub fn start(self: &Arc<Self>, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        let subscription = self.channel.subscribe();
        let messages = tokio::spawn(Arc::clone(self).run(subscription, shutdown.subscribe()));

        let sweeper = LivenessSweeper::new(
            Arc::clone(self),
            Duration::from_secs(self.config.sweep_interval_secs),
        );
        let sweeps = tokio::spawn(sweeper.run(shutdown.subscribe()));

        tracing::info!(
            channel = %self.config.channel_name,
            sweep_interval_secs = self.config.sweep_interval_secs,
            "Interception point started"
        );
        vec![messages, sweeps]
    }

    async fn run(self: Arc<Self>, mut subscription: Subscription, mut shutdown: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                message = subscription.recv() => match message {
                    Some(message) => self.handle_message(message),
                    None => break,
                },
                _ = shutdown.recv() => {
                    tracing::info!("Interception point received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Apply one bus message.
    pub fn handle_message(&self, message: Message) {
        match message {
            Message::RoutesUpdate { consumer_id, routes } => {
                tracing::debug!(consumer_id = %consumer_id, routes = routes.len(), "Route snapshot received");
                self.registry.set_routes(&consumer_id, routes);
                self.persist();
                self.channel.post(Message::RoutesUpdated { consumer_id });
            }
            Message::CheckReadiness => self.channel.post(Message::Readiness { body: true }),
            Message::Response { id, reply } => {
                self.pending.resolve(&id, reply);
            }
            Message::RoutesList => self.channel.post(Message::RoutesListing {
                routes: self.registry.routes(),
            }),
            Message::RoutesClear => {
                let cleared = self.registry.clear_routes();
                tracing::info!(cleared, "Route snapshots cleared");
                self.persist();
            }
            Message::ClientsList => self.channel.post(Message::ClientsListing {
                clients: self.registry.clients(),
            }),
            Message::RoutesUpdated { .. }
            | Message::Readiness { .. }
            | Message::Handle { .. }
            | Message::RoutesListing { .. }
            | Message::ClientsListing { .. } => {
                tracing::trace!(kind = message.kind(), "Ignoring consumer-bound message");
            }
        }
    }

    /// Offer a call made by `client_id`.
    pub async fn fetch(&self, client_id: &str, request: Request) -> RouterResult<FetchOutcome> {
        let url = parse_url(&request.url)?;

        if request.method == Method::Post && url.path() == self.config.handshake_path {
            return Ok(FetchOutcome::Responded(self.register_session(client_id, &request)));
        }

        let Some(consumer_id) = self.registry.consumer_for(client_id) else {
            tracing::trace!(client_id, url = %request.url, "Unregistered tab, passing through");
            metrics::record_intercept("passthrough");
            return Ok(FetchOutcome::Passthrough(request));
        };

        let served = self
            .registry
            .routes_for(&consumer_id)
            .is_some_and(|routes| find_match(routes.iter(), request.method, url.path()).is_some());
        if !served {
            tracing::trace!(client_id, consumer_id = %consumer_id, url = %request.url, "No route, passing through");
            metrics::record_intercept("passthrough");
            return Ok(FetchOutcome::Passthrough(request));
        }

        let reply = self.forward(&consumer_id, request).await?;
        metrics::record_intercept("handled");
        Ok(FetchOutcome::Responded(reply))
    }

    async fn forward(&self, consumer_id: &str, request: Request) -> RouterResult<Reply> {
        let (id, rx) = self.pending.register();
        tracing::debug!(
            id = %id,
            consumer_id,
            method = %request.method,
            url = %request.url,
            "Forwarding request to consumer"
        );
        self.channel.post(Message::Handle {
            id: id.clone(),
            consumer_id: consumer_id.to_string(),
            request: request.into(),
        });

        let timeout = Duration::from_millis(self.config.forward_timeout_ms);
        self.pending.wait(&id, rx, timeout).await.inspect_err(|error| {
            tracing::warn!(id = %id, consumer_id, error = %error, "Forwarded request failed");
        })
    }

    fn register_session(&self, client_id: &str, request: &Request) -> Reply {
        let RegisterSession { consumer_id } = match request.json() {
            Ok(body) => body,
            Err(error) => {
                tracing::warn!(client_id, error = %error, "Malformed session handshake");
                return Reply::error(400, "Invalid session registration");
            }
        };

        if let Some(orphaned) = self.registry.bind_client(client_id, &consumer_id) {
            tracing::debug!(client_id, orphaned = %orphaned, "Tab rebound, dropped routes of its previous consumer");
        }
        self.persist();
        metrics::set_registered_clients(self.registry.client_count());
        tracing::info!(client_id, consumer_id = %consumer_id, "Session registered");

        let mut reply = Reply::new();
        reply.apply_body(json!({ "clientId": client_id, "consumerId": consumer_id }).into());
        reply
    }

    /// Drop registry entries for tabs the host no longer reports.
    pub async fn sweep(&self) -> Result<ReapReport, HostError> {
        let live: HashSet<String> = self.host.live_clients().await?;
        let report = self.registry.reap(&live);

        if !report.is_empty() {
            tracing::info!(
                clients = report.clients.len(),
                consumers = report.consumers.len(),
                "Reaped stale sessions"
            );
            self.persist();
        }
        metrics::record_sweep(report.clients.len());
        metrics::set_registered_clients(self.registry.client_count());
        Ok(report)
    }

    fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(error) = store.save(&self.registry.snapshot()) {
            tracing::warn!(path = %store.path().display(), error = %error, "Failed to save registry snapshot");
        }
    }
}

impl fmt::Debug for InterceptionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptionPoint")
            .field("channel", &self.config.channel_name)
            .field("clients", &self.registry.client_count())
            .field("consumers", &self.registry.consumer_count())
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Body;
    use crate::interception::host::TabHost;
    use crate::routing::{MatchMode, RoutePattern};
    use crate::transport::SessionBinding;

    const ORIGIN: &str = "http://localhost:8080";

    fn point(bus: &BroadcastBus) -> Arc<InterceptionPoint> {
        InterceptionPoint::new(bus, Arc::new(TabHost::default()), InterceptionConfig::default())
    }

    fn handshake(consumer_id: &str) -> Request {
        Request::new(
            Method::Post,
            format!("{ORIGIN}{}", InterceptionConfig::default().handshake_path),
        )
        .with_json(&RegisterSession {
            consumer_id: consumer_id.into(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_handshake_binds_tab() {
        let bus = BroadcastBus::default();
        let point = point(&bus);

        let outcome = point.fetch("tab-1", handshake("consumer-a")).await.unwrap();
        let FetchOutcome::Responded(reply) = outcome else {
            panic!("handshake was not answered");
        };
        let Some(Body::Json(value)) = reply.body else {
            panic!("handshake reply has no JSON body");
        };
        let binding: SessionBinding = serde_json::from_value(value).unwrap();
        assert_eq!(binding.client_id, "tab-1");
        assert_eq!(binding.consumer_id, "consumer-a");
        assert_eq!(point.registry().consumer_for("tab-1").as_deref(), Some("consumer-a"));
    }

    #[tokio::test]
    async fn test_malformed_handshake_is_rejected() {
        let bus = BroadcastBus::default();
        let point = point(&bus);
        let request = Request::new(Method::Post, format!("{ORIGIN}/__intercept/register-session"))
            .with_body("nope");

        let FetchOutcome::Responded(reply) = point.fetch("tab-1", request).await.unwrap() else {
            panic!("handshake was not answered");
        };
        assert_eq!(reply.status, 400);
        assert_eq!(point.registry().client_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_tab_passes_through() {
        let bus = BroadcastBus::default();
        let point = point(&bus);

        let outcome = point
            .fetch("stranger", Request::new(Method::Get, format!("{ORIGIN}/todos")))
            .await
            .unwrap();
        assert!(matches!(outcome, FetchOutcome::Passthrough(_)));
    }

    #[tokio::test]
    async fn test_unrouted_path_passes_through() {
        let bus = BroadcastBus::default();
        let point = point(&bus);
        point.fetch("tab-1", handshake("consumer-a")).await.unwrap();
        point.handle_message(Message::RoutesUpdate {
            consumer_id: "consumer-a".into(),
            routes: vec![RoutePattern::new(Some(Method::Get), "/todos", MatchMode::Exact)],
        });

        let outcome = point
            .fetch("tab-1", Request::new(Method::Get, format!("{ORIGIN}/elsewhere")))
            .await
            .unwrap();
        assert!(matches!(outcome, FetchOutcome::Passthrough(_)));
    }

    #[tokio::test]
    async fn test_routes_update_is_acknowledged() {
        let bus = BroadcastBus::default();
        let point = point(&bus);
        let consumer = bus.channel(&point.config().channel_name);
        let mut inbox = consumer.subscribe();

        point.handle_message(Message::RoutesUpdate {
            consumer_id: "consumer-a".into(),
            routes: Vec::new(),
        });

        let ack = inbox.recv().await;
        assert_eq!(
            ack,
            Some(Message::RoutesUpdated {
                consumer_id: "consumer-a".into()
            })
        );
    }

    #[tokio::test]
    async fn test_forward_times_out_without_consumer() {
        let bus = BroadcastBus::default();
        let config = InterceptionConfig {
            forward_timeout_ms: 30,
            ..InterceptionConfig::default()
        };
        let point = InterceptionPoint::new(&bus, Arc::new(TabHost::default()), config);
        point.fetch("tab-1", handshake("consumer-a")).await.unwrap();
        point.handle_message(Message::RoutesUpdate {
            consumer_id: "consumer-a".into(),
            routes: vec![RoutePattern::new(None, "/todos", MatchMode::Exact)],
        });

        let err = point
            .fetch("tab-1", Request::new(Method::Get, format!("{ORIGIN}/todos")))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::RouterError::Timeout { .. }));
        assert_eq!(point.pending(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_starts_empty() {
        let path = std::env::temp_dir().join(format!("corrupt-registry-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, "{\"clients\": [").unwrap();
        let config = InterceptionConfig {
            snapshot_path: Some(path.display().to_string()),
            ..InterceptionConfig::default()
        };

        let point = InterceptionPoint::new(&BroadcastBus::default(), Arc::new(TabHost::default()), config);
        assert_eq!(point.registry().client_count(), 0);
        assert_eq!(point.registry().consumer_count(), 0);

        point.fetch("tab-1", handshake("consumer-a")).await.unwrap();
        let restored = SnapshotStore::new(&path).load().unwrap().unwrap();
        assert_eq!(restored.clients.get("tab-1").map(String::as_str), Some("consumer-a"));

        std::fs::remove_file(path).unwrap_or_default();
    }
}
