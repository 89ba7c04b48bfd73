//! Consumer session: one tab's router.
//!
//! # Responsibilities
//! - Own the route table, hook registry and dispatcher of one consumer
//! - Compose route paths from the scope and the plugin prefix stack
//! - Register the tab with the interception point and push route snapshots
//! - Answer `handle` messages addressed to this consumer
//!
//! # Design Decisions
//! - Shorthand registration is synchronous; its `onRoute` hooks run on a
//!   spawned task, so their order relative to a burst of registrations is
//!   not guaranteed. `route_awaited` runs them inline.
//! - The prefix stack is restored by a drop guard, so a failing or
//!   cancelled plugin never leaks its prefix
//! - Bounded waits in `listen` proceed on timeout

use futures_util::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::consumer::options::{ConsumerOptions, RegisterOptions, RouteConfig};
use crate::dispatch::Dispatcher;
use crate::error::{BoxError, RouterError, RouterResult};
use crate::hooks::{Hook, HookRegistry, HookStage};
use crate::http::{Body, Method, Reply, Request};
use crate::interception::Fetcher;
use crate::routing::path::compose;
use crate::routing::{HandlerResult, Route, RouteHandler, RoutePattern, RouteTable};
use crate::transport::{BroadcastBus, Channel, Message, RegisterSession, SessionBinding, Subscription};

const ID_PREFIX: &str = "consumer-";

fn lock<T>(value: &Mutex<T>) -> MutexGuard<'_, T> {
    value.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Inner {
    id: String,
    routes: Arc<RouteTable>,
    hooks: Arc<HookRegistry>,
    dispatcher: Dispatcher,
    prefixes: Mutex<Vec<String>>,
    channel: Channel,
    fetcher: Arc<dyn Fetcher>,
    options: ConsumerOptions,
    binding: Mutex<Option<SessionBinding>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(listener) = lock(&self.listener).take() {
            listener.abort();
        }
    }
}

/// Handle to a consumer session. Clones share the same session.
#[derive(Clone)]
pub struct ConsumerSession {
    inner: Arc<Inner>,
}

macro_rules! method_shorthand {
    ($($(#[$doc:meta])* $name:ident => $method:expr;)+) => {
        $(
            $(#[$doc])*
            pub fn $name<F>(&self, path: &str, handler: F) -> &Self
            where
                F: for<'a> Fn(&'a mut Request, &'a mut Reply) -> BoxFuture<'a, HandlerResult>
                    + Send
                    + Sync
                    + 'static,
            {
                self.add_route($method, path, Arc::new(handler))
            }
        )+
    };
}

impl ConsumerSession {
    /// Create a session with a fresh `consumer-<uuid>` identity.
    pub fn new(bus: &BroadcastBus, fetcher: Arc<dyn Fetcher>, options: ConsumerOptions) -> Self {
        let id = format!("{ID_PREFIX}{}", Uuid::new_v4());
        let routes = Arc::new(RouteTable::new());
        let hooks = Arc::new(HookRegistry::new());
        let dispatcher = Dispatcher::new(Arc::clone(&routes), Arc::clone(&hooks))
            .with_error_policy(options.error_policy);
        let prefixes = options.scope.iter().cloned().collect();

        tracing::debug!(consumer_id = %id, scope = ?options.scope, "Consumer session created");

        Self {
            inner: Arc::new(Inner {
                id,
                routes,
                hooks,
                dispatcher,
                prefixes: Mutex::new(prefixes),
                channel: bus.channel(&options.channel_name),
                fetcher,
                options,
                binding: Mutex::new(None),
                listener: Mutex::new(None),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Tab id learned from the handshake, once `listen` has run.
    pub fn client_id(&self) -> Option<String> {
        lock(&self.inner.binding)
            .as_ref()
            .map(|binding| binding.client_id.clone())
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    /// Snapshot of the registered route patterns.
    pub fn routes(&self) -> Vec<RoutePattern> {
        self.inner.routes.patterns()
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.inner.hooks
    }

    pub fn is_listening(&self) -> bool {
        lock(&self.inner.listener)
            .as_ref()
            .is_some_and(|listener| !listener.is_finished())
    }

    method_shorthand! {
        get => Some(Method::Get);
        post => Some(Method::Post);
        put => Some(Method::Put);
        patch => Some(Method::Patch);
        delete => Some(Method::Delete);
        head => Some(Method::Head);
        options => Some(Method::Options);
        /// Register a route matching every method.
        all => None;
    }

    /// Register a route; `onRoute` hooks run in the background.
    pub fn route(&self, config: RouteConfig) -> &Self {
        self.add_route(config.method, &config.path, config.handler)
    }

    /// Register a route and run its `onRoute` hooks before returning.
    pub async fn route_awaited(&self, config: RouteConfig) -> RouterResult<RoutePattern> {
        let pattern = self.insert_route(config.method, &config.path, config.handler);
        self.inner
            .hooks
            .run_on_route(&pattern)
            .await
            .map_err(|source| RouterError::Hook {
                stage: HookStage::OnRoute,
                source,
            })?;
        Ok(pattern)
    }

    pub fn add_hook(&self, hook: Hook) -> &Self {
        self.inner.hooks.add(hook);
        self
    }

    /// Run a plugin with `options.path` pushed onto the prefix stack.
    ///
    /// The stack is restored before this returns, whether the plugin
    /// succeeds or fails.
    pub async fn register<P, Fut>(&self, plugin: P, options: RegisterOptions) -> RouterResult<()>
    where
        P: FnOnce(ConsumerSession) -> Fut,
        Fut: Future<Output = Result<(), BoxError>>,
    {
        let prefix = options.path;
        let _guard = PrefixGuard::push(&self.inner.prefixes, prefix.clone());

        plugin(self.clone()).await.map_err(|error| {
            tracing::warn!(
                consumer_id = %self.inner.id,
                prefix = ?prefix,
                error = %error,
                "Plugin registration failed"
            );
            RouterError::Registration(error)
        })
    }

    fn add_route(&self, method: Option<Method>, path: &str, handler: RouteHandler) -> &Self {
        let pattern = self.insert_route(method, path, handler);
        self.spawn_on_route(pattern);
        self
    }

    fn insert_route(&self, method: Option<Method>, path: &str, handler: RouteHandler) -> RoutePattern {
        let (full_path, mode) = compose(&lock(&self.inner.prefixes), path);
        let pattern = RoutePattern::new(method, full_path, mode);
        self.inner
            .routes
            .push(Route::from_handler(pattern.clone(), handler));
        pattern
    }

    fn spawn_on_route(&self, pattern: RoutePattern) {
        if self.inner.hooks.is_empty(HookStage::OnRoute) {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let hooks = Arc::clone(&self.inner.hooks);
                runtime.spawn(async move {
                    if let Err(error) = hooks.run_on_route(&pattern).await {
                        tracing::warn!(path = %pattern.path, error = %error, "onRoute hook failed");
                    }
                });
            }
            Err(_) => {
                tracing::warn!(path = %pattern.path, "No async runtime, onRoute hooks skipped");
            }
        }
    }

    /// Start serving this consumer's routes through the interception point.
    ///
    /// Runs `onReady` hooks, starts answering `handle` messages, probes
    /// readiness, binds the tab with the handshake and pushes the route
    /// snapshot.
    pub async fn listen(&self) -> RouterResult<SessionBinding> {
        self.inner
            .hooks
            .run_on_ready()
            .await
            .map_err(|source| RouterError::Hook {
                stage: HookStage::OnReady,
                source,
            })?;

        self.start_listener();
        self.probe_readiness().await;
        let binding = self.handshake().await?;
        self.update_routes().await;

        tracing::info!(
            consumer_id = %self.inner.id,
            client_id = %binding.client_id,
            routes = self.inner.routes.len(),
            "Consumer listening"
        );
        Ok(binding)
    }

    /// Push the current route snapshot and wait for its acknowledgement.
    ///
    /// Returns `false` when no acknowledgement arrived in time.
    pub async fn update_routes(&self) -> bool {
        let id = self.inner.id.clone();
        let mut inbox = self.inner.channel.subscribe();
        self.inner.channel.post(Message::RoutesUpdate {
            consumer_id: id.clone(),
            routes: self.inner.routes.patterns(),
        });

        let acked = inbox
            .wait_for(self.inner.options.ack_timeout, |message| {
                matches!(message, Message::RoutesUpdated { consumer_id } if *consumer_id == id)
            })
            .await
            .is_some();
        if !acked {
            tracing::debug!(consumer_id = %id, "Route snapshot not acknowledged, proceeding");
        }
        acked
    }

    /// Stop answering `handle` messages.
    pub fn close(&self) {
        if let Some(listener) = lock(&self.inner.listener).take() {
            listener.abort();
            tracing::info!(consumer_id = %self.inner.id, "Consumer closed");
        }
    }

    async fn probe_readiness(&self) {
        let mut inbox = self.inner.channel.subscribe();
        self.inner.channel.post(Message::CheckReadiness);

        let ready = inbox
            .wait_for(self.inner.options.ready_timeout, |message| {
                matches!(message, Message::Readiness { body: true })
            })
            .await;
        if ready.is_none() {
            tracing::debug!(consumer_id = %self.inner.id, "Interception point readiness not confirmed, proceeding");
        }
    }

    async fn handshake(&self) -> RouterResult<SessionBinding> {
        let request = Request::new(Method::Post, self.inner.options.handshake_url())
            .with_json(&RegisterSession {
                consumer_id: self.inner.id.clone(),
            })
            .map_err(|e| RouterError::Handshake(e.to_string()))?;

        let reply = self.inner.fetcher.fetch(request).await?;
        if reply.status != 200 {
            return Err(RouterError::Handshake(format!(
                "unexpected status {} {}",
                reply.status, reply.status_text
            )));
        }
        let binding: SessionBinding = match reply.body {
            Some(Body::Json(value)) => {
                serde_json::from_value(value).map_err(|e| RouterError::Handshake(e.to_string()))?
            }
            _ => return Err(RouterError::Handshake("reply carried no JSON body".into())),
        };
        if binding.consumer_id != self.inner.id {
            return Err(RouterError::Handshake(format!(
                "bound to consumer {} instead of {}",
                binding.consumer_id, self.inner.id
            )));
        }

        *lock(&self.inner.binding) = Some(binding.clone());
        Ok(binding)
    }

    fn start_listener(&self) {
        let mut listener = lock(&self.inner.listener);
        if listener.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        let inbox = self.inner.channel.subscribe();
        *listener = Some(tokio::spawn(serve(
            self.inner.id.clone(),
            self.inner.dispatcher.clone(),
            self.inner.channel.clone(),
            inbox,
        )));
    }
}

/// Answer `handle` messages for `consumer_id` until the channel closes.
async fn serve(consumer_id: String, dispatcher: Dispatcher, channel: Channel, mut inbox: Subscription) {
    while let Some(message) = inbox.recv().await {
        let Message::Handle {
            id,
            consumer_id: target,
            request,
        } = message
        else {
            continue;
        };
        if target != consumer_id {
            continue;
        }

        let dispatcher = dispatcher.clone();
        let channel = channel.clone();
        tokio::spawn(async move {
            let reply = match dispatcher.dispatch(Request::from(request)).await {
                Ok(reply) => reply,
                Err(error) => {
                    tracing::error!(id = %id, error = %error, "Request could not be dispatched");
                    Reply::internal_error()
                }
            };
            channel.post(Message::Response { id, reply });
        });
    }
}

/// Restores the prefix stack to its depth at `push` when dropped.
struct PrefixGuard<'a> {
    prefixes: &'a Mutex<Vec<String>>,
    depth: usize,
}

impl<'a> PrefixGuard<'a> {
    fn push(prefixes: &'a Mutex<Vec<String>>, prefix: Option<String>) -> Self {
        let mut stack = lock(prefixes);
        let depth = stack.len();
        stack.extend(prefix);
        Self { prefixes, depth }
    }
}

impl Drop for PrefixGuard<'_> {
    fn drop(&mut self) {
        lock(self.prefixes).truncate(self.depth);
    }
}

impl fmt::Debug for ConsumerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerSession")
            .field("id", &self.inner.id)
            .field("routes", &self.inner.routes.len())
            .field("prefixes", &*lock(&self.inner.prefixes))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::MatchMode;
    use std::collections::HashSet;
    use std::time::Duration;

    /// Fetcher for sessions that never reach an interception point.
    struct Offline;

    impl Fetcher for Offline {
        fn fetch(&self, request: Request) -> BoxFuture<'_, RouterResult<Reply>> {
            Box::pin(async move { Err(RouterError::NotIntercepted { url: request.url }) })
        }
    }

    fn session() -> ConsumerSession {
        let options = ConsumerOptions {
            ready_timeout: Duration::from_millis(20),
            ack_timeout: Duration::from_millis(20),
            ..ConsumerOptions::default()
        };
        ConsumerSession::new(&BroadcastBus::default(), Arc::new(Offline), options)
    }

    fn ok<'a>(_req: &'a mut Request, _reply: &'a mut Reply) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async { Ok(None) })
    }

    fn paths(session: &ConsumerSession) -> Vec<String> {
        session.routes().into_iter().map(|p| p.path).collect()
    }

    #[test]
    fn test_identities_are_distinct() {
        let ids: HashSet<String> = (0..100).map(|_| session().id().to_string()).collect();
        assert_eq!(ids.len(), 100);
        for id in &ids {
            let uuid = id.strip_prefix(ID_PREFIX).unwrap();
            assert!(Uuid::parse_str(uuid).is_ok());
        }
    }

    #[test]
    fn test_scope_and_wildcard() {
        let session = ConsumerSession::new(
            &BroadcastBus::default(),
            Arc::new(Offline),
            ConsumerOptions::default().with_scope("/app/"),
        );
        session.get("/users/:id", ok).get("/static/*", ok);

        let routes = session.routes();
        assert_eq!(routes[0].path, "/app/users/:id");
        assert_eq!(routes[0].match_mode, MatchMode::Exact);
        assert_eq!(routes[1].path, "/app/static/");
        assert_eq!(routes[1].match_mode, MatchMode::Prefix);
    }

    #[test]
    fn test_all_has_no_method() {
        let session = session();
        session.all("/any", ok);
        assert_eq!(session.routes()[0].method, None);
    }

    #[tokio::test]
    async fn test_register_applies_nested_prefixes() {
        let session = session();
        session
            .register(
                |api| async move {
                    api.get("/health", ok);
                    api.register(
                        |v1| async move {
                            v1.get("/users", ok);
                            Ok::<(), BoxError>(())
                        },
                        RegisterOptions::prefix("/v1"),
                    )
                    .await?;
                    Ok::<(), BoxError>(())
                },
                RegisterOptions::prefix("/api"),
            )
            .await
            .unwrap();
        session.get("/after", ok);

        assert_eq!(paths(&session), vec!["/api/health", "/api/v1/users", "/after"]);
    }

    #[tokio::test]
    async fn test_failing_plugin_restores_prefixes() {
        let session = session();
        let err = session
            .register(
                |api| async move {
                    api.get("/one", ok).get("/two", ok);
                    Err::<(), BoxError>("plugin broke".into())
                },
                RegisterOptions::prefix("/api"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::Registration(_)));

        session.get("/root", ok);
        assert_eq!(paths(&session), vec!["/api/one", "/api/two", "/root"]);
    }

    #[tokio::test]
    async fn test_route_awaited_runs_on_route_hooks_inline() {
        let session = session();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        session.add_hook(Hook::on_route(move |pattern| {
            let sink = Arc::clone(&sink);
            Box::pin(async move {
                sink.lock().unwrap().push(pattern.path.clone());
                Ok(())
            })
        }));

        session
            .route_awaited(RouteConfig::new(Some(Method::Get), "/a", ok))
            .await
            .unwrap();
        session
            .route_awaited(RouteConfig::new(Some(Method::Get), "/b", ok))
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["/a".to_string(), "/b".to_string()]);
    }

    #[tokio::test]
    async fn test_listen_fails_without_handshake() {
        let session = session();
        let err = session.listen().await.unwrap_err();
        assert!(matches!(err, RouterError::NotIntercepted { .. }));
        assert!(session.client_id().is_none());
        session.close();
    }
}
