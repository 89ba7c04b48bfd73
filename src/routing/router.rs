//! Route table and lookup.
//!
//! # Responsibilities
//! - Store registered routes in registration order
//! - Look up the first route matching a request URL
//! - Produce route snapshots for the interception point
//!
//! # Design Decisions
//! - Append-only: routes are never updated or removed
//! - Copy-on-write via `ArcSwap`, so lookups never block registration
//! - Malformed URLs fail the lookup; a miss is `Ok(None)`

use arc_swap::ArcSwap;
use futures_util::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use url::Url;

use crate::error::{BoxError, RouterError, RouterResult};
use crate::http::{Body, Method, Reply, Request};
use crate::routing::matcher::{find_match, Matcher, Params, RoutePattern};

/// What a handler returns: an optional body for the reply.
pub type HandlerResult = Result<Option<Body>, BoxError>;

/// A route handler.
pub type RouteHandler = Arc<
    dyn for<'a> Fn(&'a mut Request, &'a mut Reply) -> BoxFuture<'a, HandlerResult> + Send + Sync,
>;

/// A registered route: pattern plus handler.
pub struct Route {
    pub pattern: RoutePattern,
    handler: RouteHandler,
}

impl Route {
    pub fn new<F>(pattern: RoutePattern, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Reply) -> BoxFuture<'a, HandlerResult>
            + Send
            + Sync
            + 'static,
    {
        Self {
            pattern,
            handler: Arc::new(handler),
        }
    }

    pub fn from_handler(pattern: RoutePattern, handler: RouteHandler) -> Self {
        Self { pattern, handler }
    }

    pub fn handler(&self) -> &RouteHandler {
        &self.handler
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

impl Matcher for Route {
    fn match_path(&self, method: Method, path: &str) -> Option<Params> {
        self.pattern.match_path(method, path)
    }
}

/// A successful lookup.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<Route>,
    pub params: Params,
}

/// Ordered, append-only route table.
pub struct RouteTable {
    routes: ArcSwap<Vec<Arc<Route>>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self {
            routes: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Append a route.
    pub fn push(&self, route: Route) -> Arc<Route> {
        let route = Arc::new(route);
        self.routes.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(route.clone());
            next
        });
        tracing::debug!(
            method = ?route.pattern.method,
            path = %route.pattern.path,
            mode = ?route.pattern.match_mode,
            "Route registered"
        );
        route
    }

    pub fn len(&self) -> usize {
        self.routes.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.load().is_empty()
    }

    /// Patterns of every route, in order.
    pub fn patterns(&self) -> Vec<RoutePattern> {
        self.routes
            .load()
            .iter()
            .map(|route| route.pattern.clone())
            .collect()
    }

    /// Match a method and an already extracted path.
    pub fn find(&self, method: Method, path: &str) -> Option<RouteMatch> {
        let routes = self.routes.load();
        find_match(routes.iter(), method, path).map(|(route, params)| RouteMatch {
            route: Arc::clone(route),
            params,
        })
    }

    /// Match a method and an absolute URL.
    pub fn lookup(&self, method: Method, url: &str) -> RouterResult<Option<RouteMatch>> {
        let parsed = parse_url(url)?;
        Ok(self.find(method, parsed.path()))
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.routes.load().iter()).finish()
    }
}

/// Parse an absolute URL, failing fast on malformed input.
pub fn parse_url(url: &str) -> RouterResult<Url> {
    Url::parse(url).map_err(|source| RouterError::InvalidUrl {
        url: url.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::MatchMode;

    fn text_route(method: Method, path: &str, mode: MatchMode, text: &'static str) -> Route {
        Route::new(RoutePattern::new(Some(method), path, mode), move |_req, _reply| {
            Box::pin(async move { Ok(Some(Body::from(text))) })
        })
    }

    #[test]
    fn test_lookup_with_params() {
        let table = RouteTable::new();
        table.push(text_route(Method::Get, "/users/:id", MatchMode::Exact, "user"));

        let matched = table
            .lookup(Method::Get, "http://localhost/users/42?tab=posts")
            .unwrap()
            .unwrap();
        assert_eq!(matched.params["id"], "42");
        assert_eq!(matched.route.pattern.path, "/users/:id");
    }

    #[test]
    fn test_lookup_miss_is_none() {
        let table = RouteTable::new();
        assert!(table.lookup(Method::Get, "http://localhost/").unwrap().is_none());
    }

    #[test]
    fn test_lookup_invalid_url_fails() {
        let table = RouteTable::new();
        let err = table.lookup(Method::Get, "/relative/path").unwrap_err();
        assert!(matches!(err, RouterError::InvalidUrl { .. }));
    }

    #[test]
    fn test_registration_order_wins() {
        let table = RouteTable::new();
        table.push(text_route(Method::Get, "/api/", MatchMode::Prefix, "prefix"));
        table.push(text_route(Method::Get, "/api/users", MatchMode::Exact, "exact"));

        let matched = table.find(Method::Get, "/api/users").unwrap();
        assert_eq!(matched.route.pattern.match_mode, MatchMode::Prefix);
        assert_eq!(table.len(), 2);
        assert_eq!(table.patterns()[1].path, "/api/users");
    }
}
