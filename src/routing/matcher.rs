//! Route matching logic.
//!
//! # Responsibilities
//! - Match the request method (unbound routes match any method)
//! - Match prefix routes by string prefix
//! - Match exact routes by equality or segment-wise with `:param` capture
//!
//! # Design Decisions
//! - Path matching is case-sensitive and trailing-slash sensitive
//! - Parameter values are percent-decoded; an empty value is not captured
//! - No regex: a linear scan in registration order, first match wins

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::http::Method;

/// Captured route parameters.
pub type Params = HashMap<String, String>;

/// How a route path is compared with the request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    Exact,
    Prefix,
}

/// Trait for matching a request method and path.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns the captured params if the request matches.
    fn match_path(&self, method: Method, path: &str) -> Option<Params>;
}

impl<T: Matcher + ?Sized> Matcher for std::sync::Arc<T> {
    fn match_path(&self, method: Method, path: &str) -> Option<Params> {
        (**self).match_path(method, path)
    }
}

/// The matchable part of a route, also the unit of route snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePattern {
    /// Bound method; `None` matches every method.
    pub method: Option<Method>,
    pub path: String,
    pub match_mode: MatchMode,
}

impl RoutePattern {
    pub fn new(method: Option<Method>, path: impl Into<String>, match_mode: MatchMode) -> Self {
        Self {
            method,
            path: path.into(),
            match_mode,
        }
    }

    pub fn has_params(&self) -> bool {
        self.path.split('/').any(|segment| segment.starts_with(':'))
    }

    fn match_segments(&self, path: &str) -> Option<Params> {
        let route_segments: Vec<&str> = self.path.split('/').collect();
        let path_segments: Vec<&str> = path.split('/').collect();
        if route_segments.len() != path_segments.len() {
            return None;
        }

        let mut params = Params::new();
        for (route_segment, path_segment) in route_segments.iter().zip(&path_segments) {
            if let Some(name) = route_segment.strip_prefix(':') {
                let value = percent_decode_str(path_segment).decode_utf8_lossy();
                if !value.is_empty() {
                    params.insert(name.to_string(), value.into_owned());
                }
            } else if route_segment != path_segment {
                return None;
            }
        }
        Some(params)
    }
}

impl Matcher for RoutePattern {
    fn match_path(&self, method: Method, path: &str) -> Option<Params> {
        if self.method.is_some_and(|bound| bound != method) {
            return None;
        }
        match self.match_mode {
            MatchMode::Prefix => path.starts_with(&self.path).then(Params::new),
            MatchMode::Exact if !self.has_params() => (path == self.path).then(Params::new),
            MatchMode::Exact => self.match_segments(path),
        }
    }
}

/// Find the first entry matching the request, in iteration order.
pub fn find_match<'a, T, I>(entries: I, method: Method, path: &str) -> Option<(&'a T, Params)>
where
    T: Matcher + 'a,
    I: IntoIterator<Item = &'a T>,
{
    entries
        .into_iter()
        .find_map(|entry| entry.match_path(method, path).map(|params| (entry, params)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact(method: Option<Method>, path: &str) -> RoutePattern {
        RoutePattern::new(method, path, MatchMode::Exact)
    }

    #[test]
    fn test_exact_match_is_byte_identical() {
        let route = exact(Some(Method::Get), "/users");
        assert!(route.match_path(Method::Get, "/users").is_some());
        assert!(route.match_path(Method::Get, "/users/").is_none());
        assert!(route.match_path(Method::Get, "/Users").is_none());
        assert!(route.match_path(Method::Post, "/users").is_none());
    }

    #[test]
    fn test_unbound_method_matches_all() {
        let route = exact(None, "/ping");
        assert!(route.match_path(Method::Delete, "/ping").is_some());
        assert!(route.match_path(Method::Options, "/ping").is_some());
    }

    #[test]
    fn test_prefix_match() {
        let route = RoutePattern::new(Some(Method::Get), "/api/", MatchMode::Prefix);
        assert!(route.match_path(Method::Get, "/api/").is_some());
        assert!(route.match_path(Method::Get, "/api/users/42").is_some());
        assert!(route.match_path(Method::Get, "/api").is_none());
        assert!(route.match_path(Method::Get, "/apiv2/x").is_none());
        assert!(route.match_path(Method::Get, "/api/x").unwrap().is_empty());
    }

    #[test]
    fn test_param_capture() {
        let route = exact(Some(Method::Get), "/users/:id/posts/:post");
        let params = route.match_path(Method::Get, "/users/42/posts/7").unwrap();
        assert_eq!(params["id"], "42");
        assert_eq!(params["post"], "7");
    }

    #[test]
    fn test_param_segment_count_must_match() {
        let route = exact(Some(Method::Get), "/users/:id");
        assert!(route.match_path(Method::Get, "/users").is_none());
        assert!(route.match_path(Method::Get, "/users/42/extra").is_none());
        assert!(route.match_path(Method::Get, "/members/42").is_none());
    }

    #[test]
    fn test_param_is_percent_decoded() {
        let route = exact(Some(Method::Get), "/files/:name");
        let params = route.match_path(Method::Get, "/files/hello%20world").unwrap();
        assert_eq!(params["name"], "hello world");

        let params = route.match_path(Method::Get, "/files/%E2%9C%93%20ok").unwrap();
        assert_eq!(params["name"], "\u{2713} ok");
    }

    #[test]
    fn test_empty_param_is_omitted() {
        let route = exact(Some(Method::Get), "/users/:id");
        let params = route.match_path(Method::Get, "/users/").unwrap();
        assert!(!params.contains_key("id"));
    }

    #[test]
    fn test_first_match_wins() {
        let routes = vec![
            RoutePattern::new(Some(Method::Get), "/api/", MatchMode::Prefix),
            exact(Some(Method::Get), "/api/users"),
        ];
        let (matched, _) = find_match(&routes, Method::Get, "/api/users").unwrap();
        assert_eq!(matched.match_mode, MatchMode::Prefix);

        assert!(find_match(&routes, Method::Get, "/other").is_none());
    }

    #[test]
    fn test_pattern_serialization() {
        let pattern = exact(None, "/a/:b");
        let json = serde_json::to_value(&pattern).unwrap();
        assert_eq!(json, serde_json::json!({"method": null, "path": "/a/:b", "matchMode": "exact"}));
    }
}
