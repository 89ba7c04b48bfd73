//! Route path composition.
//!
//! Joins the session scope, active plugin prefixes and a route path into
//! the stored pattern, and turns a trailing `/*` into prefix matching.

use crate::routing::matcher::MatchMode;

/// Join path parts with exactly one `/` between segments.
///
/// The result always starts with `/` and never ends with one,
/// except for the root path itself.
pub fn join<'a, I>(parts: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut joined = String::new();
    for part in parts {
        let trimmed = part.trim_matches('/');
        if trimmed.is_empty() {
            continue;
        }
        joined.push('/');
        joined.push_str(trimmed);
    }
    if joined.is_empty() {
        joined.push('/');
    }
    joined
}

/// Compose the stored path and match mode for a route.
pub fn compose(prefixes: &[String], path: &str) -> (String, MatchMode) {
    let joined = join(prefixes.iter().map(String::as_str).chain(std::iter::once(path)));
    match joined.strip_suffix('*') {
        Some(stem) if stem.ends_with('/') => (stem.to_string(), MatchMode::Prefix),
        _ => (joined, MatchMode::Exact),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefixes(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_join_collapses_slashes() {
        assert_eq!(join(["/api/", "/v1//", "users/"]), "/api/v1/users");
        assert_eq!(join(["api", "users"]), "/api/users");
        assert_eq!(join(["", "/"]), "/");
    }

    #[test]
    fn test_compose_exact() {
        let (path, mode) = compose(&prefixes(&["/app"]), "/users/:id/");
        assert_eq!(path, "/app/users/:id");
        assert_eq!(mode, MatchMode::Exact);
    }

    #[test]
    fn test_compose_wildcard_becomes_prefix() {
        let (path, mode) = compose(&prefixes(&["app", "/api"]), "/*");
        assert_eq!(path, "/app/api/");
        assert_eq!(mode, MatchMode::Prefix);

        let (path, mode) = compose(&[], "/static/*");
        assert_eq!(path, "/static/");
        assert_eq!(mode, MatchMode::Prefix);

        let (path, mode) = compose(&[], "*");
        assert_eq!(path, "/");
        assert_eq!(mode, MatchMode::Prefix);
    }

    #[test]
    fn test_compose_star_inside_segment_is_literal() {
        let (path, mode) = compose(&[], "/files/a*");
        assert_eq!(path, "/files/a*");
        assert_eq!(mode, MatchMode::Exact);
    }
}
