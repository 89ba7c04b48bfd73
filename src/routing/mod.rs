//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (consumer session):
//!     scope + plugin prefixes + path
//!     → path.rs (normalize, `/*` → prefix mode)
//!     → router.rs (append to ordered table)
//!
//! Lookup (dispatcher and interception point):
//!     Absolute URL
//!     → router.rs (parse URL, extract path)
//!     → matcher.rs (method, prefix/exact/param match)
//!     → Return: RouteMatch with params, or no match
//! ```
//!
//! # Design Decisions
//! - Tables are append-only for the life of a session
//! - Deterministic: first registered match wins regardless of specificity
//! - The interception point runs the same matcher over route snapshots

pub mod matcher;
pub mod path;
pub mod router;

pub use matcher::{find_match, MatchMode, Matcher, Params, RoutePattern};
pub use router::{parse_url, HandlerResult, Route, RouteHandler, RouteMatch, RouteTable};
