//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log output (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (`consumer_id`, `client_id`, `url`) on every event
//! - Request ID set by the gateway and propagated on responses
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
