//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → bus → tab host → interception point (loop + sweeper)
//!     → demo tab → gateway
//!
//! Shutdown (shutdown.rs):
//!     Trigger → message loop, sweeper and gateway exit → tasks joined
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - One broadcast shutdown signal observed by every long-running task

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::Services;
