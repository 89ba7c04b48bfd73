//! Interception point subsystem.
//!
//! # Data Flow
//! ```text
//! Tab call ──→ point.rs fetch(client_id, request)
//!                 │
//!                 ├── handshake path ──→ bind tab → consumer (registry.rs)
//!                 ├── unknown tab ─────→ Passthrough
//!                 ├── no route match ──→ Passthrough
//!                 └── match ──→ `handle` on the bus ──→ await `response`
//!
//! Bus message ──→ point.rs handle_message ──→ registry.rs
//!
//! sweep.rs (every interval):
//!     host.rs live tabs → registry.rs reap → snapshot.rs save
//! ```
//!
//! # Design Decisions
//! - Tab identity comes from the hosting context, never from the bus
//! - The route check here is a cheap pre-filter; the consumer's
//!   dispatcher performs the authoritative lookup
//! - The registry snapshot is optional and only restores routing state

pub mod host;
pub mod point;
pub mod registry;
pub mod snapshot;
pub mod sweep;
pub mod tab;

pub use host::{ClientHost, HostError, TabHost};
pub use point::{FetchOutcome, InterceptionPoint};
pub use registry::{ReapReport, SessionRegistry};
pub use snapshot::{RegistrySnapshot, SnapshotStore};
pub use sweep::LivenessSweeper;
pub use tab::{Fetcher, Tab};
