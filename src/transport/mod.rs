//! Cross-context transport subsystem.
//!
//! # Data Flow
//! ```text
//! Consumer session ──post──┐                 ┌──post── Interception point
//!                          ▼                 ▼
//!                   bus.rs (named broadcast channel)
//!                          │                 │
//!       Subscription ◀─────┘                 └─────▶ Subscription
//!
//! Round trip (interception point side):
//!     correlation.rs register id → post `handle`
//!     → consumer dispatches → posts `response` with id
//!     → correlation.rs resolves id (bounded wait)
//! ```
//!
//! # Design Decisions
//! - Messages are a closed enum (message.rs), matched exhaustively
//! - The channel carries no tab identity; that comes from the handshake

pub mod bus;
pub mod correlation;
pub mod message;

pub use bus::{BroadcastBus, Channel, Subscription};
pub use correlation::{correlation_id, PendingReplies};
pub use message::{Message, RegisterSession, SessionBinding, WireRequest};
