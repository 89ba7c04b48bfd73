//! Request dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! `handle` message (consumer side)
//!     → dispatcher.rs (hooks, match, handler, error boundary)
//!     → Reply
//!     → `response` message with the same correlation id
//! ```

pub mod dispatcher;

pub use dispatcher::{Dispatcher, ErrorReplyPolicy};
