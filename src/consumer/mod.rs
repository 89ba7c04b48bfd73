//! Consumer session subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (synchronous):
//!     get/post/.../route ──→ scope + prefix stack + path ──→ RouteTable
//!     add_hook ──→ HookRegistry
//!     register(plugin, {path}) ──→ push prefix → plugin → pop prefix
//!
//! listen():
//!     onReady → handle loop → readiness probe → handshake → routes:update
//!
//! Handle loop:
//!     `handle` for this consumer → Dispatcher → `response` with the same id
//! ```

pub mod options;
pub mod session;

pub use options::{ConsumerOptions, RegisterOptions, RouteConfig};
pub use session::ConsumerSession;
