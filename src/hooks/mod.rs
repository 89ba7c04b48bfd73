//! Lifecycle hooks subsystem.
//!
//! # Stages
//! ```text
//! onRequest  → before routing, may answer early
//! preHandler → after routing, may answer early
//! onResponse → after the handler or an early answer
//! onError    → after any pipeline failure (observe only by default)
//! onRoute    → after each route registration
//! onReady    → once, at the start of listen()
//! ```

pub mod registry;

pub use registry::{
    ErrorHook, ExchangeHook, Hook, HookRegistry, HookResult, HookStage, ReadyHook, RouteHook,
};
