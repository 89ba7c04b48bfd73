//! Lifecycle hook registry.
//!
//! # Responsibilities
//! - Keep one ordered list of hooks per lifecycle stage
//! - Run a stage's hooks sequentially, in registration order
//! - Propagate the first failure, except in `onError`
//!
//! # Design Decisions
//! - Additive only: hooks cannot be removed
//! - A stage's list is snapshotted before running, so a hook that
//!   registers another hook does not change the current run
//! - `onError` failures are logged and never abort sibling hooks

use futures_util::future::BoxFuture;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::BoxError;
use crate::http::{Reply, Request};
use crate::routing::RoutePattern;

/// Result of a single hook invocation.
pub type HookResult = Result<(), BoxError>;

/// Hook over the request and the reply being built.
pub type ExchangeHook = Arc<
    dyn for<'a> Fn(&'a mut Request, &'a mut Reply) -> BoxFuture<'a, HookResult> + Send + Sync,
>;

/// Hook observing a failed request.
pub type ErrorHook = Arc<
    dyn for<'a> Fn(&'a BoxError, &'a mut Request, &'a mut Reply) -> BoxFuture<'a, HookResult>
        + Send
        + Sync,
>;

/// Hook observing a newly registered route.
pub type RouteHook = Arc<dyn for<'a> Fn(&'a RoutePattern) -> BoxFuture<'a, HookResult> + Send + Sync>;

/// Hook run once when the session starts listening.
pub type ReadyHook = Arc<dyn Fn() -> BoxFuture<'static, HookResult> + Send + Sync>;

/// Lifecycle stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookStage {
    OnRequest,
    PreHandler,
    OnResponse,
    OnError,
    OnRoute,
    OnReady,
}

impl HookStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookStage::OnRequest => "onRequest",
            HookStage::PreHandler => "preHandler",
            HookStage::OnResponse => "onResponse",
            HookStage::OnError => "onError",
            HookStage::OnRoute => "onRoute",
            HookStage::OnReady => "onReady",
        }
    }
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hook tagged with its stage.
#[derive(Clone)]
pub enum Hook {
    OnRequest(ExchangeHook),
    PreHandler(ExchangeHook),
    OnResponse(ExchangeHook),
    OnError(ErrorHook),
    OnRoute(RouteHook),
    OnReady(ReadyHook),
}

impl Hook {
    pub fn on_request<F>(hook: F) -> Self
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Reply) -> BoxFuture<'a, HookResult>
            + Send
            + Sync
            + 'static,
    {
        Hook::OnRequest(Arc::new(hook))
    }

    pub fn pre_handler<F>(hook: F) -> Self
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Reply) -> BoxFuture<'a, HookResult>
            + Send
            + Sync
            + 'static,
    {
        Hook::PreHandler(Arc::new(hook))
    }

    pub fn on_response<F>(hook: F) -> Self
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Reply) -> BoxFuture<'a, HookResult>
            + Send
            + Sync
            + 'static,
    {
        Hook::OnResponse(Arc::new(hook))
    }

    pub fn on_error<F>(hook: F) -> Self
    where
        F: for<'a> Fn(&'a BoxError, &'a mut Request, &'a mut Reply) -> BoxFuture<'a, HookResult>
            + Send
            + Sync
            + 'static,
    {
        Hook::OnError(Arc::new(hook))
    }

    pub fn on_route<F>(hook: F) -> Self
    where
        F: for<'a> Fn(&'a RoutePattern) -> BoxFuture<'a, HookResult> + Send + Sync + 'static,
    {
        Hook::OnRoute(Arc::new(hook))
    }

    pub fn on_ready<F>(hook: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, HookResult> + Send + Sync + 'static,
    {
        Hook::OnReady(Arc::new(hook))
    }

    pub fn stage(&self) -> HookStage {
        match self {
            Hook::OnRequest(_) => HookStage::OnRequest,
            Hook::PreHandler(_) => HookStage::PreHandler,
            Hook::OnResponse(_) => HookStage::OnResponse,
            Hook::OnError(_) => HookStage::OnError,
            Hook::OnRoute(_) => HookStage::OnRoute,
            Hook::OnReady(_) => HookStage::OnReady,
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Hook").field(&self.stage()).finish()
    }
}

/// Per-stage ordered hook lists.
#[derive(Default)]
pub struct HookRegistry {
    on_request: Mutex<Vec<ExchangeHook>>,
    pre_handler: Mutex<Vec<ExchangeHook>>,
    on_response: Mutex<Vec<ExchangeHook>>,
    on_error: Mutex<Vec<ErrorHook>>,
    on_route: Mutex<Vec<RouteHook>>,
    on_ready: Mutex<Vec<ReadyHook>>,
}

fn lock<T>(list: &Mutex<T>) -> MutexGuard<'_, T> {
    list.lock().unwrap_or_else(PoisonError::into_inner)
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook to its stage.
    pub fn add(&self, hook: Hook) {
        let stage = hook.stage();
        match hook {
            Hook::OnRequest(h) => lock(&self.on_request).push(h),
            Hook::PreHandler(h) => lock(&self.pre_handler).push(h),
            Hook::OnResponse(h) => lock(&self.on_response).push(h),
            Hook::OnError(h) => lock(&self.on_error).push(h),
            Hook::OnRoute(h) => lock(&self.on_route).push(h),
            Hook::OnReady(h) => lock(&self.on_ready).push(h),
        }
        tracing::trace!(stage = %stage, "Hook registered");
    }

    /// Number of hooks registered for a stage.
    pub fn len(&self, stage: HookStage) -> usize {
        match stage {
            HookStage::OnRequest => lock(&self.on_request).len(),
            HookStage::PreHandler => lock(&self.pre_handler).len(),
            HookStage::OnResponse => lock(&self.on_response).len(),
            HookStage::OnError => lock(&self.on_error).len(),
            HookStage::OnRoute => lock(&self.on_route).len(),
            HookStage::OnReady => lock(&self.on_ready).len(),
        }
    }

    pub fn is_empty(&self, stage: HookStage) -> bool {
        self.len(stage) == 0
    }

    pub async fn run_on_request(&self, req: &mut Request, reply: &mut Reply) -> HookResult {
        Self::run_exchange(&self.on_request, req, reply).await
    }

    pub async fn run_pre_handler(&self, req: &mut Request, reply: &mut Reply) -> HookResult {
        Self::run_exchange(&self.pre_handler, req, reply).await
    }

    pub async fn run_on_response(&self, req: &mut Request, reply: &mut Reply) -> HookResult {
        Self::run_exchange(&self.on_response, req, reply).await
    }

    async fn run_exchange(
        list: &Mutex<Vec<ExchangeHook>>,
        req: &mut Request,
        reply: &mut Reply,
    ) -> HookResult {
        let hooks = lock(list).clone();
        for hook in hooks {
            hook(&mut *req, &mut *reply).await?;
        }
        Ok(())
    }

    /// Run every `onError` hook; failures are logged and skipped.
    pub async fn run_on_error(&self, error: &BoxError, req: &mut Request, reply: &mut Reply) {
        let hooks = lock(&self.on_error).clone();
        for (index, hook) in hooks.into_iter().enumerate() {
            if let Err(hook_error) = hook(error, &mut *req, &mut *reply).await {
                tracing::warn!(
                    hook = index,
                    error = %hook_error,
                    url = %req.url,
                    "onError hook failed"
                );
            }
        }
    }

    pub async fn run_on_route(&self, pattern: &RoutePattern) -> HookResult {
        let hooks = lock(&self.on_route).clone();
        for hook in hooks {
            hook(pattern).await?;
        }
        Ok(())
    }

    pub async fn run_on_ready(&self) -> HookResult {
        let hooks = lock(&self.on_ready).clone();
        for hook in hooks {
            hook().await?;
        }
        Ok(())
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("on_request", &self.len(HookStage::OnRequest))
            .field("pre_handler", &self.len(HookStage::PreHandler))
            .field("on_response", &self.len(HookStage::OnResponse))
            .field("on_error", &self.len(HookStage::OnError))
            .field("on_route", &self.len(HookStage::OnRoute))
            .field("on_ready", &self.len(HookStage::OnReady))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;

    fn request() -> Request {
        Request::new(Method::Get, "http://localhost/")
    }

    fn tagging(tag: &'static str) -> Hook {
        Hook::on_request(move |req, _reply| {
            Box::pin(async move {
                let trail = req.headers.get("x-trail").unwrap_or_default().to_string();
                req.headers.insert("x-trail", format!("{trail}{tag}"));
                Ok(())
            })
        })
    }

    #[tokio::test]
    async fn test_hooks_run_in_registration_order() {
        let hooks = HookRegistry::new();
        hooks.add(tagging("a"));
        hooks.add(tagging("b"));
        hooks.add(tagging("c"));

        let mut req = request();
        let mut reply = Reply::new();
        hooks.run_on_request(&mut req, &mut reply).await.unwrap();
        assert_eq!(req.headers.get("x-trail"), Some("abc"));
    }

    #[tokio::test]
    async fn test_failure_stops_stage() {
        let hooks = HookRegistry::new();
        hooks.add(tagging("a"));
        hooks.add(Hook::on_request(|_req, _reply| {
            Box::pin(async { Err("stop".into()) })
        }));
        hooks.add(tagging("c"));

        let mut req = request();
        let mut reply = Reply::new();
        let err = hooks.run_on_request(&mut req, &mut reply).await.unwrap_err();
        assert_eq!(err.to_string(), "stop");
        assert_eq!(req.headers.get("x-trail"), Some("a"));
    }

    #[tokio::test]
    async fn test_on_error_failures_do_not_stop_siblings() {
        let hooks = HookRegistry::new();
        hooks.add(Hook::on_error(|_err, _req, _reply| {
            Box::pin(async { Err("hook broke".into()) })
        }));
        hooks.add(Hook::on_error(|err, req, _reply| {
            Box::pin(async move {
                req.headers.insert("x-seen", err.to_string());
                Ok(())
            })
        }));

        let error: BoxError = "boom".into();
        let mut req = request();
        let mut reply = Reply::new();
        hooks.run_on_error(&error, &mut req, &mut reply).await;
        assert_eq!(req.headers.get("x-seen"), Some("boom"));
    }

    #[test]
    fn test_stage_counts() {
        let hooks = HookRegistry::new();
        hooks.add(tagging("a"));
        hooks.add(Hook::on_ready(|| Box::pin(async { Ok(()) })));
        assert_eq!(hooks.len(HookStage::OnRequest), 1);
        assert_eq!(hooks.len(HookStage::OnReady), 1);
        assert!(hooks.is_empty(HookStage::OnRoute));
        assert_eq!(HookStage::PreHandler.to_string(), "preHandler");
    }
}
