//! Request dispatcher: the hook pipeline around a route handler.
//!
//! # Pipeline
//! ```text
//! onRequest ──body set──────────────────────────────┐
//!     │                                             │
//!  match ──miss──→ 404 (no onResponse / onError)    │
//!     │                                             │
//!  params, query, form body                         │
//!     │                                             │
//! preHandler ──body set─────────────────────────────┤
//!     │                                             │
//!  handler ─────────────────────────────────────→ onResponse → send
//!
//! any failure ──→ onError hooks ──→ error reply policy → send
//! ```
//!
//! # Design Decisions
//! - Pipeline state lives on the stack of one `dispatch` call
//! - A URL that fails to parse is returned to the caller, not caught
//! - Form decoding is best-effort and never fails the request
//! - A panicking hook or handler is caught and treated like a returned error

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use url::form_urlencoded;

use crate::error::{BoxError, RouterError, RouterResult};
use crate::hooks::HookRegistry;
use crate::http::{Method, Payload, Reply, Request};
use crate::observability::metrics;
use crate::routing::{parse_url, RouteTable};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// What to send after `onError` hooks ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReplyPolicy {
    /// Always send `500 {"error":"Internal server error"}`; hook edits are discarded.
    #[default]
    FixedInternalError,
    /// Send the reply as `onError` hooks left it, if they set a body.
    PreserveHookReply,
}

impl ErrorReplyPolicy {
    fn reply_for(self, hook_reply: Reply) -> Reply {
        match self {
            ErrorReplyPolicy::PreserveHookReply if hook_reply.is_sent() => hook_reply,
            _ => Reply::internal_error(),
        }
    }
}

enum Outcome {
    Respond,
    NotFound,
}

enum Failure {
    Lookup(RouterError),
    Pipeline(BoxError),
}

/// Runs requests through the hook pipeline against a route table.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    routes: Arc<RouteTable>,
    hooks: Arc<HookRegistry>,
    error_policy: ErrorReplyPolicy,
}

impl Dispatcher {
    pub fn new(routes: Arc<RouteTable>, hooks: Arc<HookRegistry>) -> Self {
        Self {
            routes,
            hooks,
            error_policy: ErrorReplyPolicy::default(),
        }
    }

    pub fn with_error_policy(mut self, policy: ErrorReplyPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn error_policy(&self) -> ErrorReplyPolicy {
        self.error_policy
    }

    /// Process one request and produce its reply.
    pub async fn dispatch(&self, mut request: Request) -> RouterResult<Reply> {
        let start = Instant::now();
        let method = request.method;
        let mut reply = Reply::default();

        let processed = AssertUnwindSafe(self.process(&mut request, &mut reply))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(Failure::Pipeline(panic_error(panic))));

        let reply = match processed {
            Ok(Outcome::Respond) => reply,
            Ok(Outcome::NotFound) => {
                tracing::debug!(method = %method, url = %request.url, "No route matched");
                Reply::not_found()
            }
            Err(Failure::Lookup(error)) => return Err(error),
            Err(Failure::Pipeline(error)) => {
                tracing::error!(method = %method, url = %request.url, error = %error, "Request failed");
                let on_error = AssertUnwindSafe(self.hooks.run_on_error(&error, &mut request, &mut reply));
                if let Err(panic) = on_error.catch_unwind().await {
                    tracing::warn!(error = %panic_error(panic), "onError hook panicked");
                }
                self.error_policy.reply_for(reply)
            }
        };

        metrics::record_dispatch(method.as_str(), reply.status, start);
        Ok(reply)
    }

    async fn process(&self, request: &mut Request, reply: &mut Reply) -> Result<Outcome, Failure> {
        self.hooks
            .run_on_request(request, reply)
            .await
            .map_err(Failure::Pipeline)?;

        if !reply.is_sent() {
            let url = parse_url(&request.url).map_err(Failure::Lookup)?;
            let Some(matched) = self.routes.find(request.method, url.path()) else {
                return Ok(Outcome::NotFound);
            };

            request.params = matched.params;
            request.query = url.query_pairs().into_owned().collect();
            decode_form_body(request);

            self.hooks
                .run_pre_handler(request, reply)
                .await
                .map_err(Failure::Pipeline)?;

            if !reply.is_sent() {
                let handler = matched.route.handler();
                if let Some(body) = handler(&mut *request, &mut *reply)
                    .await
                    .map_err(Failure::Pipeline)?
                {
                    reply.apply_body(body);
                }
            }
        }

        self.hooks
            .run_on_response(request, reply)
            .await
            .map_err(Failure::Pipeline)?;
        Ok(Outcome::Respond)
    }
}

/// Turn a caught panic payload into a pipeline error.
fn panic_error(panic: Box<dyn Any + Send>) -> BoxError {
    let message = panic
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("panicked: {message}").into()
}

/// Replace a raw form-encoded POST body with its decoded fields.
fn decode_form_body(request: &mut Request) {
    if request.method != Method::Post {
        return;
    }
    let is_form = request
        .content_type()
        .is_some_and(|ct| ct.starts_with(FORM_CONTENT_TYPE));
    if !is_form {
        return;
    }
    let Some(Payload::Raw(bytes)) = &request.body else {
        return;
    };

    let fields: BTreeMap<String, String> = match std::str::from_utf8(bytes) {
        Ok(text) => form_urlencoded::parse(text.as_bytes()).into_owned().collect(),
        Err(error) => {
            tracing::debug!(url = %request.url, error = %error, "Keeping undecodable form body");
            return;
        }
    };
    request.body = Some(Payload::Form(fields));
}
