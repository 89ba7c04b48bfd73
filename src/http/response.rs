//! Reply construction and conversion to HTTP responses.
//!
//! # Responsibilities
//! - Hold the reply mutated in place by hooks and handlers
//! - Tag every body with its kind at creation (`Body` variants)
//! - Infer default `Content-Type` from the body kind
//! - Convert a finished reply into an axum response
//!
//! # Design Decisions
//! - No runtime sniffing: the `Body` variant is the body type
//! - Defaults never override headers already set by hooks or handlers

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::http::headers::Headers;

/// Wire tag for the kind of body a reply carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyType {
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "arrayBuffer")]
    Bytes,
}

/// A reply body together with its kind.
///
/// Serializes as sibling `bodyType` and `body` fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "bodyType", content = "body")]
pub enum Body {
    #[serde(rename = "json")]
    Json(serde_json::Value),
    #[serde(rename = "text")]
    Text(String),
    #[serde(rename = "arrayBuffer")]
    Bytes(Vec<u8>),
}

impl Body {
    /// Serialize any value into a JSON body.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Body::Json(serde_json::to_value(value)?))
    }

    pub fn body_type(&self) -> BodyType {
        match self {
            Body::Json(_) => BodyType::Json,
            Body::Text(_) => BodyType::Text,
            Body::Bytes(_) => BodyType::Bytes,
        }
    }

    /// Default content type for this kind; bytes force none.
    pub fn default_content_type(&self) -> Option<&'static str> {
        match self {
            Body::Json(_) => Some("application/json"),
            Body::Text(_) => Some("text/html"),
            Body::Bytes(_) => None,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Body::Json(value) => serde_json::to_vec(value).unwrap_or_default(),
            Body::Text(text) => text.clone().into_bytes(),
            Body::Bytes(bytes) => bytes.clone(),
        }
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Body::Json(value)
    }
}

/// The reply threaded through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub status: u16,
    pub status_text: String,
    pub headers: Headers,
    #[serde(flatten)]
    pub body: Option<Body>,
}

impl Default for Reply {
    fn default() -> Self {
        Self {
            status: 200,
            status_text: "OK".to_string(),
            headers: Headers::new(),
            body: None,
        }
    }
}

impl Reply {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the status code and its canonical status text.
    pub fn status(&mut self, code: u16) -> &mut Self {
        self.status = code;
        self.status_text = reason_phrase(code).to_string();
        self
    }

    pub fn header(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the body directly. From a hook this short-circuits the handler.
    pub fn send(&mut self, body: impl Into<Body>) -> &mut Self {
        self.body = Some(body.into());
        self
    }

    /// Whether a body has been set.
    pub fn is_sent(&self) -> bool {
        self.body.is_some()
    }

    /// Body type of the reply; `json` until a body says otherwise.
    pub fn body_type(&self) -> BodyType {
        self.body
            .as_ref()
            .map(Body::body_type)
            .unwrap_or(BodyType::Json)
    }

    /// Apply a handler's return value and the default content type.
    pub(crate) fn apply_body(&mut self, body: Body) {
        if let Some(content_type) = body.default_content_type() {
            self.headers.insert_default("content-type", content_type);
        }
        self.body = Some(body);
    }

    /// The reply for a request no route matched.
    pub fn not_found() -> Self {
        Self::error(404, "Route not found")
    }

    /// The fixed reply for a failed request.
    pub fn internal_error() -> Self {
        Self::error(500, "Internal server error")
    }

    /// A JSON `{"error": message}` reply with the given status.
    pub fn error(code: u16, message: &str) -> Self {
        let mut reply = Reply::new();
        reply.status(code);
        reply.apply_body(Body::Json(serde_json::json!({ "error": message })));
        reply
    }

    pub fn body_bytes(&self) -> Vec<u8> {
        self.body.as_ref().map(Body::to_bytes).unwrap_or_default()
    }
}

fn reason_phrase(code: u16) -> &'static str {
    StatusCode::from_u16(code)
        .ok()
        .and_then(|status| status.canonical_reason())
        .unwrap_or("")
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = Response::new(axum::body::Body::from(self.body_bytes()));
        *response.status_mut() = status;

        let headers = response.headers_mut();
        for (name, value) in self.headers.iter() {
            match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => tracing::warn!(header = %name, "Dropping invalid reply header"),
            }
        }
        response
    }
}
