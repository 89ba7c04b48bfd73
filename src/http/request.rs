//! Intercepted request representation.
//!
//! # Responsibilities
//! - Carry the intercepted call through the hook pipeline
//! - Hold route params and query values once a route matched
//! - Keep the raw body until a decoder replaces it
//!
//! # Design Decisions
//! - URL kept as the absolute string the caller supplied; parsing happens at lookup
//! - Body is an explicit `Payload` so decoded forms never get sniffed at runtime

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::http::headers::Headers;

/// HTTP methods a route can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A method name outside the supported set.
#[derive(Debug, Error)]
#[error("Unsupported method: {0}")]
pub struct UnknownMethod(pub String);

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            _ => Err(UnknownMethod(s.to_string())),
        }
    }
}

/// Request body as seen by hooks and handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Bytes exactly as intercepted.
    Raw(Vec<u8>),
    /// A decoded `application/x-www-form-urlencoded` body.
    Form(BTreeMap<String, String>),
}

/// An intercepted request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Absolute URL of the call.
    pub url: String,
    pub method: Method,
    pub headers: Headers,
    pub body: Option<Payload>,
    /// Route parameters, filled in after a match.
    pub params: HashMap<String, String>,
    /// Decoded query string, filled in after a match.
    pub query: HashMap<String, String>,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            headers: Headers::new(),
            body: None,
            params: HashMap::new(),
            query: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(Payload::Raw(body.into()));
        self
    }

    /// Attach a JSON body and the matching content type.
    pub fn with_json<T: Serialize>(self, value: &T) -> Result<Self, serde_json::Error> {
        let bytes = serde_json::to_vec(value)?;
        Ok(self
            .with_header("content-type", "application/json")
            .with_body(bytes))
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type")
    }

    /// Raw body bytes, if the body has not been decoded.
    pub fn raw_body(&self) -> Option<&[u8]> {
        match &self.body {
            Some(Payload::Raw(bytes)) => Some(bytes),
            _ => None,
        }
    }

    /// Decoded form fields, if the body was a form.
    pub fn form(&self) -> Option<&BTreeMap<String, String>> {
        match &self.body {
            Some(Payload::Form(fields)) => Some(fields),
            _ => None,
        }
    }

    /// Parse the raw body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(self.raw_body().unwrap_or_default())
    }

    /// Body bytes for the wire; decoded forms are re-encoded.
    pub fn body_bytes(&self) -> Option<Vec<u8>> {
        match &self.body {
            Some(Payload::Raw(bytes)) => Some(bytes.clone()),
            Some(Payload::Form(fields)) => Some(
                url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(fields.iter())
                    .finish()
                    .into_bytes(),
            ),
            None => None,
        }
    }
}
