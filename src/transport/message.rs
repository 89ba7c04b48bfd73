//! Cross-context message protocol.
//!
//! Every message on the bus is one variant of [`Message`], tagged on the
//! wire by its `type` field.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::http::{Headers, Method, Payload, Reply, Request};
use crate::routing::RoutePattern;

/// An intercepted request as carried by a `handle` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRequest {
    pub url: String,
    pub method: Method,
    pub headers: Headers,
    #[serde(default)]
    pub body: Option<Vec<u8>>,
}

impl From<Request> for WireRequest {
    fn from(request: Request) -> Self {
        let body = request.body_bytes();
        Self {
            url: request.url,
            method: request.method,
            headers: request.headers,
            body,
        }
    }
}

impl From<WireRequest> for Request {
    fn from(wire: WireRequest) -> Self {
        Request {
            url: wire.url,
            method: wire.method,
            headers: wire.headers,
            body: wire.body.map(Payload::Raw),
            params: HashMap::new(),
            query: HashMap::new(),
        }
    }
}

/// Body of the out-of-band session handshake call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterSession {
    pub consumer_id: String,
}

/// Answer to the session handshake: the tab and consumer now bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionBinding {
    pub client_id: String,
    pub consumer_id: String,
}

/// Messages exchanged between consumer sessions and the interception point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    /// Push a consumer's route snapshot.
    #[serde(rename = "routes:update", rename_all = "camelCase")]
    RoutesUpdate {
        consumer_id: String,
        routes: Vec<RoutePattern>,
    },

    /// Acknowledge a route snapshot.
    #[serde(rename = "routes:update:response", rename_all = "camelCase")]
    RoutesUpdated { consumer_id: String },

    /// Ask whether the interception point is running.
    #[serde(rename = "sw:check-readiness")]
    CheckReadiness,

    #[serde(rename = "sw:check-readiness:response")]
    Readiness { body: bool },

    /// Deliver an intercepted call to a consumer.
    #[serde(rename = "handle", rename_all = "camelCase")]
    Handle {
        id: String,
        consumer_id: String,
        request: WireRequest,
    },

    /// Deliver a consumer's reply for a `handle` message.
    #[serde(rename = "response")]
    Response {
        id: String,
        #[serde(flatten)]
        reply: Reply,
    },

    #[serde(rename = "routes:list")]
    RoutesList,

    #[serde(rename = "routes:list:response")]
    RoutesListing {
        routes: BTreeMap<String, Vec<RoutePattern>>,
    },

    #[serde(rename = "routes:clear")]
    RoutesClear,

    #[serde(rename = "clients:list")]
    ClientsList,

    #[serde(rename = "clients:list:response")]
    ClientsListing { clients: BTreeMap<String, String> },
}

impl Message {
    /// The wire `type` of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::RoutesUpdate { .. } => "routes:update",
            Message::RoutesUpdated { .. } => "routes:update:response",
            Message::CheckReadiness => "sw:check-readiness",
            Message::Readiness { .. } => "sw:check-readiness:response",
            Message::Handle { .. } => "handle",
            Message::Response { .. } => "response",
            Message::RoutesList => "routes:list",
            Message::RoutesListing { .. } => "routes:list:response",
            Message::RoutesClear => "routes:clear",
            Message::ClientsList => "clients:list",
            Message::ClientsListing { .. } => "clients:list:response",
        }
    }
}
