//! A tab's view of the network.

use futures_util::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

use crate::error::{RouterError, RouterResult};
use crate::http::{Reply, Request};
use crate::interception::point::{FetchOutcome, InterceptionPoint};

/// Issues same-origin calls on behalf of a consumer session.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, request: Request) -> BoxFuture<'_, RouterResult<Reply>>;
}

/// One page instance, known to the interception point by its client id.
#[derive(Clone)]
pub struct Tab {
    client_id: String,
    point: Arc<InterceptionPoint>,
}

impl Tab {
    pub(crate) fn new(client_id: String, point: Arc<InterceptionPoint>) -> Self {
        Self { client_id, point }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Send a call through the interception point.
    pub async fn request(&self, request: Request) -> RouterResult<FetchOutcome> {
        self.point.fetch(&self.client_id, request).await
    }
}

impl Fetcher for Tab {
    fn fetch(&self, request: Request) -> BoxFuture<'_, RouterResult<Reply>> {
        Box::pin(async move {
            match self.request(request).await? {
                FetchOutcome::Responded(reply) => Ok(reply),
                FetchOutcome::Passthrough(request) => {
                    Err(RouterError::NotIntercepted { url: request.url })
                }
            }
        })
    }
}

impl fmt::Debug for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tab")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}
