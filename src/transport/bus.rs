//! Named broadcast channels.
//!
//! # Responsibilities
//! - Hand out channels scoped to a shared name
//! - Deliver each posted message to every other channel of that name
//! - Never echo a message back to the channel that posted it
//!
//! # Design Decisions
//! - Fire-and-forget: posting never waits and never fails
//! - A lagging subscriber skips what it missed instead of blocking senders
//! - Bounded waits for acknowledgements live here, not in callers

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::transport::message::Message;

/// Default per-channel buffer.
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct Envelope {
    origin: u64,
    message: Message,
}

#[derive(Debug)]
struct BusInner {
    channels: DashMap<String, broadcast::Sender<Envelope>>,
    next_id: AtomicU64,
    capacity: usize,
}

/// Registry of named broadcast channels.
#[derive(Debug, Clone)]
pub struct BroadcastBus {
    inner: Arc<BusInner>,
}

impl BroadcastBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                channels: DashMap::new(),
                next_id: AtomicU64::new(1),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Open a channel on the given name.
    pub fn channel(&self, name: &str) -> Channel {
        let sender = self
            .inner
            .channels
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(self.inner.capacity).0)
            .clone();
        Channel {
            name: name.to_string(),
            id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
            sender,
        }
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// One endpoint on a named channel.
///
/// Clones share the endpoint identity, so they do not hear each other.
#[derive(Debug, Clone)]
pub struct Channel {
    name: String,
    id: u64,
    sender: broadcast::Sender<Envelope>,
}

impl Channel {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Post a message to every other endpoint on this channel.
    pub fn post(&self, message: Message) {
        let kind = message.kind();
        let envelope = Envelope {
            origin: self.id,
            message,
        };
        match self.sender.send(envelope) {
            Ok(receivers) => {
                tracing::trace!(channel = %self.name, kind, receivers, "Message posted")
            }
            Err(_) => tracing::trace!(channel = %self.name, kind, "Message posted with no listeners"),
        }
    }

    /// Start receiving messages posted after this call.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            channel: self.name.clone(),
            own: self.id,
            receiver: self.sender.subscribe(),
        }
    }
}

/// Receiving side of a channel endpoint.
#[derive(Debug)]
pub struct Subscription {
    channel: String,
    own: u64,
    receiver: broadcast::Receiver<Envelope>,
}

impl Subscription {
    /// Next message from another endpoint; `None` once the channel is gone.
    pub async fn recv(&mut self) -> Option<Message> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) if envelope.origin == self.own => continue,
                Ok(envelope) => return Some(envelope.message),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(channel = %self.channel, skipped, "Subscriber lagged, messages dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Wait up to `timeout` for a message accepted by `accept`.
    ///
    /// Other messages received meanwhile are discarded.
    pub async fn wait_for<F>(&mut self, timeout: Duration, mut accept: F) -> Option<Message>
    where
        F: FnMut(&Message) -> bool,
    {
        let search = async {
            while let Some(message) = self.recv().await {
                if accept(&message) {
                    return Some(message);
                }
            }
            None
        };
        tokio::time::timeout(timeout, search).await.ok().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_post_reaches_other_endpoints_only() {
        let bus = BroadcastBus::default();
        let a = bus.channel("router");
        let b = bus.channel("router");
        let mut a_sub = a.subscribe();
        let mut b_sub = b.subscribe();

        a.post(Message::CheckReadiness);

        assert_eq!(b_sub.recv().await, Some(Message::CheckReadiness));
        let echoed = a_sub.wait_for(Duration::from_millis(50), |_| true).await;
        assert!(echoed.is_none());
    }

    #[tokio::test]
    async fn test_channels_are_scoped_by_name() {
        let bus = BroadcastBus::default();
        let a = bus.channel("one");
        let b = bus.channel("two");
        let mut b_sub = b.subscribe();

        a.post(Message::RoutesClear);
        let got = b_sub.wait_for(Duration::from_millis(50), |_| true).await;
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn test_wait_for_skips_unrelated_messages() {
        let bus = BroadcastBus::default();
        let a = bus.channel("router");
        let b = bus.channel("router");
        let mut b_sub = b.subscribe();

        a.post(Message::RoutesList);
        a.post(Message::Readiness { body: true });

        let got = b_sub
            .wait_for(Duration::from_millis(200), |m| matches!(m, Message::Readiness { .. }))
            .await;
        assert_eq!(got, Some(Message::Readiness { body: true }));
    }

    #[test]
    fn test_post_without_listeners_is_silent() {
        let bus = BroadcastBus::new(4);
        bus.channel("idle").post(Message::ClientsList);
    }
}
