//! Channel primitives shared by plugin runtimes, the display host and the
//! API client.
//!
//! A channel is an ordered, reliable, message-framed duplex connection. The
//! sending half is a [`ChannelHandle`]; inbound traffic is delivered to a
//! [`ChannelHandler`], usually an [`EventForwarder`] that turns it into a
//! stream of [`ChannelEvent`]s for a single consumer task.
//!
//! Transports publish their connect function into [`CONNECT_REGISTRY`], so
//! the runtime can open channels without depending on a concrete transport.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use linkme::distributed_slice;
use tokio::sync::{mpsc, watch};
use tracing::{trace, warn};

use crate::error::{TransportError, TransportResult};

// =============================================================================
// Channel Handle
// =============================================================================

/// Sending half of a channel.
///
/// Cloning is cheap; all clones share the same outbound queue and close flag.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    /// Channel (sub-protocol) name.
    name: String,
    /// Sender for outgoing text frames.
    message_tx: mpsc::Sender<String>,
    /// Close signal observed by the transport loop and by channel owners.
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl ChannelHandle {
    /// Creates a new channel handle.
    pub fn new(
        name: impl Into<String>,
        message_tx: mpsc::Sender<String>,
        shutdown_tx: watch::Sender<bool>,
    ) -> Self {
        Self {
            name: name.into(),
            message_tx,
            shutdown_tx: Arc::new(shutdown_tx),
        }
    }

    /// Creates an in-process channel and returns the handle together with
    /// the receiver that observes everything sent through it.
    pub fn pair(name: impl Into<String>, buffer: usize) -> (Self, mpsc::Receiver<String>) {
        let (message_tx, message_rx) = mpsc::channel(buffer.max(1));
        let (shutdown_tx, _) = watch::channel(false);
        (Self::new(name, message_tx, shutdown_tx), message_rx)
    }

    /// Returns the channel name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sends a text frame through this channel.
    pub async fn send(&self, text: impl Into<String>) -> TransportResult<()> {
        if self.is_closed() {
            return Err(TransportError::ConnectionClosed {
                reason: format!("channel '{}' is closed", self.name),
            });
        }
        let text = text.into();
        trace!(channel = %self.name, len = text.len(), "Sending frame");
        self.message_tx
            .send(text)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    /// Closes this channel. Idempotent.
    pub fn close(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Returns whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Subscribes to the close flag.
    pub fn subscribe_close(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }
}

// =============================================================================
// Inbound Events
// =============================================================================

/// Something that happened on the receiving side of a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A text frame arrived.
    Message(String),
    /// The peer went away.
    Disconnected,
}

/// Receives inbound traffic from a transport.
#[async_trait]
pub trait ChannelHandler: Send + Sync {
    /// Called for every inbound text frame.
    async fn on_message(&self, channel: &str, text: String);

    /// Called once when the connection is gone.
    async fn on_disconnect(&self, channel: &str);
}

/// [`ChannelHandler`] that forwards everything into an mpsc queue.
#[derive(Debug, Clone)]
pub struct EventForwarder {
    events_tx: mpsc::Sender<ChannelEvent>,
}

impl EventForwarder {
    /// Creates a forwarder and the receiver it feeds.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<ChannelEvent>) {
        let (events_tx, events_rx) = mpsc::channel(buffer.max(1));
        (Self { events_tx }, events_rx)
    }
}

#[async_trait]
impl ChannelHandler for EventForwarder {
    async fn on_message(&self, channel: &str, text: String) {
        if self.events_tx.send(ChannelEvent::Message(text)).await.is_err() {
            trace!(channel = %channel, "Dropping frame, consumer is gone");
        }
    }

    async fn on_disconnect(&self, channel: &str) {
        let _ = self.events_tx.send(ChannelEvent::Disconnected).await;
        trace!(channel = %channel, "Forwarded disconnect");
    }
}

// =============================================================================
// Connector Registry
// =============================================================================

/// Parameters for opening a channel.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Endpoint URL.
    pub url: String,
    /// Sub-protocol (channel name) requested during the handshake.
    pub protocol: String,
    /// Capacity of the outbound queue.
    pub outbound_buffer: usize,
}

impl ChannelConfig {
    /// Creates a channel config with the default outbound buffer.
    pub fn new(url: impl Into<String>, protocol: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            protocol: protocol.into(),
            outbound_buffer: 256,
        }
    }

    /// Sets the outbound queue capacity.
    pub fn with_outbound_buffer(mut self, buffer: usize) -> Self {
        self.outbound_buffer = buffer;
        self
    }
}

/// Function pointer that opens a channel and starts pumping its frames into
/// the given handler.
pub type ConnectFn =
    fn(ChannelConfig, Arc<dyn ChannelHandler>) -> BoxFuture<'static, TransportResult<ChannelHandle>>;

/// Registry of connect functions contributed by transport crates.
#[distributed_slice]
pub static CONNECT_REGISTRY: [ConnectFn];

/// Returns the registered connect function, if any transport provides one.
///
/// If several transports register, a warning is emitted and the first wins.
pub fn registered_connector() -> Option<ConnectFn> {
    match CONNECT_REGISTRY.len() {
        0 => None,
        1 => Some(CONNECT_REGISTRY[0]),
        n => {
            warn!(count = n, "Multiple channel connectors registered, using first");
            Some(CONNECT_REGISTRY[0])
        }
    }
}
