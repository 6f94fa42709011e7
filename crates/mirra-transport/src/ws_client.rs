//! WebSocket channel connector.
//!
//! Opens a client connection that requests `config.protocol` as its
//! sub-protocol, then pumps frames between the socket and the channel's
//! outbound queue until either side closes. Channel loss is reported to the
//! handler once; reconnecting is left to whoever owns the channel.

use std::sync::Arc;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};

use mirra_core::{ChannelConfig, ChannelHandle, ChannelHandler, TransportError, TransportResult};
use mirra_macros::register_connector;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

const SUB_PROTOCOL_HEADER: &str = "Sec-WebSocket-Protocol";

/// State of one pumped connection.
struct ClientLoopState {
    handler: Arc<dyn ChannelHandler>,
    channel: String,
    ws_tx: WsSink,
    ws_rx: WsSource,
}

impl ClientLoopState {
    fn new(handler: Arc<dyn ChannelHandler>, channel: String, ws_stream: WsStream) -> Self {
        let (ws_tx, ws_rx) = ws_stream.split();
        Self {
            handler,
            channel,
            ws_tx,
            ws_rx,
        }
    }

    /// Handles one inbound item. Returns false once the connection is gone.
    async fn handle_frame(&mut self, msg: Option<Result<Message, Error>>) -> bool {
        match msg {
            Some(Ok(Message::Text(text))) => {
                trace!(channel = %self.channel, len = text.len(), "Received text");
                self.handler
                    .on_message(&self.channel, text.as_str().to_owned())
                    .await;
                true
            }
            Some(Ok(Message::Binary(data))) => {
                trace!(channel = %self.channel, len = data.len(), "Received binary");
                let text = String::from_utf8_lossy(&data).into_owned();
                self.handler.on_message(&self.channel, text).await;
                true
            }
            Some(Ok(Message::Ping(data))) => {
                trace!(channel = %self.channel, "Received ping, sending pong");
                let _ = self.ws_tx.send(Message::Pong(data)).await;
                true
            }
            Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => true,
            Some(Ok(Message::Close(_))) => {
                info!(channel = %self.channel, "Server closed connection");
                false
            }
            Some(Err(e)) => {
                warn!(channel = %self.channel, error = %e, "WebSocket error");
                false
            }
            None => {
                info!(channel = %self.channel, "WebSocket stream ended");
                false
            }
        }
    }
}

fn build_request(
    config: &ChannelConfig,
) -> TransportResult<tokio_tungstenite::tungstenite::handshake::client::Request> {
    let mut request = config.url.as_str().into_client_request().map_err(|e| {
        TransportError::InvalidConfig(format!("invalid url '{}': {e}", config.url))
    })?;

    if !config.protocol.is_empty() {
        let value = HeaderValue::from_str(&config.protocol).map_err(|e| {
            TransportError::InvalidConfig(format!("invalid protocol '{}': {e}", config.protocol))
        })?;
        request.headers_mut().insert(SUB_PROTOCOL_HEADER, value);
    }

    Ok(request)
}

/// Connects a channel over WebSocket.
///
/// The returned handle is named after the requested sub-protocol. Frames
/// queued on it are sent as text; inbound text and binary frames go to
/// `handler`, followed by exactly one `on_disconnect`.
#[register_connector]
pub async fn ws_connect(
    config: ChannelConfig,
    handler: Arc<dyn ChannelHandler>,
) -> TransportResult<ChannelHandle> {
    let request = build_request(&config)?;

    info!(url = %config.url, protocol = %config.protocol, "Connecting to WebSocket server");

    let (ws_stream, _response) =
        connect_async(request)
            .await
            .map_err(|e| TransportError::ConnectionFailed {
                url: config.url.clone(),
                reason: format!("WebSocket connection failed: {e}"),
            })?;

    let (message_tx, mut message_rx) = mpsc::channel::<String>(config.outbound_buffer.max(1));
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let handle = ChannelHandle::new(config.protocol.clone(), message_tx, shutdown_tx);

    info!(channel = %config.protocol, url = %config.url, "WebSocket channel connected");

    let mut state = ClientLoopState::new(handler, config.protocol, ws_stream);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        debug!(channel = %state.channel, "WebSocket channel shutting down");
                        let _ = state.ws_tx.close().await;
                        break;
                    }
                }

                outbound = message_rx.recv() => {
                    let Some(text) = outbound else {
                        let _ = state.ws_tx.close().await;
                        break;
                    };
                    if let Err(e) = state.ws_tx.send(Message::text(text)).await {
                        warn!(channel = %state.channel, error = %e, "Failed to send frame");
                    }
                }

                msg = state.ws_rx.next() => {
                    if !state.handle_frame(msg).await {
                        break;
                    }
                }
            }
        }

        state.handler.on_disconnect(&state.channel).await;
    });

    Ok(handle)
}
