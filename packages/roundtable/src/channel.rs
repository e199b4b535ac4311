//! The session channel: one WebSocket carrying all room traffic.
//!
//! [`connect`] opens the socket and spawns a transport task that owns both
//! halves of the stream. Inbound frames are decoded and delivered through a
//! single notice queue in arrival order; outbound envelopes go through a
//! bounded queue on the returned handle. When the transport dies, for any
//! reason, it reports one final [`ChannelNotice::Disconnected`] and stops.
//! Reconnecting is the consumer's decision, never the transport's.

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite};
use tracing::{debug, warn};

use agent_wire::{ClientEvent, ServerEvent};

use crate::error::{ProtocolError, TransportError};

const OUTBOUND_QUEUE: usize = 64;

/// Connection lifecycle of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// What the transport task reports, in arrival order.
#[derive(Debug)]
pub enum ChannelNotice {
    Connected,
    Disconnected { reason: Option<String> },
    Event(ServerEvent),
}

#[derive(Debug)]
pub(crate) enum OutboundFrame {
    Event(ClientEvent),
    Close,
}

/// Handle to a live channel. Cheap to clone; dropping it does not close the
/// socket, [`ChannelHandle::close`] does.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    outbound: mpsc::Sender<OutboundFrame>,
    state: watch::Receiver<ConnectionState>,
}

impl ChannelHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Queue an event for sending. Silently dropped (with a log line) when
    /// the channel is down or the queue is full; emitting never fails.
    pub fn emit(&self, event: ClientEvent) {
        if !self.is_connected() {
            debug!("dropping outbound event, channel is not connected");
            return;
        }
        if let Err(err) = self.outbound.try_send(OutboundFrame::Event(event)) {
            warn!("dropping outbound event: {err}");
        }
    }

    /// Ask the transport to close the socket. Safe in any state.
    pub fn close(&self) {
        let _ = self.outbound.try_send(OutboundFrame::Close);
    }

    #[cfg(test)]
    pub(crate) fn fake(
        connected: bool,
    ) -> (Self, mpsc::Receiver<OutboundFrame>, watch::Sender<ConnectionState>) {
        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE);
        let state = if connected {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        };
        let (state_tx, state_rx) = watch::channel(state);
        (
            Self {
                outbound,
                state: state_rx,
            },
            outbound_rx,
            state_tx,
        )
    }
}

/// Open the channel and spawn its transport task.
///
/// Fails fast with [`TransportError::MissingCredential`] before touching the
/// network when no token is configured. Notices are delivered through
/// `notices`; the consumer is expected to drain them from a single task so
/// arrival order is preserved.
pub async fn connect(
    ws_url: &str,
    token: &str,
    notices: mpsc::Sender<ChannelNotice>,
) -> Result<ChannelHandle, TransportError> {
    if token.trim().is_empty() {
        return Err(TransportError::MissingCredential);
    }

    let (ws_stream, _) = tokio_tungstenite::connect_async(ws_url)
        .await
        .map_err(TransportError::from_tungstenite)?;
    debug!(%ws_url, "session channel connected");

    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE);
    let (state_tx, state_rx) = watch::channel(ConnectionState::Connected);
    let _ = notices.send(ChannelNotice::Connected).await;

    tokio::spawn(run_transport(ws_stream, outbound_rx, state_tx, notices));

    Ok(ChannelHandle {
        outbound: outbound_tx,
        state: state_rx,
    })
}

fn decode_frame(text: &str) -> Result<ServerEvent, ProtocolError> {
    serde_json::from_str(text).map_err(ProtocolError::from)
}

async fn run_transport(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut outbound_rx: mpsc::Receiver<OutboundFrame>,
    state_tx: watch::Sender<ConnectionState>,
    notices: mpsc::Sender<ChannelNotice>,
) {
    let (mut ws_write, mut ws_read) = ws_stream.split();

    let reason = loop {
        tokio::select! {
            frame = outbound_rx.recv() => match frame {
                Some(OutboundFrame::Event(event)) => {
                    let json = match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(err) => {
                            warn!("failed to encode outbound event: {err}");
                            continue;
                        }
                    };
                    if let Err(err) = ws_write.send(tungstenite::Message::Text(json.into())).await {
                        break Some(err.to_string());
                    }
                }
                Some(OutboundFrame::Close) | None => {
                    let _ = ws_write.send(tungstenite::Message::Close(None)).await;
                    break None;
                }
            },
            msg = ws_read.next() => match msg {
                Some(Ok(tungstenite::Message::Text(text))) => {
                    match decode_frame(&text) {
                        Ok(event) => {
                            if notices.send(ChannelNotice::Event(event)).await.is_err() {
                                // Consumer is gone, nothing left to do.
                                break None;
                            }
                        }
                        // One bad payload must not take down the stream.
                        Err(err) => debug!("dropping inbound frame: {err}"),
                    }
                }
                Some(Ok(tungstenite::Message::Close(_))) | None => {
                    break Some("closed by server".to_string());
                }
                Some(Ok(_)) => {} // ping/pong/binary
                Some(Err(err)) => break Some(err.to_string()),
            },
        }
    };

    let _ = state_tx.send(ConnectionState::Disconnected);
    let _ = notices.send(ChannelNotice::Disconnected { reason }).await;
    debug!("session channel transport finished");
}
