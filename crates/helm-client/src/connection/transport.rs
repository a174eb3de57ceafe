//! Transport seam: how the manager opens a channel, and the websocket
//! implementation.
//!
//! An open channel is a [`Link`]: a bounded outbound queue, an inbound
//! stream of frames that ends with exactly one [`Inbound::Closed`], and a
//! cancellation token that tears the channel down. The manager never sees
//! transport types, so tests substitute a [`Connector`] backed by plain
//! channels.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::TransportError;

/// Something that arrived on an open channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inbound {
    /// A text frame, forwarded verbatim.
    Frame(String),
    /// The channel is gone. Always the last item.
    Closed(TransportError),
}

/// An open channel.
#[derive(Debug)]
pub struct Link {
    outbound: mpsc::Sender<String>,
    inbound: mpsc::Receiver<Inbound>,
    cancel: CancellationToken,
}

impl Link {
    /// Assemble a link from its parts.
    pub fn new(
        outbound: mpsc::Sender<String>,
        inbound: mpsc::Receiver<Inbound>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            outbound,
            inbound,
            cancel,
        }
    }

    /// Queue a frame without waiting. Returns `false` if the queue is full
    /// or the channel is gone.
    pub fn try_send(&self, frame: String) -> bool {
        match self.outbound.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("outbound queue full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Next inbound item. A link whose pump vanished reads as closed.
    pub async fn recv(&mut self) -> Inbound {
        self.inbound
            .recv()
            .await
            .unwrap_or(Inbound::Closed(TransportError::Closed(None)))
    }

    /// Tear the channel down.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Opens channels to the agent process.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a channel to `url`.
    async fn connect(&self, url: &str) -> Result<Link, TransportError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// WebSocket
// ─────────────────────────────────────────────────────────────────────────────

/// [`Connector`] over `tokio-tungstenite`.
#[derive(Clone, Debug)]
pub struct WsConnector {
    outbound_queue: usize,
    connect_timeout: Duration,
}

impl WsConnector {
    /// Connector whose links buffer up to `outbound_queue` frames and whose
    /// handshakes give up after `connect_timeout`.
    pub fn new(outbound_queue: usize, connect_timeout: Duration) -> Self {
        Self {
            outbound_queue: outbound_queue.max(1),
            connect_timeout,
        }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Link, TransportError> {
        // A peer that accepts TCP but never answers the upgrade must still
        // surface as a failed attempt.
        let (ws, _) = tokio::time::timeout(self.connect_timeout, connect_async(url))
            .await
            .map_err(|_| {
                TransportError::Connect(format!(
                    "handshake timed out after {}ms",
                    self.connect_timeout.as_millis()
                ))
            })?
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let (out_tx, out_rx) = mpsc::channel(self.outbound_queue);
        let (in_tx, in_rx) = mpsc::channel(self.outbound_queue.max(64));
        let cancel = CancellationToken::new();
        drop(tokio::spawn(pump(ws, out_rx, in_tx, cancel.clone())));

        Ok(Link::new(out_tx, in_rx, cancel))
    }
}

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Move frames between the socket and the link until either side ends.
async fn pump(
    ws: WsStream,
    mut out_rx: mpsc::Receiver<String>,
    in_tx: mpsc::Sender<Inbound>,
    cancel: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let closed = loop {
        tokio::select! {
            () = cancel.cancelled() => {
                let _ = ws_tx.close().await;
                debug!("websocket closed locally");
                return;
            }
            frame = out_rx.recv() => {
                let Some(frame) = frame else {
                    let _ = ws_tx.close().await;
                    return;
                };
                if let Err(e) = ws_tx.send(Message::Text(frame.into())).await {
                    break TransportError::Io(e.to_string());
                }
            }
            msg = ws_rx.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => text,
                        Err(_) => {
                            warn!(len = bytes.len(), "dropping non-UTF-8 binary frame");
                            continue;
                        }
                    },
                    Some(Ok(Message::Close(frame))) => {
                        break TransportError::Closed(frame.map(|f| f.reason.as_str().to_owned()));
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => break TransportError::Io(e.to_string()),
                    None => break TransportError::Closed(None),
                };
                if in_tx.send(Inbound::Frame(text)).await.is_err() {
                    return;
                }
            }
        }
    };

    let _ = in_tx.send(Inbound::Closed(closed)).await;
}
