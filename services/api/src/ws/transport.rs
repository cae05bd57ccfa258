//! Frame-level transport abstraction over both sides of the bridge.
//!
//! The relay only cares about two frame kinds: opaque binary audio and
//! structured text envelopes. Wrapping the axum client socket and the
//! tungstenite upstream socket behind the same pair of traits keeps the
//! forwarding loops identical in both directions and lets tests drive them
//! with in-memory pipes instead of real sockets.

use async_trait::async_trait;
use axum::extract::ws::{Message as ClientMessage, WebSocket};
use bytes::Bytes;
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, tungstenite::protocol::Message as UpstreamMessage,
};

/// A single relayed frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Opaque audio payload, forwarded byte-for-byte.
    Binary(Bytes),
    /// A structured control envelope, forwarded subject to classification.
    Text(String),
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("receive failed: {0}")]
    Recv(String),
    #[error("send failed: {0}")]
    Send(String),
}

/// The read half of a relayed connection. `None` means the peer closed.
#[async_trait]
pub trait FrameStream: Send {
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>>;
}

/// The write half of a relayed connection. `close` is infallible and
/// idempotent; the underlying socket error on close is irrelevant to the
/// relay, which is already tearing down.
#[async_trait]
pub trait FrameSink: Send {
    async fn send_frame(&mut self, frame: Frame) -> Result<(), TransportError>;
    async fn close(&mut self);
}

/// Exclusive ownership of one upstream backend connection.
///
/// Lives inside a `SessionRecord` until the relay attaches (which takes the
/// halves apart) or the lifecycle manager tears the session down unattached.
pub struct UpstreamHandle {
    pub stream: Box<dyn FrameStream>,
    pub sink: Box<dyn FrameSink>,
}

impl UpstreamHandle {
    /// Closes the connection. Used only for sessions that never attached;
    /// an attached session's halves are closed by the relay pumps.
    pub async fn close(mut self) {
        self.sink.close().await;
    }
}

// --- Client (axum) socket adapters ---

pub struct ClientFrameStream {
    inner: SplitStream<WebSocket>,
}

pub struct ClientFrameSink {
    inner: SplitSink<WebSocket, ClientMessage>,
}

/// Splits an upgraded client WebSocket into relay halves.
pub fn split_client(socket: WebSocket) -> (ClientFrameStream, ClientFrameSink) {
    let (sink, stream) = socket.split();
    (
        ClientFrameStream { inner: stream },
        ClientFrameSink { inner: sink },
    )
}

#[async_trait]
impl FrameStream for ClientFrameStream {
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>> {
        while let Some(msg) = self.inner.next().await {
            match msg {
                Ok(ClientMessage::Binary(data)) => return Some(Ok(Frame::Binary(data))),
                Ok(ClientMessage::Text(text)) => {
                    return Some(Ok(Frame::Text(text.as_str().to_owned())));
                }
                Ok(ClientMessage::Close(_)) => return None,
                // Pings and pongs are transport chatter, not session frames.
                Ok(ClientMessage::Ping(_)) | Ok(ClientMessage::Pong(_)) => continue,
                Err(err) => return Some(Err(TransportError::Recv(err.to_string()))),
            }
        }
        None
    }
}

#[async_trait]
impl FrameSink for ClientFrameSink {
    async fn send_frame(&mut self, frame: Frame) -> Result<(), TransportError> {
        let msg = match frame {
            Frame::Binary(data) => ClientMessage::Binary(data),
            Frame::Text(text) => ClientMessage::Text(text.into()),
        };
        self.inner
            .send(msg)
            .await
            .map_err(|err| TransportError::Send(err.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.inner.close().await;
    }
}

// --- Upstream (tungstenite) socket adapters ---

type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct UpstreamFrameStream {
    inner: SplitStream<UpstreamSocket>,
}

pub struct UpstreamFrameSink {
    inner: SplitSink<UpstreamSocket, UpstreamMessage>,
}

/// Wraps a freshly dialed upstream socket into an [`UpstreamHandle`].
pub fn wrap_upstream(socket: UpstreamSocket) -> UpstreamHandle {
    let (sink, stream) = socket.split();
    UpstreamHandle {
        stream: Box::new(UpstreamFrameStream { inner: stream }),
        sink: Box::new(UpstreamFrameSink { inner: sink }),
    }
}

#[async_trait]
impl FrameStream for UpstreamFrameStream {
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>> {
        while let Some(msg) = self.inner.next().await {
            match msg {
                Ok(UpstreamMessage::Binary(data)) => return Some(Ok(Frame::Binary(data))),
                Ok(UpstreamMessage::Text(text)) => {
                    return Some(Ok(Frame::Text(text.as_str().to_owned())));
                }
                Ok(UpstreamMessage::Close(_)) => return None,
                Ok(_) => continue,
                Err(err) => return Some(Err(TransportError::Recv(err.to_string()))),
            }
        }
        None
    }
}

#[async_trait]
impl FrameSink for UpstreamFrameSink {
    async fn send_frame(&mut self, frame: Frame) -> Result<(), TransportError> {
        let msg = match frame {
            Frame::Binary(data) => UpstreamMessage::Binary(data),
            Frame::Text(text) => UpstreamMessage::Text(text.into()),
        };
        self.inner
            .send(msg)
            .await
            .map_err(|err| TransportError::Send(err.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.inner.close().await;
    }
}

/// In-memory transports used by the relay and lifecycle tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };
    use tokio::sync::mpsc;

    pub struct PipeStream {
        rx: mpsc::UnboundedReceiver<Frame>,
    }

    pub struct PipeSink {
        tx: Option<mpsc::UnboundedSender<Frame>>,
        closes: Arc<AtomicUsize>,
    }

    /// Frames pushed into the sender come out of the `PipeStream`; dropping
    /// the sender reads as the peer closing the connection.
    pub fn inbound() -> (mpsc::UnboundedSender<Frame>, PipeStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, PipeStream { rx })
    }

    /// Frames written to the `PipeSink` arrive on the receiver; closing the
    /// sink ends the receiver. The counter records `close` calls.
    pub fn outbound() -> (PipeSink, mpsc::UnboundedReceiver<Frame>, Arc<AtomicUsize>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let closes = Arc::new(AtomicUsize::new(0));
        (
            PipeSink {
                tx: Some(tx),
                closes: closes.clone(),
            },
            rx,
            closes,
        )
    }

    #[async_trait]
    impl FrameStream for PipeStream {
        async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>> {
            self.rx.recv().await.map(Ok)
        }
    }

    #[async_trait]
    impl FrameSink for PipeSink {
        async fn send_frame(&mut self, frame: Frame) -> Result<(), TransportError> {
            match &self.tx {
                Some(tx) => tx
                    .send(frame)
                    .map_err(|_| TransportError::Send("pipe closed".into())),
                None => Err(TransportError::Send("pipe closed".into())),
            }
        }

        async fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
            self.tx = None;
        }
    }

    /// The test-visible far end of a piped upstream connection.
    pub struct UpstreamPeer {
        /// Feeds frames that the relay will read as coming from upstream.
        pub to_relay: mpsc::UnboundedSender<Frame>,
        /// Receives frames the relay forwarded to upstream.
        pub from_relay: mpsc::UnboundedReceiver<Frame>,
        /// Number of times the relay closed the upstream sink.
        pub closes: Arc<AtomicUsize>,
    }

    pub fn upstream_pair() -> (UpstreamHandle, UpstreamPeer) {
        let (to_relay, stream) = inbound();
        let (sink, from_relay, closes) = outbound();
        (
            UpstreamHandle {
                stream: Box::new(stream),
                sink: Box::new(sink),
            },
            UpstreamPeer {
                to_relay,
                from_relay,
                closes,
            },
        )
    }
}
