//! WebSocket listener and socket plumbing using tokio-tungstenite.
//!
//! Each accepted socket is split: a writer task owns the sink and drains an
//! `Outgoing` queue, while the session loop owns the stream and reads frames
//! in arrival order.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use stagehand_core::{encode, Envelope, StageError, StageResult};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};

pub type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
pub type WsStream = SplitStream<WebSocketStream<TcpStream>>;

/// Maximum inbound text frame size (1 MiB).
pub const MAX_WS_FRAME_SIZE: usize = 1_048_576;

/// Outbound queue capacity per connection.
pub const OUTBOUND_QUEUE: usize = 256;

/// A handle to an accepted WebSocket connection.
pub struct WebSocketConnection {
    pub ws_stream: WebSocketStream<TcpStream>,
    pub remote_addr: SocketAddr,
}

/// Items the writer task puts on the wire.
#[derive(Debug, Clone)]
pub enum Outgoing {
    Message(Envelope),
    Ping,
    Close { code: CloseCode, reason: String },
}

/// What the session loop sees when it reads the socket.
#[derive(Debug)]
pub enum Frame {
    Text(String),
    /// Any non-text activity (pong, ping, binary) that proves liveness.
    Activity,
    /// A frame the protocol does not accept.
    Rejected(StageError),
    Closed,
}

/// Bind the listener and start accepting.
///
/// Returns the bound address (useful with port 0) and a receiver yielding
/// upgraded connections.
pub async fn start_listener(
    bind_addr: SocketAddr,
) -> StageResult<(SocketAddr, mpsc::Receiver<WebSocketConnection>)> {
    let tcp_listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| StageError::Transport(format!("WS bind failed: {e}")))?;
    let local_addr = tcp_listener.local_addr()?;

    info!(addr = %local_addr, "WebSocket listener started");

    let (tx, rx) = mpsc::channel::<WebSocketConnection>(64);

    tokio::spawn(async move {
        loop {
            match tcp_listener.accept().await {
                Ok((stream, addr)) => {
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        match tokio_tungstenite::accept_async(stream).await {
                            Ok(ws_stream) => {
                                debug!(remote = %addr, "WebSocket connection accepted");
                                let conn = WebSocketConnection {
                                    ws_stream,
                                    remote_addr: addr,
                                };
                                if tx.send(conn).await.is_err() {
                                    warn!("WebSocket connection channel closed");
                                }
                            }
                            Err(e) => {
                                warn!(remote = %addr, error = %e, "WebSocket handshake failed");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "TCP accept failed");
                }
            }
            if tx.is_closed() {
                debug!("accept loop stopping, no receiver");
                break;
            }
        }
    });

    Ok((local_addr, rx))
}

/// Spawn the writer task for one connection.
///
/// The task ends after a close frame, when the queue's senders are all
/// dropped, or on the first write failure.
pub fn spawn_writer(
    mut sink: WsSink,
    mut rx: mpsc::Receiver<Outgoing>,
    remote: SocketAddr,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            let (frame, closing) = match item {
                Outgoing::Message(envelope) => match encode(&envelope) {
                    Ok(text) => (Message::text(text), false),
                    Err(e) => {
                        error!(remote = %remote, error = %e, "failed to encode outbound message");
                        continue;
                    }
                },
                Outgoing::Ping => (Message::Ping(Vec::new().into()), false),
                Outgoing::Close { code, reason } => (
                    Message::Close(Some(CloseFrame {
                        code,
                        reason: reason.into(),
                    })),
                    true,
                ),
            };
            if let Err(e) = sink.send(frame).await {
                debug!(remote = %remote, error = %e, "WS send failed, writer stopping");
                break;
            }
            if closing {
                break;
            }
        }
        let _ = sink.close().await;
    })
}

/// Read the next frame and classify it.
pub async fn recv_next(stream: &mut WsStream) -> Frame {
    match stream.next().await {
        Some(Ok(Message::Text(text))) => {
            if text.len() > MAX_WS_FRAME_SIZE {
                return Frame::Rejected(StageError::InvalidMessage(format!(
                    "WS frame too large: {} bytes (max {})",
                    text.len(),
                    MAX_WS_FRAME_SIZE
                )));
            }
            Frame::Text(text.to_string())
        }
        Some(Ok(Message::Binary(_))) => Frame::Rejected(StageError::InvalidMessage(
            "binary frames are not supported".into(),
        )),
        Some(Ok(Message::Close(_))) => Frame::Closed,
        // tungstenite answers pings itself; both directions count as activity.
        Some(Ok(_)) => Frame::Activity,
        Some(Err(e)) => {
            debug!(error = %e, "WS recv failed");
            Frame::Closed
        }
        None => Frame::Closed,
    }
}
