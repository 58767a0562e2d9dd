//! Per-connection handle shared between the session loop, handlers and
//! the fan-out engine.

use crate::transport::websocket::Outgoing;
use stagehand_core::{ClientRole, Envelope, ServerMessage, StageError, StageResult};
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

pub type ConnectionId = u64;

const ROLE_NONE: u8 = 0;
const ROLE_CONTROLLER: u8 = 1;
const ROLE_VIEWER: u8 = 2;

/// How long a status notice may wait on a full outbound queue.
pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a close frame may wait on a full outbound queue.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

struct Inner {
    id: ConnectionId,
    remote: SocketAddr,
    tx: mpsc::Sender<Outgoing>,
    role: AtomicU8,
    opened_at: Instant,
    /// Milliseconds after `opened_at` of the last inbound frame.
    last_activity_ms: AtomicU64,
}

/// Cheap clonable handle to one duplex connection. Equality is by id.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    pub fn new(id: ConnectionId, remote: SocketAddr, tx: mpsc::Sender<Outgoing>) -> Self {
        Self {
            inner: Arc::new(Inner {
                id,
                remote,
                tx,
                role: AtomicU8::new(ROLE_NONE),
                opened_at: Instant::now(),
                last_activity_ms: AtomicU64::new(0),
            }),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    pub fn remote(&self) -> SocketAddr {
        self.inner.remote
    }

    pub fn role(&self) -> Option<ClientRole> {
        match self.inner.role.load(Ordering::Acquire) {
            ROLE_CONTROLLER => Some(ClientRole::Controller),
            ROLE_VIEWER => Some(ClientRole::Viewer),
            _ => None,
        }
    }

    pub(crate) fn set_role(&self, role: Option<ClientRole>) {
        let raw = match role {
            Some(ClientRole::Controller) => ROLE_CONTROLLER,
            Some(ClientRole::Viewer) => ROLE_VIEWER,
            None => ROLE_NONE,
        };
        self.inner.role.store(raw, Ordering::Release);
    }

    /// Record inbound activity now.
    pub fn touch(&self) {
        let ms = self.inner.opened_at.elapsed().as_millis() as u64;
        self.inner.last_activity_ms.store(ms, Ordering::Release);
    }

    /// Time since the last inbound frame.
    pub fn idle_for(&self) -> Duration {
        let last = Duration::from_millis(self.inner.last_activity_ms.load(Ordering::Acquire));
        self.inner.opened_at.elapsed().saturating_sub(last)
    }

    /// False once the writer task has gone away.
    pub fn is_live(&self) -> bool {
        !self.inner.tx.is_closed()
    }

    /// Queue a message for this connection, stamping it first.
    pub async fn send(&self, message: impl Into<Envelope>) -> StageResult<()> {
        self.send_raw(Outgoing::Message(message.into().stamped()))
            .await
    }

    /// Queue a message, failing if the queue stays full past `limit`.
    pub async fn send_within(&self, envelope: Envelope, limit: Duration) -> StageResult<()> {
        match tokio::time::timeout(limit, self.send(envelope)).await {
            Ok(res) => res,
            Err(_) => Err(StageError::Timeout),
        }
    }

    /// Best-effort notice. A peer that left or stopped reading loses it.
    pub async fn notify(&self, message: ServerMessage) {
        if let Err(e) = self.send_within(message.into(), NOTIFY_TIMEOUT).await {
            tracing::debug!(conn_id = self.id(), error = %e, "notify dropped");
        }
    }

    pub async fn ping(&self) -> StageResult<()> {
        self.send_raw(Outgoing::Ping).await
    }

    /// Queue a close frame. Returns false if the queue is gone or stayed
    /// full past [`CLOSE_TIMEOUT`].
    pub async fn close(&self, code: CloseCode, reason: &str) -> bool {
        let item = Outgoing::Close {
            code,
            reason: reason.to_string(),
        };
        match tokio::time::timeout(CLOSE_TIMEOUT, self.send_raw(item)).await {
            Ok(res) => res.is_ok(),
            Err(_) => {
                tracing::debug!(conn_id = self.id(), "close frame dropped, queue full");
                false
            }
        }
    }

    /// Fill the queue with pings until it is full (tests only).
    #[cfg(test)]
    pub fn stall(&self) {
        while self.inner.tx.try_send(Outgoing::Ping).is_ok() {}
    }

    async fn send_raw(&self, item: Outgoing) -> StageResult<()> {
        self.inner
            .tx
            .send(item)
            .await
            .map_err(|_| StageError::Transport(format!("connection {} closed", self.id())))
    }

    /// A connection wired to a plain channel instead of a socket.
    #[cfg(test)]
    pub fn channel_pair(id: ConnectionId) -> (Self, mpsc::Receiver<Outgoing>) {
        let (tx, rx) = mpsc::channel(64);
        let remote: SocketAddr = ([127, 0, 0, 1], 40000 + id as u16).into();
        (Self::new(id, remote, tx), rx)
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Connection {}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id())
            .field("remote", &self.remote())
            .field("role", &self.role())
            .finish()
    }
}

/// Drain everything queued so far as messages (tests only).
#[cfg(test)]
pub fn drain_messages(rx: &mut mpsc::Receiver<Outgoing>) -> Vec<Envelope> {
    let mut out = Vec::new();
    while let Ok(item) = rx.try_recv() {
        if let Outgoing::Message(env) = item {
            out.push(env);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_stamps_and_queues() {
        let (conn, mut rx) = Connection::channel_pair(1);
        conn.send(ServerMessage::ReEnableAutoSendButtons).await.unwrap();
        let msgs = drain_messages(&mut rx);
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].timestamp.is_some());
    }

    #[tokio::test]
    async fn dropped_receiver_means_not_live() {
        let (conn, rx) = Connection::channel_pair(2);
        assert!(conn.is_live());
        drop(rx);
        assert!(!conn.is_live());
        assert!(conn.send(ServerMessage::ReEnableAutoSendButtons).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_clock_resets_on_touch() {
        let (conn, _rx) = Connection::channel_pair(3);
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(conn.idle_for() >= Duration::from_secs(5));
        conn.touch();
        assert!(conn.idle_for() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn notices_and_close_give_up_on_a_full_queue() {
        let (conn, mut rx) = Connection::channel_pair(4);
        conn.stall();

        let start = Instant::now();
        conn.notify(ServerMessage::ReEnableAutoSendButtons).await;
        assert!(start.elapsed() >= NOTIFY_TIMEOUT);

        let start = Instant::now();
        assert!(!conn.close(CloseCode::Normal, "bye").await);
        assert!(start.elapsed() >= CLOSE_TIMEOUT);

        // Nothing but the filler pings made it in.
        assert!(drain_messages(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn close_queues_frame_when_there_is_room() {
        let (conn, mut rx) = Connection::channel_pair(5);
        assert!(conn.close(CloseCode::Away, "Ping timeout").await);
        match rx.try_recv() {
            Ok(Outgoing::Close { code, reason }) => {
                assert_eq!(code, CloseCode::Away);
                assert_eq!(reason, "Ping timeout");
            }
            other => panic!("expected close, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn role_cell_round_trips() {
        let (tx, _rx) = mpsc::channel(1);
        let conn = Connection::new(9, ([127, 0, 0, 1], 1).into(), tx);
        assert_eq!(conn.role(), None);
        conn.set_role(Some(ClientRole::Viewer));
        assert_eq!(conn.role(), Some(ClientRole::Viewer));
    }
}
