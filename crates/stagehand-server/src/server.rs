//! Server runtime: listeners, the accept loop and the per-connection
//! session loop.

use crate::config::ServerConfig;
use crate::content::StoreHandle;
use crate::context::AppContext;
use crate::dispatch::handshake::{complete_handshake, reject, Rejection};
use crate::dispatch::Dispatcher;
use crate::handlers::build_handler_table;
use crate::http;
use crate::session::Connection;
use crate::transport::websocket::{
    recv_next, spawn_writer, start_listener, Frame, WebSocketConnection, WsStream, OUTBOUND_QUEUE,
};
use futures_util::StreamExt;
use stagehand_core::{ClientRole, ServerMessage, StageError, StageResult};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, info, warn};

/// How long shutdown waits for sessions to flush their close frames.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

pub struct StageServer {
    ctx: Arc<AppContext>,
    dispatcher: Arc<Dispatcher>,
    shutdown_tx: broadcast::Sender<()>,
    next_conn_id: Arc<AtomicU64>,
}

/// A started server. Dropping it leaves the tasks running; call
/// [`RunningServer::shutdown`] to stop them.
pub struct RunningServer {
    ws_addr: SocketAddr,
    http_addr: Option<SocketAddr>,
    shutdown_tx: broadcast::Sender<()>,
    accept_task: JoinHandle<()>,
}

impl RunningServer {
    pub fn ws_addr(&self) -> SocketAddr {
        self.ws_addr
    }

    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.http_addr
    }

    /// Close every connection normally, cancel live flows and wait for the
    /// accept loop to drain.
    pub async fn shutdown(self) {
        info!("broadcasting shutdown to connected clients");
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.accept_task.await {
            warn!(error = %e, "accept loop ended abnormally");
        }
    }
}

fn socket_addr(host: &str, port: u16) -> StageResult<SocketAddr> {
    format!("{host}:{port}")
        .parse()
        .map_err(|e| StageError::Other(format!("invalid address {host}:{port}: {e}")))
}

impl StageServer {
    pub fn new(config: ServerConfig, store: StoreHandle) -> Self {
        let ctx = AppContext::new(config, store);
        let dispatcher = Arc::new(Dispatcher::new(ctx.clone(), build_handler_table()));
        Self {
            ctx,
            dispatcher,
            shutdown_tx: broadcast::channel(1).0,
            next_conn_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Bind the listeners and spawn the accept loop.
    pub async fn start(self) -> StageResult<RunningServer> {
        let config = &self.ctx.config;
        let ws_bind = socket_addr(&config.host, config.ws_port)?;
        let (ws_addr, ws_rx) = start_listener(ws_bind).await?;

        let http_addr = if config.enable_http {
            self.start_http(socket_addr(&config.host, config.http_port)?)
                .await
        } else {
            None
        };

        let (controllers, viewers) = self.ctx.registry.counts().await;
        info!(
            ws = %ws_addr,
            http = ?http_addr,
            store = self.ctx.content.handle().status(),
            scripts = %self.ctx.scripts.root().display(),
            controllers,
            viewers,
            "stagehand server ready"
        );

        let shutdown_tx = self.shutdown_tx.clone();
        let accept_task = tokio::spawn(self.accept_loop(ws_rx));
        Ok(RunningServer {
            ws_addr,
            http_addr,
            shutdown_tx,
            accept_task,
        })
    }

    /// The HTTP API is auxiliary: a bind failure is logged, not fatal.
    async fn start_http(&self, addr: SocketAddr) -> Option<SocketAddr> {
        let listener = match TcpListener::bind(addr).await {
            Ok(l) => l,
            Err(e) => {
                warn!(addr = %addr, error = %e, "http api disabled, bind failed");
                return None;
            }
        };
        let local = listener.local_addr().ok();
        let view = self.ctx.read_only();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            let stop = async move {
                let _ = shutdown_rx.recv().await;
            };
            if let Err(e) = http::serve(listener, view, stop).await {
                warn!(error = %e, "http api stopped");
            }
        });
        local
    }

    async fn accept_loop(self, mut ws_rx: mpsc::Receiver<WebSocketConnection>) {
        let server = Arc::new(self);
        let mut shutdown_rx = server.shutdown_tx.subscribe();
        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!("accept loop stopping");
                    break;
                }
                incoming = ws_rx.recv() => {
                    let Some(ws_conn) = incoming else {
                        info!("listener closed, shutting down");
                        break;
                    };
                    let srv = server.clone();
                    sessions.spawn(async move { srv.handle_connection(ws_conn).await });
                }
                Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
            }
        }

        server.ctx.slots.cancel_all().await;
        let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
            while sessions.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(remaining = sessions.len(), "sessions still open after shutdown, aborting");
            sessions.abort_all();
        }
        info!("stagehand server stopped");
    }

    async fn handle_connection(&self, ws_conn: WebSocketConnection) {
        let remote = ws_conn.remote_addr;
        let id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        // Subscribe before the handshake so a shutdown during it is seen.
        let shutdown_rx = self.shutdown_tx.subscribe();

        let (sink, mut stream) = ws_conn.ws_stream.split();
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);
        let writer = spawn_writer(sink, rx, remote);
        let conn = Connection::new(id, remote, tx);
        conn.touch();
        debug!(conn_id = id, remote = %remote, "connection opened");

        if let Some(role) = self.await_registration(&conn, &mut stream).await {
            self.session_loop(&conn, role, &mut stream, shutdown_rx).await;
        }

        let role = self.ctx.registry.unregister(&conn).await;
        release(conn, writer).await;
        info!(conn_id = id, remote = %remote, role = ?role, "connection closed");
    }

    async fn await_registration(&self, conn: &Connection, stream: &mut WsStream) -> Option<ClientRole> {
        let first = async {
            loop {
                match recv_next(stream).await {
                    Frame::Activity => conn.touch(),
                    other => return other,
                }
            }
        };
        match tokio::time::timeout(self.ctx.config.register_timeout, first).await {
            Err(_) => {
                reject(conn, &Rejection::timeout()).await;
                None
            }
            Ok(Frame::Text(text)) => {
                conn.touch();
                complete_handshake(&self.ctx, conn, &text).await.ok()
            }
            Ok(Frame::Rejected(e)) => {
                debug!(conn_id = conn.id(), error = %e, "unusable first frame");
                reject(conn, &Rejection::non_text()).await;
                None
            }
            Ok(Frame::Closed) | Ok(Frame::Activity) => None,
        }
    }

    /// Steady state: frames are handled one at a time, in arrival order.
    async fn session_loop(
        &self,
        conn: &Connection,
        role: ClientRole,
        stream: &mut WsStream,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let config = &self.ctx.config;
        let mut heartbeat = tokio::time::interval(config.ping_interval);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    conn.close(CloseCode::Normal, "Server shutting down").await;
                    break;
                }
                _ = heartbeat.tick() => {
                    if conn.idle_for() > config.ping_timeout {
                        info!(conn_id = conn.id(), role = %role, "no activity, closing");
                        conn.close(CloseCode::Away, "Ping timeout").await;
                        break;
                    }
                    if conn.ping().await.is_err() {
                        break;
                    }
                }
                frame = recv_next(stream) => match frame {
                    Frame::Text(text) => {
                        conn.touch();
                        self.dispatcher.dispatch(conn, &text).await;
                    }
                    Frame::Activity => conn.touch(),
                    Frame::Rejected(e) => {
                        conn.touch();
                        warn!(conn_id = conn.id(), error = %e, "frame rejected");
                        conn.notify(ServerMessage::error(e.to_string(), None, "invalid_frame"))
                            .await;
                    }
                    Frame::Closed => {
                        debug!(conn_id = conn.id(), "peer closed");
                        break;
                    }
                },
            }
        }
    }
}

/// Queue a final close and give the writer a bounded window to flush it.
///
/// Flows may still hold clones of `conn`, and a stalled peer may never drain
/// the socket, so a writer that outlives the window is aborted.
async fn release(conn: Connection, mut writer: JoinHandle<()>) {
    let id = conn.id();
    // No-op if the writer already sent a close or lost the socket.
    conn.close(CloseCode::Normal, "").await;
    drop(conn);
    if tokio::time::timeout(DRAIN_TIMEOUT, &mut writer).await.is_err() {
        debug!(conn_id = id, "writer stalled at disconnect, aborting");
        writer.abort();
    }
}
