//! Per-message dispatch boundary.
//!
//! Decodes a frame, looks up its handler, checks the caller's role and
//! runs the handler. Nothing a handler does, including panicking, escapes
//! this boundary: every failure becomes a typed error reply to the one
//! connection that sent the message.

use super::table::HandlerTable;
use crate::context::AppContext;
use crate::session::Connection;
use futures_util::FutureExt;
use stagehand_core::{decode_inbound, ServerMessage};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, warn};

pub struct Dispatcher {
    ctx: Arc<AppContext>,
    table: HandlerTable,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl Dispatcher {
    pub fn new(ctx: Arc<AppContext>, table: HandlerTable) -> Self {
        Self { ctx, table }
    }

    /// Handle one inbound text frame from a registered connection.
    pub async fn dispatch(&self, conn: &Connection, text: &str) {
        let msg = match decode_inbound(text) {
            Ok(msg) => msg,
            Err(e) => {
                let context = e.context().unwrap_or("json_decode_error");
                warn!(conn_id = conn.id(), remote = %conn.remote(), context, error = %e, "malformed message");
                conn.notify(ServerMessage::error(format!("Invalid message: {e}"), None, context))
                    .await;
                return;
            }
        };

        let action = msg.action.clone();
        let Some(entry) = self.table.get(&action) else {
            warn!(conn_id = conn.id(), action = %action, "unknown action");
            conn.notify(ServerMessage::error(
                format!("Unknown action: {action}"),
                Some(&action),
                "unknown_action",
            ))
            .await;
            return;
        };

        if !entry.access.permits(conn.role()) {
            warn!(conn_id = conn.id(), action = %action, role = ?conn.role(), "action not permitted for role");
            conn.notify(ServerMessage::error(
                format!("Action '{action}' is not available to this client"),
                Some(&action),
                "forbidden_action",
            ))
            .await;
            return;
        }

        debug!(conn_id = conn.id(), action = %action, "dispatching");
        let fut = (entry.handler)(self.ctx.clone(), conn.clone(), msg);
        let failed = match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(())) => false,
            Ok(Err(e)) => {
                let context = e.context().unwrap_or("handler_error").to_string();
                if e.context().is_some() {
                    warn!(conn_id = conn.id(), remote = %conn.remote(), action = %action, context = %context, error = %e, "handler failed");
                } else {
                    error!(conn_id = conn.id(), remote = %conn.remote(), action = %action, error = %e, "handler failed");
                }
                conn.notify(ServerMessage::error(e.to_string(), Some(&action), &context))
                    .await;
                true
            }
            Err(payload) => {
                error!(
                    conn_id = conn.id(),
                    remote = %conn.remote(),
                    action = %action,
                    panic = %panic_message(payload.as_ref()),
                    "handler panicked"
                );
                conn.notify(ServerMessage::error(
                    "Internal error while handling the action",
                    Some(&action),
                    "handler_panic",
                ))
                .await;
                true
            }
        };

        if failed && entry.gated {
            conn.notify(ServerMessage::ReEnableAutoSendButtons).await;
        }
    }
}
