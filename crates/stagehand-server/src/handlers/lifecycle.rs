//! Session-level actions: steady-state `register` and the `pong` heartbeat.

use crate::context::AppContext;
use crate::dispatch::{Access, HandlerTable};
use crate::session::{Connection, Registration};
use stagehand_core::messages::RegisterRequest;
use stagehand_core::{parse_request, ClientRole, Inbound, ServerMessage, StageError, StageResult};
use std::sync::Arc;
use tracing::warn;

pub fn handlers() -> HandlerTable {
    let mut table = HandlerTable::new();
    table.register("register", Access::Any, register);
    table.register("pong", Access::Any, pong);
    table
}

/// A second `register` after the handshake never moves a connection.
async fn register(ctx: Arc<AppContext>, conn: Connection, msg: Inbound) -> StageResult<()> {
    let req: RegisterRequest = parse_request(&msg.body)?;
    let role: ClientRole = req
        .client_type
        .unwrap_or_default()
        .parse()
        .map_err(|e: StageError| e.tagged("registration_invalid_type"))?;

    match ctx.registry.register(&conn, role).await {
        Registration::Registered | Registration::AlreadyRegistered => {
            conn.send(ServerMessage::warning(
                format!("Already registered as {role}"),
                Some("register"),
                "re_registration",
            ))
            .await
        }
        Registration::RoleConflict { existing } => {
            warn!(conn_id = conn.id(), existing = %existing, requested = %role, "role change refused");
            conn.send(ServerMessage::error(
                format!("Connection is registered as {existing}; cannot switch to {role}"),
                Some("register"),
                "role_conflict",
            ))
            .await
        }
    }
}

async fn pong(_ctx: Arc<AppContext>, _conn: Connection, _msg: Inbound) -> StageResult<()> {
    Ok(())
}
