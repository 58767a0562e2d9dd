//! Registration handshake.
//!
//! The first text frame on a new connection must be a `register` action
//! naming a valid client type, and it must arrive within the configured
//! registration timeout. Anything else is answered with an error and a
//! policy close.

use crate::context::AppContext;
use crate::handlers::script::send_initial_sync;
use crate::session::{Connection, Registration};
use stagehand_core::messages::RegisterRequest;
use stagehand_core::{decode_inbound, parse_request, ClientRole, ServerMessage};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{info, warn};

/// Why a connection was turned away before registering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub context: &'static str,
    pub message: String,
    pub close_reason: &'static str,
    pub code: CloseCode,
}

impl Rejection {
    fn policy(context: &'static str, message: impl Into<String>, close_reason: &'static str) -> Self {
        Self {
            context,
            message: message.into(),
            close_reason,
            code: CloseCode::Policy,
        }
    }

    pub fn timeout() -> Self {
        Self::policy(
            "register_timeout",
            "No registration received in time",
            "Registration timeout",
        )
    }

    pub fn non_text() -> Self {
        Self::policy(
            "invalid_first_message",
            "First message must be a JSON text frame",
            "Invalid first message",
        )
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            context: "register_internal_error",
            message: message.into(),
            close_reason: "Internal error",
            code: CloseCode::Error,
        }
    }
}

/// Decide the role a first message asks for, without side effects.
pub fn evaluate_first_message(text: &str) -> Result<ClientRole, Rejection> {
    let msg = decode_inbound(text).map_err(|e| {
        if e.context() == Some("json_decode_error") {
            Rejection::policy("invalid_first_json", format!("Invalid JSON: {e}"), "Invalid first JSON")
        } else {
            Rejection::policy(
                "invalid_first_message",
                "First message must be a register action",
                "Invalid first message",
            )
        }
    })?;

    if msg.action != "register" {
        return Err(Rejection::policy(
            "invalid_first_message",
            format!("First message must be 'register', got '{}'", msg.action),
            "Invalid first message",
        ));
    }

    let req: RegisterRequest = parse_request(&msg.body).map_err(|_| {
        Rejection::policy(
            "registration_invalid_type",
            "Malformed registration payload",
            "Invalid client type",
        )
    })?;
    let raw = req.client_type.unwrap_or_default();
    raw.parse::<ClientRole>().map_err(|_| {
        Rejection::policy(
            "registration_invalid_type",
            format!("Unknown client type '{raw}'"),
            "Invalid client type",
        )
    })
}

/// Register a connection whose first frame was `text`.
///
/// On success the connection is in the registry, has been told so, and
/// controllers have received the initial sync. On failure the rejection
/// is sent and the close queued; the caller just stops reading.
pub async fn complete_handshake(
    ctx: &AppContext,
    conn: &Connection,
    text: &str,
) -> Result<ClientRole, Rejection> {
    let role = match evaluate_first_message(text) {
        Ok(role) => role,
        Err(rejection) => {
            reject(conn, &rejection).await;
            return Err(rejection);
        }
    };

    match ctx.registry.register(conn, role).await {
        Registration::Registered | Registration::AlreadyRegistered => {}
        Registration::RoleConflict { existing } => {
            let rejection = Rejection::internal(format!(
                "connection already registered as {existing}"
            ));
            reject(conn, &rejection).await;
            return Err(rejection);
        }
    }

    info!(conn_id = conn.id(), remote = %conn.remote(), role = %role, "registration confirmed");
    let welcome = ServerMessage::RegistrationSuccess {
        client_type: role,
        message: format!("Registered as {role}"),
    };
    if let Err(e) = conn.send(welcome).await {
        warn!(conn_id = conn.id(), error = %e, "could not confirm registration");
        ctx.registry.unregister(conn).await;
        return Err(Rejection::internal(e.to_string()));
    }

    if role == ClientRole::Controller {
        if let Err(e) = send_initial_sync(ctx, conn).await {
            warn!(conn_id = conn.id(), error = %e, "initial sync failed");
            conn.notify(ServerMessage::error(
                format!("Initial sync failed: {e}"),
                None,
                "initial_sync_error",
            ))
            .await;
        }
    }
    Ok(role)
}

/// Tell the peer why, then queue the close.
pub async fn reject(conn: &Connection, rejection: &Rejection) {
    warn!(
        conn_id = conn.id(),
        remote = %conn.remote(),
        context = rejection.context,
        "registration rejected"
    );
    conn.notify(ServerMessage::error(
        rejection.message.clone(),
        None,
        rejection.context,
    ))
    .await;
    conn.close(rejection.code, rejection.close_reason).await;
}
