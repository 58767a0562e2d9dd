//! Script browsing, loading and stepping.

use crate::context::AppContext;
use crate::dispatch::{Access, HandlerTable};
use crate::scripts::parse_script;
use crate::session::Connection;
use stagehand_core::messages::{BrowseScriptsRequest, LoadScriptRequest};
use stagehand_core::{parse_request, Inbound, PresentationState, ResultExt, ServerMessage, StageResult};
use std::sync::Arc;
use tracing::{debug, info};

pub fn handlers() -> HandlerTable {
    let mut table = HandlerTable::new();
    table.register("browse_scripts", Access::Controller, browse_scripts);
    table.register("load_script", Access::Controller, load_script);
    table.register("prev_event", Access::Controller, prev_event);
    table.register("next_event", Access::Controller, next_event);
    table.register("get_current_state", Access::Controller, get_current_state);
    table
}

/// Root listing plus the current snapshot, sent right after a controller registers.
pub async fn send_initial_sync(ctx: &AppContext, conn: &Connection) -> StageResult<()> {
    let options = ctx.scripts.browse(conn.id(), ".").await?;
    conn.send(ServerMessage::ScriptOptionsUpdate(options)).await?;
    conn.send(ServerMessage::ScriptLoadedPresenter(ctx.snapshot().await))
        .await
}

async fn browse_scripts(ctx: Arc<AppContext>, conn: Connection, msg: Inbound) -> StageResult<()> {
    let req: BrowseScriptsRequest = parse_request(&msg.body)?;
    let path = req.path.unwrap_or_else(|| ".".to_string());

    match ctx.scripts.browse(conn.id(), &path).await {
        Ok(options) => conn.send(ServerMessage::ScriptOptionsUpdate(options)).await,
        Err(e) => {
            let context = e.context().unwrap_or("browse_error").to_string();
            debug!(conn_id = conn.id(), path = %path, context = %context, "browse refused");
            conn.send(ServerMessage::error(e.to_string(), Some("browse_scripts"), &context))
                .await?;
            // Put the controller back on its last good listing.
            let current = ctx.scripts.current(conn.id()).await;
            let options = ctx
                .scripts
                .browse(conn.id(), &current)
                .await
                .tagged("browse_error")?;
            conn.send(ServerMessage::ScriptOptionsUpdate(options)).await
        }
    }
}

async fn load_script(ctx: Arc<AppContext>, conn: Connection, msg: Inbound) -> StageResult<()> {
    let req: LoadScriptRequest = parse_request(&msg.body)?;
    let (path, name) = ctx
        .scripts
        .resolve_script(req.filename.as_deref().unwrap_or_default())
        .await?;
    let parsed = parse_script(&path).await;

    let snapshot = {
        let mut state = ctx.state.lock().await;
        let total = state.load_script(&name, parsed).tagged("load_script_error")?;
        info!(conn_id = conn.id(), script = %name, events = total, "script loaded");
        state.snapshot()
    };
    conn.send(ServerMessage::ScriptLoadedPresenter(snapshot)).await
}

async fn prev_event(ctx: Arc<AppContext>, conn: Connection, _msg: Inbound) -> StageResult<()> {
    step(&ctx, &conn, false).await
}

async fn next_event(ctx: Arc<AppContext>, conn: Connection, _msg: Inbound) -> StageResult<()> {
    step(&ctx, &conn, true).await
}

async fn step(ctx: &AppContext, conn: &Connection, forward: bool) -> StageResult<()> {
    let action = if forward { "next_event" } else { "prev_event" };
    let stepped = {
        let mut state = ctx.state.lock().await;
        if matches!(*state, PresentationState::Script(_)) {
            let index = if forward { state.advance() } else { state.retreat() };
            let snapshot = state.snapshot();
            let at_end = forward && index >= snapshot.total_events as i64;
            Some((snapshot, at_end))
        } else {
            None
        }
    };

    let Some((snapshot, at_end)) = stepped else {
        return conn
            .send(ServerMessage::warning(
                "No script loaded",
                Some(action),
                "no_script_loaded",
            ))
            .await;
    };

    debug!(conn_id = conn.id(), index = snapshot.event_index, "script stepped");
    conn.send(ServerMessage::PresenterGenericUpdate(snapshot)).await?;
    if at_end {
        conn.send(ServerMessage::EndOfScript {
            message: "End of script reached".to_string(),
        })
        .await?;
    }
    Ok(())
}

async fn get_current_state(ctx: Arc<AppContext>, conn: Connection, _msg: Inbound) -> StageResult<()> {
    conn.send(ServerMessage::ScriptLoadedPresenter(ctx.snapshot().await))
        .await
}
