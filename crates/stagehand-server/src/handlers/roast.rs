//! Roast mode: fetch a sequence of taunts for a target, step through them
//! with presenter cues, and push each danmaku to the viewers.

use super::{content_error, non_blank};
use crate::broadcast::Target;
use crate::context::AppContext;
use crate::dispatch::HandlerTable;
use crate::session::Connection;
use stagehand_core::messages::RoastSequenceRequest;
use stagehand_core::{
    parse_request, Inbound, ResultExt, RoastItem, RoastStep, ServerMessage, StageResult,
};
use std::sync::Arc;
use tracing::{debug, info};

pub fn handlers() -> HandlerTable {
    let mut table = HandlerTable::new();
    table.register_gated("get_roast_sequence", get_roast_sequence);
    table.register_gated("advance_roast", advance_roast);
    table.register_gated("exit_roast_mode", exit_roast_mode);
    table
}

async fn warn_and_reenable(conn: &Connection, action: &str, context: &str, message: &str) -> StageResult<()> {
    conn.send(ServerMessage::warning(message, Some(action), context))
        .await?;
    conn.send(ServerMessage::ReEnableAutoSendButtons).await
}

async fn get_roast_sequence(ctx: Arc<AppContext>, conn: Connection, msg: Inbound) -> StageResult<()> {
    let req: RoastSequenceRequest = parse_request(&msg.body)?;
    let Some(target) = non_blank(req.target_name) else {
        return warn_and_reenable(
            &conn,
            "get_roast_sequence",
            "roast_missing_target",
            "A roast target name is required",
        )
        .await;
    };

    conn.send(ServerMessage::info(
        format!("Fetching roast lines for {target}..."),
        Some("get_roast_sequence"),
        "roast_fetching",
    ))
    .await?;

    let quotes = ctx
        .content
        .anti_fan_quotes(ctx.config.limits.roast_quote_count)
        .await
        .map_err(|e| content_error(e, "roast_fetch_error"))?;
    if quotes.is_empty() {
        conn.send(ServerMessage::info(
            "No roast lines in the database",
            Some("get_roast_sequence"),
            "roast_empty_db",
        ))
        .await?;
        return conn.send(ServerMessage::ReEnableAutoSendButtons).await;
    }

    let total = ctx
        .state
        .lock()
        .await
        .start_roast(target.clone(), quotes)
        .tagged("roast_start_error")?;
    info!(conn_id = conn.id(), target = %target, total, "roast sequence ready");

    conn.send(ServerMessage::RoastSequenceReady {
        message: format!("{total} roast lines ready for {target}"),
        target_name: target,
        total_roasts: total,
        context: "roast_ready".to_string(),
    })
    .await
}

enum Advance {
    Inactive,
    Item { item: RoastItem, target: String },
    Finished { total: usize, target: Option<String> },
}

async fn advance_roast(ctx: Arc<AppContext>, conn: Connection, _msg: Inbound) -> StageResult<()> {
    let advance = {
        let mut state = ctx.state.lock().await;
        let target = state.roast_target().map(str::to_string);
        match state.next_roast_item() {
            None => Advance::Inactive,
            Some(RoastStep::Item(item)) => Advance::Item {
                item,
                target: target.unwrap_or_default(),
            },
            Some(RoastStep::Finished { total }) => {
                state.exit_roast();
                Advance::Finished { total, target }
            }
        }
    };

    match advance {
        Advance::Inactive => {
            warn_and_reenable(&conn, "advance_roast", "roast_not_active", "No roast sequence is active")
                .await
        }
        Advance::Finished { total, target } => {
            info!(conn_id = conn.id(), total, "roast sequence finished");
            conn.send(ServerMessage::RoastSequenceFinished {
                message: format!("All {total} roast lines delivered"),
                target_name: target,
                context: "roast_finished_natural".to_string(),
            })
            .await?;
            conn.send(ServerMessage::ReEnableAutoSendButtons).await
        }
        Advance::Item { item, target } => {
            if !item.danmaku.is_empty() {
                let report = ctx
                    .broadcaster
                    .broadcast(
                        Target::Viewers,
                        ServerMessage::Danmaku {
                            text: item.danmaku.clone(),
                            duration_ms: ctx.config.timing.roast_duration_ms,
                            is_roast: true,
                        },
                    )
                    .await;
                debug!(delivered = report.delivered, attempted = report.attempted, "roast danmaku sent");
            }
            conn.send(ServerMessage::PresenterRoastUpdate {
                presenter_line: item.cue,
                raw_template: item.raw_template,
                current_roast_num: item.position,
                total_roasts: item.total,
                target_name: target,
                danmaku_sent: item.danmaku,
                context: "roast_update".to_string(),
            })
            .await
        }
    }
}

async fn exit_roast_mode(ctx: Arc<AppContext>, conn: Connection, _msg: Inbound) -> StageResult<()> {
    let exited = {
        let mut state = ctx.state.lock().await;
        let target = state.roast_target().map(str::to_string);
        state.exit_roast().then_some(target)
    };

    match exited {
        Some(target) => {
            info!(conn_id = conn.id(), "roast mode exited");
            conn.send(ServerMessage::RoastSequenceFinished {
                message: "Roast mode ended".to_string(),
                target_name: target,
                context: "roast_exit".to_string(),
            })
            .await?;
            conn.send(ServerMessage::ReEnableAutoSendButtons).await
        }
        None => {
            warn_and_reenable(&conn, "exit_roast_mode", "roast_not_active", "No roast sequence is active")
                .await
        }
    }
}
