//! Timed broadcast flows started from the controller: auto-send for a
//! streamer and the boss welcome / gift thanks streams.

use super::{content_error, non_blank};
use crate::broadcast::sequence::{FlowPlan, GroupSpec, TimedFlow};
use crate::broadcast::StreamKey;
use crate::content::{BossTemplates, DanmakuKind};
use crate::context::AppContext;
use crate::dispatch::HandlerTable;
use crate::session::Connection;
use stagehand_core::messages::{SendBossRequest, StreamerRequest};
use stagehand_core::{parse_request, Inbound, ServerMessage, StageResult};
use std::sync::Arc;
use tracing::info;

const BOSS_FALLBACK: &str = "大哥";
const GIFT_FALLBACK: &str = "礼物";

pub fn handlers() -> HandlerTable {
    let mut table = HandlerTable::new();
    table.register_gated("auto_send_danmaku", auto_send_danmaku);
    table.register_gated("send_boss_danmaku", send_boss_danmaku);
    table
}

async fn refuse(conn: &Connection, action: &str, context: &str, message: String) -> StageResult<()> {
    conn.send(ServerMessage::warning(message, Some(action), context))
        .await?;
    conn.send(ServerMessage::ReEnableAutoSendButtons).await
}

async fn auto_send_danmaku(ctx: Arc<AppContext>, conn: Connection, msg: Inbound) -> StageResult<()> {
    let req: StreamerRequest = parse_request(&msg.body)?;
    let Some(name) = non_blank(req.streamer_name) else {
        return refuse(
            &conn,
            "auto_send_danmaku",
            "auto_send_no_name",
            "Streamer name is required".to_string(),
        )
        .await;
    };

    let limit = ctx.config.limits.danmaku_fetch_limit;
    let welcome = ctx
        .content
        .danmaku_for_streamer(&name, DanmakuKind::Welcome, limit)
        .await
        .map_err(|e| content_error(e, "auto_send_fetch_error"))?;
    let mock = ctx
        .content
        .danmaku_for_streamer(&name, DanmakuKind::Mock, limit)
        .await
        .map_err(|e| content_error(e, "auto_send_fetch_error"))?;
    if welcome.is_empty() && mock.is_empty() {
        return refuse(
            &conn,
            "auto_send_danmaku",
            "auto_send_no_data",
            format!("No danmaku found for {name}"),
        )
        .await;
    }

    let duration = ctx.config.timing.auto_send_duration_ms;
    let plan = FlowPlan {
        context: "auto_send".to_string(),
        title: format!("Auto-send for {name}"),
        groups: vec![
            (GroupSpec::new("welcome", duration), welcome),
            (GroupSpec::new("mock", duration), mock),
        ],
    };
    info!(conn_id = conn.id(), streamer = %name, "auto-send requested");

    let sequencer = ctx.sequencer.clone();
    ctx.slots
        .start(StreamKey::AutoSend, move |token| async move {
            sequencer.run_flow(plan, conn, token).await;
        })
        .await;
    Ok(())
}

/// The two boss streams and how their placeholders are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BossKind {
    Welcome,
    GiftThanks,
}

impl BossKind {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "welcome_boss" => Some(BossKind::Welcome),
            "thanks_boss_gift" => Some(BossKind::GiftThanks),
            _ => None,
        }
    }

    fn wire_name(&self) -> &'static str {
        match self {
            BossKind::Welcome => "welcome_boss",
            BossKind::GiftThanks => "thanks_boss_gift",
        }
    }

    fn stream(&self) -> StreamKey {
        match self {
            BossKind::Welcome => StreamKey::WelcomeBoss,
            BossKind::GiftThanks => StreamKey::GiftThanks,
        }
    }

    fn templates(&self) -> BossTemplates {
        match self {
            BossKind::Welcome => BossTemplates::Welcome,
            BossKind::GiftThanks => BossTemplates::GiftThanks,
        }
    }

    /// Positional names and fallbacks. Gift thanks templates name the gift
    /// first and the boss second.
    fn placeholders(&self, boss: &str, gift: Option<&str>) -> (Vec<String>, Vec<String>) {
        match self {
            BossKind::Welcome => (vec![boss.to_string()], vec![BOSS_FALLBACK.to_string()]),
            BossKind::GiftThanks => (
                vec![gift.unwrap_or_default().to_string(), boss.to_string()],
                vec![GIFT_FALLBACK.to_string(), BOSS_FALLBACK.to_string()],
            ),
        }
    }
}

async fn send_boss_danmaku(ctx: Arc<AppContext>, conn: Connection, msg: Inbound) -> StageResult<()> {
    const ACTION: &str = "send_boss_danmaku";
    let req: SendBossRequest = parse_request(&msg.body)?;

    let raw_kind = req.danmaku_type.unwrap_or_default();
    let Some(kind) = BossKind::parse(&raw_kind) else {
        return refuse(
            &conn,
            ACTION,
            "send_boss_invalid_type",
            format!("Unknown boss danmaku type '{raw_kind}'"),
        )
        .await;
    };
    let Some(boss) = non_blank(req.boss_name) else {
        return refuse(&conn, ACTION, "send_boss_missing_name", "Boss name is required".to_string()).await;
    };
    let gift = non_blank(req.gift_name);
    if kind == BossKind::GiftThanks && gift.is_none() {
        return refuse(&conn, ACTION, "send_boss_missing_gift", "Gift name is required".to_string()).await;
    }

    let prefix = format!("send_boss_{}", kind.wire_name());
    let templates = ctx
        .content
        .boss_templates(kind.templates(), ctx.config.limits.boss_fetch_limit)
        .await
        .map_err(|e| content_error(e, &format!("{prefix}_fetch_error")))?;
    if templates.is_empty() {
        conn.send(ServerMessage::info(
            "No templates available",
            Some(ACTION),
            &format!("{prefix}_empty"),
        ))
        .await?;
        return conn.send(ServerMessage::ReEnableAutoSendButtons).await;
    }

    let (names, fallbacks) = kind.placeholders(&boss, gift.as_deref());
    let flow = TimedFlow {
        title: match kind {
            BossKind::Welcome => format!("Boss welcome for {boss}"),
            BossKind::GiftThanks => format!("Gift thanks for {boss}"),
        },
        context: prefix,
        spec: GroupSpec::new(kind.wire_name(), ctx.config.timing.boss_duration_ms),
        templates,
        target_count: ctx.config.limits.boss_target_count,
        names,
        fallbacks,
    };
    info!(conn_id = conn.id(), kind = kind.wire_name(), boss = %boss, "boss flow requested");

    let sequencer = ctx.sequencer.clone();
    ctx.slots
        .start(kind.stream(), move |token| async move {
            sequencer.run_timed_flow(flow, conn, token).await;
        })
        .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Dispatcher;
    use crate::session::connection::drain_messages;
    use crate::testutil::test_context;
    use stagehand_core::{ClientRole, Envelope};
    use std::time::Duration;

    fn kinds(msgs: &[Envelope]) -> Vec<&'static str> {
        msgs.iter().map(|m| m.type_name()).collect()
    }

    fn danmaku(msgs: &[Envelope]) -> Vec<(String, bool)> {
        msgs.iter()
            .filter_map(|e| match &e.message {
                ServerMessage::Danmaku { text, is_roast, .. } => Some((text.clone(), *is_roast)),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn auto_send_plays_welcome_then_mock() {
        let (ctx, _dir) = test_context();
        let d = Dispatcher::new(ctx.clone(), handlers());
        let (controller, mut crx) = Connection::channel_pair(1);
        let (viewer, mut vrx) = Connection::channel_pair(2);
        ctx.registry.register(&controller, ClientRole::Controller).await;
        ctx.registry.register(&viewer, ClientRole::Viewer).await;

        d.dispatch(&controller, r#"{"action":"auto_send_danmaku","streamer_name":"老王"}"#)
            .await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!ctx.slots.is_running(StreamKey::AutoSend).await);

        let sent = danmaku(&drain_messages(&mut vrx));
        assert_eq!(sent.len(), 3);
        assert!(!sent[0].1 && !sent[1].1);
        assert_eq!(sent[2], ("吐槽1".to_string(), true));

        let ctl = kinds(&drain_messages(&mut crx));
        assert_eq!(ctl.first(), Some(&"info"));
        assert!(ctl.contains(&"auto_send_started"));
        assert!(ctl.contains(&"auto_send_finished"));
        assert_eq!(ctl.last(), Some(&"re_enable_auto_send_buttons"));
    }

    #[tokio::test]
    async fn auto_send_without_data_warns() {
        let (ctx, _dir) = test_context();
        let d = Dispatcher::new(ctx.clone(), handlers());
        let (conn, mut rx) = Connection::channel_pair(1);
        ctx.registry.register(&conn, ClientRole::Controller).await;

        d.dispatch(&conn, r#"{"action":"auto_send_danmaku","streamer_name":"nobody"}"#)
            .await;
        d.dispatch(&conn, r#"{"action":"auto_send_danmaku"}"#).await;
        let msgs = drain_messages(&mut rx);
        let contexts: Vec<String> = msgs
            .iter()
            .filter_map(|e| match &e.message {
                ServerMessage::Warning(n) => Some(n.context.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(contexts, vec!["auto_send_no_data", "auto_send_no_name"]);
        assert_eq!(
            kinds(&msgs).iter().filter(|k| **k == "re_enable_auto_send_buttons").count(),
            2
        );
    }

    #[tokio::test]
    async fn boss_validation() {
        let (ctx, _dir) = test_context();
        let d = Dispatcher::new(ctx.clone(), handlers());
        let (conn, mut rx) = Connection::channel_pair(1);
        ctx.registry.register(&conn, ClientRole::Controller).await;

        d.dispatch(&conn, r#"{"action":"send_boss_danmaku","danmaku_type":"party","boss_name":"张总"}"#)
            .await;
        d.dispatch(&conn, r#"{"action":"send_boss_danmaku","danmaku_type":"welcome_boss"}"#)
            .await;
        d.dispatch(&conn, r#"{"action":"send_boss_danmaku","danmaku_type":"thanks_boss_gift","boss_name":"张总"}"#)
            .await;
        let contexts: Vec<String> = drain_messages(&mut rx)
            .iter()
            .filter_map(|e| match &e.message {
                ServerMessage::Warning(n) => Some(n.context.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            contexts,
            vec!["send_boss_invalid_type", "send_boss_missing_name", "send_boss_missing_gift"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn gift_thanks_fills_gift_then_boss() {
        let (ctx, _dir) = test_context();
        let d = Dispatcher::new(ctx.clone(), handlers());
        let (controller, _crx) = Connection::channel_pair(1);
        let (viewer, mut vrx) = Connection::channel_pair(2);
        ctx.registry.register(&controller, ClientRole::Controller).await;
        ctx.registry.register(&viewer, ClientRole::Viewer).await;

        d.dispatch(
            &controller,
            r#"{"action":"send_boss_danmaku","danmaku_type":"thanks_boss_gift","boss_name":"张总","gift_name":"火箭"}"#,
        )
        .await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        let sent = danmaku(&drain_messages(&mut vrx));
        assert_eq!(sent.len(), ctx.config.limits.boss_target_count);
        assert!(sent.iter().all(|(t, roast)| t == "收到火箭，谢谢张总大哥" && !roast));
    }

    #[tokio::test(start_paused = true)]
    async fn new_boss_flow_supersedes_the_running_one() {
        let (ctx, _dir) = test_context();
        let d = Dispatcher::new(ctx.clone(), handlers());
        let (controller, mut crx) = Connection::channel_pair(1);
        let (viewer, _vrx) = Connection::channel_pair(2);
        ctx.registry.register(&controller, ClientRole::Controller).await;
        ctx.registry.register(&viewer, ClientRole::Viewer).await;

        let welcome = r#"{"action":"send_boss_danmaku","danmaku_type":"welcome_boss","boss_name":"张总"}"#;
        d.dispatch(&controller, welcome).await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        d.dispatch(&controller, welcome).await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        let contexts: Vec<String> = drain_messages(&mut crx)
            .iter()
            .filter_map(|e| match &e.message {
                ServerMessage::Info(n) if n.context.ends_with("_cancelled") => Some(n.context.clone()),
                ServerMessage::AutoSendFinished { context, .. } => Some(context.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            contexts,
            vec![
                "send_boss_welcome_boss_cancelled",
                "send_boss_welcome_boss_finished"
            ]
        );
    }
}
