//! Read-only content lookups for the controller UI.

use super::{content_error, non_blank};
use crate::content::{BossTemplates, DanmakuKind};
use crate::context::AppContext;
use crate::dispatch::{Access, HandlerTable};
use crate::session::Connection;
use stagehand_core::messages::{SearchRequest, StreamerRequest, TopicRequest};
use stagehand_core::{parse_request, Inbound, ServerMessage, StageResult};
use std::sync::Arc;
use tracing::{debug, warn};

pub fn handlers() -> HandlerTable {
    let mut table = HandlerTable::new();
    table.register("fetch_danmaku_list", Access::Controller, fetch_danmaku_list);
    table.register("fetch_reversal", Access::Controller, fetch_reversal);
    table.register("fetch_captions", Access::Controller, fetch_captions);
    table.register("fetch_anti_fan_quotes", Access::Controller, fetch_anti_fan_quotes);
    table.register("search_streamers", Access::Controller, search_streamers);
    table.register("search_topics", Access::Controller, search_topics);
    table.register("fetch_big_brother_welcome", Access::Controller, fetch_big_brother_welcome);
    table.register("fetch_gift_thanks_danmaku", Access::Controller, fetch_gift_thanks_danmaku);
    table
}

async fn missing(conn: &Connection, action: &str, context: &str, what: &str) -> StageResult<()> {
    conn.send(ServerMessage::warning(format!("{what} is required"), Some(action), context))
        .await
}

async fn fetch_danmaku_list(ctx: Arc<AppContext>, conn: Connection, msg: Inbound) -> StageResult<()> {
    let req: StreamerRequest = parse_request(&msg.body)?;
    let Some(name) = non_blank(req.streamer_name) else {
        return missing(&conn, "fetch_danmaku_list", "fetch_danmaku_no_name", "Streamer name").await;
    };
    let raw_kind = req.danmaku_type.unwrap_or_else(|| "welcome".to_string());
    let Some(kind) = DanmakuKind::parse(&raw_kind) else {
        return conn
            .send(ServerMessage::warning(
                format!("Unknown danmaku type '{raw_kind}'"),
                Some("fetch_danmaku_list"),
                "fetch_danmaku_invalid_type",
            ))
            .await;
    };

    let list = ctx
        .content
        .danmaku_for_streamer(&name, kind, ctx.config.limits.danmaku_fetch_limit)
        .await
        .map_err(|e| content_error(e, "fetch_danmaku_error"))?;
    debug!(streamer = %name, kind = %raw_kind, count = list.len(), "danmaku list fetched");
    conn.send(ServerMessage::DanmakuList {
        streamer_name: name,
        danmaku_type: raw_kind,
        danmaku_list: list,
        context: "fetch_danmaku_list".to_string(),
    })
    .await
}

async fn fetch_reversal(ctx: Arc<AppContext>, conn: Connection, msg: Inbound) -> StageResult<()> {
    let req: StreamerRequest = parse_request(&msg.body)?;
    let Some(name) = non_blank(req.streamer_name) else {
        return missing(&conn, "fetch_reversal", "fetch_reversal_no_name", "Streamer name").await;
    };
    let entries = ctx
        .content
        .reversal(&name, ctx.config.limits.danmaku_fetch_limit)
        .await
        .map_err(|e| content_error(e, "fetch_reversal_error"))?;
    conn.send(ServerMessage::ReversalList {
        streamer_name: name,
        reversal_list: entries,
        context: "fetch_reversal".to_string(),
    })
    .await
}

async fn fetch_captions(ctx: Arc<AppContext>, conn: Connection, msg: Inbound) -> StageResult<()> {
    let req: TopicRequest = parse_request(&msg.body)?;
    let Some(topic) = non_blank(req.topic_name) else {
        return missing(&conn, "fetch_captions", "fetch_captions_no_topic", "Topic name").await;
    };
    let captions = ctx
        .content
        .captions(&topic, ctx.config.limits.danmaku_fetch_limit)
        .await
        .map_err(|e| content_error(e, "fetch_captions_error"))?;
    conn.send(ServerMessage::CaptionsList {
        topic_name: topic,
        captions_list: captions,
        context: "fetch_captions".to_string(),
    })
    .await
}

async fn fetch_anti_fan_quotes(ctx: Arc<AppContext>, conn: Connection, _msg: Inbound) -> StageResult<()> {
    let quotes = ctx
        .content
        .anti_fan_quotes(ctx.config.limits.danmaku_fetch_limit)
        .await
        .map_err(|e| content_error(e, "fetch_anti_fan_quotes_error"))?;
    conn.send(ServerMessage::AntiFanQuotesList {
        quotes_list: quotes,
        context: "fetch_anti_fan_quotes".to_string(),
    })
    .await
}

/// Search failures never surface as errors; the UI just sees no matches.
async fn search(ctx: &AppContext, term: &str, topics: bool) -> Vec<String> {
    if term.is_empty() {
        return Vec::new();
    }
    let limit = ctx.config.limits.search_limit;
    let found = if topics {
        ctx.content.search_topics(term, limit).await
    } else {
        ctx.content.search_streamers(term, limit).await
    };
    found.unwrap_or_else(|e| {
        warn!(term, topics, error = %e, "search failed");
        Vec::new()
    })
}

async fn search_streamers(ctx: Arc<AppContext>, conn: Connection, msg: Inbound) -> StageResult<()> {
    let req: SearchRequest = parse_request(&msg.body)?;
    let term = non_blank(req.term).unwrap_or_default();
    let results = search(&ctx, &term, false).await;
    conn.send(ServerMessage::StreamerSearchResults { term, results })
        .await
}

async fn search_topics(ctx: Arc<AppContext>, conn: Connection, msg: Inbound) -> StageResult<()> {
    let req: SearchRequest = parse_request(&msg.body)?;
    let term = non_blank(req.term).unwrap_or_default();
    let results = search(&ctx, &term, true).await;
    conn.send(ServerMessage::TopicSearchResults { term, results })
        .await
}

async fn boss_templates(
    ctx: &AppContext,
    conn: &Connection,
    which: BossTemplates,
    kind: &str,
) -> StageResult<()> {
    let templates = ctx
        .content
        .boss_templates(which, ctx.config.limits.boss_fetch_limit)
        .await
        .map_err(|e| content_error(e, &format!("fetch_{kind}_error")))?;
    conn.send(ServerMessage::BossTemplatesList {
        template_kind: kind.to_string(),
        templates,
        context: format!("fetch_{kind}"),
    })
    .await
}

async fn fetch_big_brother_welcome(ctx: Arc<AppContext>, conn: Connection, _msg: Inbound) -> StageResult<()> {
    boss_templates(&ctx, &conn, BossTemplates::Welcome, "welcome_boss").await
}

async fn fetch_gift_thanks_danmaku(ctx: Arc<AppContext>, conn: Connection, _msg: Inbound) -> StageResult<()> {
    boss_templates(&ctx, &conn, BossTemplates::GiftThanks, "thanks_boss_gift").await
}
