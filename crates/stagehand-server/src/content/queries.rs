//! Query facade over the content store.
//!
//! Every call first checks the handle; a disconnected store surfaces as
//! `StageError::StoreUnavailable` so handlers can report "feature
//! unavailable" instead of failing hard.

use super::store::{Document, Filter, StoreHandle};
use super::*;
use rand::seq::SliceRandom;
use stagehand_core::messages::ReversalEntry;
use stagehand_core::StageResult;
use std::collections::BTreeSet;

/// Per-streamer danmaku collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DanmakuKind {
    Welcome,
    Mock,
}

impl DanmakuKind {
    /// Accepts the wire names `welcome` and `roast` (plus `mock`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "welcome" => Some(DanmakuKind::Welcome),
            "roast" | "mock" => Some(DanmakuKind::Mock),
            _ => None,
        }
    }

    pub fn collection(&self) -> &'static str {
        match self {
            DanmakuKind::Welcome => WELCOME_DANMAKU,
            DanmakuKind::Mock => MOCK_DANMAKU,
        }
    }
}

/// Which boss template collection to draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BossTemplates {
    Welcome,
    GiftThanks,
}

impl BossTemplates {
    fn source(&self) -> (&'static str, &'static str) {
        match self {
            BossTemplates::Welcome => (BIG_BROTHERS, "welcome_text"),
            BossTemplates::GiftThanks => (GIFT_THANKS, "template"),
        }
    }
}

fn string_list(doc: &Document, field: &str) -> Vec<String> {
    doc.get(field)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn shuffled_truncated<T>(mut items: Vec<T>, limit: usize) -> Vec<T> {
    items.shuffle(&mut rand::thread_rng());
    items.truncate(limit);
    items
}

#[derive(Clone)]
pub struct ContentQueries {
    store: StoreHandle,
}

impl ContentQueries {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    pub fn handle(&self) -> &StoreHandle {
        &self.store
    }

    /// One streamer document's generated danmaku, shuffled and truncated.
    pub async fn danmaku_for_streamer(
        &self,
        streamer: &str,
        kind: DanmakuKind,
        limit: usize,
    ) -> StageResult<Vec<String>> {
        let store = self.store.get()?;
        let docs = store
            .lookup(kind.collection(), &Filter::eq_ignore_case("streamer_name", streamer), 1)
            .await?;
        let items = docs
            .first()
            .map(|d| string_list(d, "generated_danmaku"))
            .unwrap_or_default();
        Ok(shuffled_truncated(items, limit))
    }

    pub async fn anti_fan_quotes(&self, count: usize) -> StageResult<Vec<String>> {
        let store = self.store.get()?;
        store.sample_random(ANTI_FAN_QUOTES, "quote_text", count).await
    }

    /// Reversal entries with both parts present.
    pub async fn reversal(&self, streamer: &str, limit: usize) -> StageResult<Vec<ReversalEntry>> {
        let store = self.store.get()?;
        let docs = store
            .lookup(
                REVERSAL_COPY,
                &Filter::eq_ignore_case("source_name", streamer),
                usize::MAX,
            )
            .await?;
        let entries: Vec<ReversalEntry> = docs
            .iter()
            .filter_map(|d| {
                let danmaku = d.get("danmaku_part")?.as_str()?.trim();
                let read = d.get("read_part")?.as_str()?.trim();
                Some(ReversalEntry {
                    danmaku_part: danmaku.to_string(),
                    read_part: read.to_string(),
                })
            })
            .collect();
        Ok(shuffled_truncated(entries, limit))
    }

    pub async fn captions(&self, topic: &str, limit: usize) -> StageResult<Vec<String>> {
        let store = self.store.get()?;
        let docs = store
            .lookup(SOCIAL_TOPICS, &Filter::eq_ignore_case("topic_name", topic), 1)
            .await?;
        let items = docs
            .first()
            .map(|d| string_list(d, "generated_danmaku"))
            .unwrap_or_default();
        Ok(shuffled_truncated(items, limit))
    }

    pub async fn boss_templates(&self, which: BossTemplates, count: usize) -> StageResult<Vec<String>> {
        let store = self.store.get()?;
        let (collection, field) = which.source();
        store.sample_random(collection, field, count).await
    }

    /// Streamer names across every collection that carries one.
    pub async fn search_streamers(&self, term: &str, limit: usize) -> StageResult<Vec<String>> {
        let store = self.store.get()?;
        let sources = [
            (WELCOME_DANMAKU, "streamer_name"),
            (MOCK_DANMAKU, "streamer_name"),
            (REVERSAL_COPY, "source_name"),
            (SOCIAL_TOPICS, "topic_name"),
            (SOCIAL_TOPICS, "streamer_name"),
        ];
        let mut names = BTreeSet::new();
        for (collection, field) in sources {
            names.extend(store.distinct(collection, field, term, limit).await?);
        }
        Ok(names.into_iter().take(limit).collect())
    }

    pub async fn search_topics(&self, term: &str, limit: usize) -> StageResult<Vec<String>> {
        let store = self.store.get()?;
        store.distinct(SOCIAL_TOPICS, "topic_name", term, limit).await
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::super::store::JsonDocumentStore;
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// A small in-memory catalogue covering every collection.
    pub fn sample_store() -> StoreHandle {
        let raw = json!({
            "Welcome_Danmaku": [
                {"streamer_name": "老王", "generated_danmaku": ["欢迎老王1", "欢迎老王2", " "]}
            ],
            "Mock_Danmaku": [
                {"streamer_name": "老王", "generated_danmaku": ["吐槽1"]}
            ],
            "Anti_Fan_Quotes": [
                {"quote_text": "滚蛋{}，你过来干嘛"},
                {"quote_text": "{}走开，下一个"},
                {"quote_text": "随便说点什么"}
            ],
            "Reversal_Copy": [
                {"source_name": "老王", "danmaku_part": "d1", "read_part": "r1"},
                {"source_name": "老王", "danmaku_part": "d2"}
            ],
            "Social_Topics": [
                {"topic_name": "天气", "streamer_name": "小李", "generated_danmaku": ["晴天", "雨天"]}
            ],
            "Big_Brothers": [
                {"welcome_text": "欢迎{}大哥"},
                {"welcome_text": "{}来了"}
            ],
            "Gift_Thanks_Danmaku": [
                {"template": "收到{}，谢谢{}大哥"}
            ]
        });
        let mut collections = HashMap::new();
        if let serde_json::Value::Object(map) = raw {
            for (name, docs) in map {
                let docs: Vec<Document> = serde_json::from_value(docs).unwrap();
                collections.insert(name, docs);
            }
        }
        StoreHandle::Connected(Arc::new(JsonDocumentStore::from_collections(collections)))
    }
}
