//! Feature handlers. Each module contributes a table; `build_handler_table`
//! merges them in a fixed order so later modules can override earlier ones.

pub mod fetch;
pub mod lifecycle;
pub mod roast;
pub mod script;
pub mod send;

use crate::dispatch::HandlerTable;
use stagehand_core::StageError;
use tracing::{debug, info};

pub fn build_handler_table() -> HandlerTable {
    let mut table = HandlerTable::new();
    table.merge(lifecycle::handlers());
    table.merge(script::handlers());
    table.merge(roast::handlers());
    table.merge(fetch::handlers());
    table.merge(send::handlers());
    info!(actions = table.len(), "handler table built");
    debug!(actions = ?table.actions(), "registered actions");
    table
}

/// Tag a content failure, keeping an unavailable store distinguishable.
pub(crate) fn content_error(e: StageError, context: &str) -> StageError {
    if matches!(e.root(), StageError::StoreUnavailable(_)) {
        e.tagged("store_unavailable")
    } else {
        e.tagged(context)
    }
}

/// Trimmed, non-empty text or `None`.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
