//! Plain-text script parser.
//!
//! One event per line. Blank lines and `#` comments are skipped. A line of
//! the form `spoken line | presenter cue` splits on the first `|`.

use stagehand_core::{ScriptEvent, StageError, StageResult};
use std::path::Path;

pub fn parse_script_text(text: &str) -> Vec<ScriptEvent> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|l| match l.split_once('|') {
            Some((line, cue)) => ScriptEvent {
                line: line.trim().to_string(),
                cue: cue.trim().to_string(),
            },
            None => ScriptEvent {
                line: l.to_string(),
                cue: String::new(),
            },
        })
        .collect()
}

/// Read and parse a script file. Unreadable or non-UTF-8 files fail.
pub async fn parse_script(path: &Path) -> StageResult<Vec<ScriptEvent>> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| StageError::Script(format!("cannot read {}: {e}", path.display())))?;
    let text = String::from_utf8(bytes)
        .map_err(|_| StageError::Script(format!("{} is not valid UTF-8", path.display())))?;
    Ok(parse_script_text(&text))
}
