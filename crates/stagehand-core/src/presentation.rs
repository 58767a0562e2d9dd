//! Presentation state machine.
//!
//! Exactly one of three modes is active: idle, script playback or a roast
//! sequence. Entering a mode discards the other mode's data, so a cursor can
//! never point into a stale list. Cursors live in `[-1, len]` where `-1`
//! means "before the first item" and `len` means "finished".
//!
//! This type holds no lock. The server wraps the single instance in a mutex
//! and every mutation happens while that guard is held.

use serde::{Deserialize, Serialize};

use crate::error::{StageError, StageResult};
use crate::messages::PresentationSnapshot;
use crate::template::{fill_all, split_roast_template};

/// One script line plus its presenter cue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptEvent {
    pub line: String,
    #[serde(default)]
    pub cue: String,
}

#[derive(Debug, Clone)]
pub struct ScriptPlayback {
    pub filename: String,
    events: Vec<ScriptEvent>,
    cursor: i64,
}

#[derive(Debug, Clone)]
pub struct RoastSequence {
    pub target_name: String,
    templates: Vec<String>,
    cursor: i64,
    shown: Option<RoastItem>,
}

/// A roast template resolved for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoastItem {
    /// Danmaku text with the target substituted; empty when the template
    /// has no separator.
    pub danmaku: String,
    pub cue: String,
    pub raw_template: String,
    /// 1-based position.
    pub position: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoastStep {
    Item(RoastItem),
    Finished { total: usize },
}

#[derive(Debug, Clone, Default)]
pub enum PresentationState {
    #[default]
    Idle,
    Script(ScriptPlayback),
    Roast(RoastSequence),
}

impl PresentationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter script mode with a freshly parsed script.
    ///
    /// A parse failure is returned unchanged and leaves the current state as
    /// it was. On success the cursor sits before the first event.
    pub fn load_script(
        &mut self,
        filename: impl Into<String>,
        parsed: StageResult<Vec<ScriptEvent>>,
    ) -> StageResult<usize> {
        let events = parsed?;
        let total = events.len();
        *self = PresentationState::Script(ScriptPlayback {
            filename: filename.into(),
            events,
            cursor: -1,
        });
        Ok(total)
    }

    /// Step forward, capping at the event count. Returns -1 outside script mode.
    pub fn advance(&mut self) -> i64 {
        match self {
            PresentationState::Script(p) => {
                p.cursor = (p.cursor + 1).min(p.events.len() as i64);
                p.cursor
            }
            _ => -1,
        }
    }

    /// Step back, flooring at -1. Returns -1 outside script mode.
    pub fn retreat(&mut self) -> i64 {
        match self {
            PresentationState::Script(p) => {
                p.cursor = (p.cursor - 1).max(-1);
                p.cursor
            }
            _ => -1,
        }
    }

    pub fn current_event(&self) -> Option<&ScriptEvent> {
        match self {
            PresentationState::Script(p) if p.cursor >= 0 => p.events.get(p.cursor as usize),
            _ => None,
        }
    }

    /// Enter roast mode. Empty template lists are rejected without
    /// touching the current state.
    pub fn start_roast(
        &mut self,
        target_name: impl Into<String>,
        templates: Vec<String>,
    ) -> StageResult<usize> {
        if templates.is_empty() {
            return Err(StageError::InvalidState(
                "roast sequence needs at least one template".into(),
            ));
        }
        let total = templates.len();
        *self = PresentationState::Roast(RoastSequence {
            target_name: target_name.into(),
            templates,
            cursor: -1,
            shown: None,
        });
        Ok(total)
    }

    /// Move to the next roast template.
    ///
    /// Returns `None` outside roast mode. Past the last template this keeps
    /// returning `Finished` and stays in roast mode; the caller decides
    /// whether to exit.
    pub fn next_roast_item(&mut self) -> Option<RoastStep> {
        let seq = match self {
            PresentationState::Roast(seq) => seq,
            _ => return None,
        };
        let total = seq.templates.len();
        seq.cursor = (seq.cursor + 1).min(total as i64);
        if seq.cursor as usize >= total {
            return Some(RoastStep::Finished { total });
        }

        let raw = &seq.templates[seq.cursor as usize];
        let (danmaku_template, cue) = split_roast_template(raw);
        let item = RoastItem {
            danmaku: fill_all(&danmaku_template, &seq.target_name),
            cue,
            raw_template: raw.clone(),
            position: seq.cursor as usize + 1,
            total,
        };
        seq.shown = Some(item.clone());
        Some(RoastStep::Item(item))
    }

    /// Leave roast mode. Returns whether a sequence was active.
    pub fn exit_roast(&mut self) -> bool {
        if matches!(self, PresentationState::Roast(_)) {
            *self = PresentationState::Idle;
            true
        } else {
            false
        }
    }

    pub fn is_roast_mode(&self) -> bool {
        matches!(self, PresentationState::Roast(_))
    }

    pub fn roast_target(&self) -> Option<&str> {
        match self {
            PresentationState::Roast(seq) => Some(&seq.target_name),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> PresentationSnapshot {
        let mut snap = PresentationSnapshot {
            script_filename: None,
            total_events: 0,
            event_index: -1,
            current_line: String::new(),
            current_cue: String::new(),
            is_roast_mode: false,
            current_roast_index: -1,
            total_roasts: 0,
            current_roast_target: None,
            roast_presenter_cue: String::new(),
            roast_raw_template: String::new(),
            roast_danmaku_sent: String::new(),
        };

        match self {
            PresentationState::Idle => {}
            PresentationState::Script(p) => {
                snap.script_filename = Some(p.filename.clone());
                snap.total_events = p.events.len();
                snap.event_index = p.cursor;
                if let Some(ev) = self.current_event() {
                    snap.current_line = ev.line.clone();
                    snap.current_cue = ev.cue.clone();
                }
            }
            PresentationState::Roast(seq) => {
                snap.is_roast_mode = true;
                snap.current_roast_index = seq.cursor;
                snap.total_roasts = seq.templates.len();
                snap.current_roast_target = Some(seq.target_name.clone());
                if let Some(item) = &seq.shown {
                    snap.roast_presenter_cue = item.cue.clone();
                    snap.roast_raw_template = item.raw_template.clone();
                    snap.roast_danmaku_sent = item.danmaku.clone();
                }
            }
        }
        snap
    }
}
