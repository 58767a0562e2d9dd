//! Wire message types.
//!
//! Inbound messages are JSON objects keyed by `action`; outbound messages
//! are JSON objects keyed by `type`. Every outbound envelope carries a
//! `timestamp` (fractional seconds since the Unix epoch) once stamped.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StageError;

/// Role a connection declares in its `register` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientRole {
    #[serde(alias = "presenter")]
    Controller,
    #[serde(alias = "audience")]
    Viewer,
}

impl ClientRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientRole::Controller => "controller",
            ClientRole::Viewer => "viewer",
        }
    }
}

impl fmt::Display for ClientRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientRole {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "controller" | "presenter" => Ok(ClientRole::Controller),
            "viewer" | "audience" => Ok(ClientRole::Viewer),
            other => Err(StageError::Registration(format!(
                "unknown client type: {other}"
            ))),
        }
    }
}

// ── Inbound ─────────────────────────────────────────────────────────

/// A decoded inbound message: the action name plus the full JSON object.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub action: String,
    pub body: serde_json::Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub client_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BrowseScriptsRequest {
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoadScriptRequest {
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RoastSequenceRequest {
    pub target_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StreamerRequest {
    pub streamer_name: Option<String>,
    pub danmaku_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TopicRequest {
    pub topic_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    pub term: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SendBossRequest {
    pub danmaku_type: Option<String>,
    pub boss_name: Option<String>,
    pub gift_name: Option<String>,
}

// ── Outbound ────────────────────────────────────────────────────────

/// Outbound envelope: a typed message plus the send-time stamp.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    #[serde(flatten)]
    pub message: ServerMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

impl Envelope {
    pub fn new(message: ServerMessage) -> Self {
        Self {
            message,
            timestamp: None,
        }
    }

    /// Set the timestamp to now unless one is already present.
    pub fn stamped(mut self) -> Self {
        if self.timestamp.is_none() {
            self.timestamp = Some(now_secs());
        }
        self
    }

    pub fn type_name(&self) -> &'static str {
        self.message.type_name()
    }
}

impl From<ServerMessage> for Envelope {
    fn from(message: ServerMessage) -> Self {
        Envelope::new(message)
    }
}

/// Seconds since the Unix epoch with microsecond precision.
pub fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Shared body of `error`, `warning`, `info` and `success` notices.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreadcrumbEntry {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    BrowseDir,
    ScriptFile,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrowseOption {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: OptionKind,
}

/// Body of `script_options_update`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptOptions {
    pub current_path: String,
    pub breadcrumb: Vec<BreadcrumbEntry>,
    pub options: Vec<BrowseOption>,
}

/// Read-only summary of the presentation state for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresentationSnapshot {
    pub script_filename: Option<String>,
    pub total_events: usize,
    pub event_index: i64,
    pub current_line: String,
    pub current_cue: String,
    pub is_roast_mode: bool,
    pub current_roast_index: i64,
    pub total_roasts: usize,
    pub current_roast_target: Option<String>,
    pub roast_presenter_cue: String,
    pub roast_raw_template: String,
    pub roast_danmaku_sent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReversalEntry {
    pub danmaku_part: String,
    pub read_part: String,
}

/// Every message the server sends.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    RegistrationSuccess {
        client_type: ClientRole,
        message: String,
    },
    Error(Notice),
    Warning(Notice),
    Info(Notice),
    Success(Notice),
    ScriptOptionsUpdate(ScriptOptions),
    ScriptLoadedPresenter(PresentationSnapshot),
    PresenterGenericUpdate(PresentationSnapshot),
    EndOfScript {
        message: String,
    },
    RoastSequenceReady {
        target_name: String,
        total_roasts: usize,
        message: String,
        context: String,
    },
    PresenterRoastUpdate {
        presenter_line: String,
        raw_template: String,
        current_roast_num: usize,
        total_roasts: usize,
        target_name: String,
        danmaku_sent: String,
        context: String,
    },
    RoastSequenceFinished {
        message: String,
        target_name: Option<String>,
        context: String,
    },
    Danmaku {
        text: String,
        duration_ms: u64,
        is_roast: bool,
    },
    DanmakuList {
        streamer_name: String,
        danmaku_type: String,
        danmaku_list: Vec<String>,
        context: String,
    },
    ReversalList {
        streamer_name: String,
        reversal_list: Vec<ReversalEntry>,
        context: String,
    },
    CaptionsList {
        topic_name: String,
        captions_list: Vec<String>,
        context: String,
    },
    AntiFanQuotesList {
        quotes_list: Vec<String>,
        context: String,
    },
    BossTemplatesList {
        template_kind: String,
        templates: Vec<String>,
        context: String,
    },
    StreamerSearchResults {
        term: String,
        results: Vec<String>,
    },
    TopicSearchResults {
        term: String,
        results: Vec<String>,
    },
    AutoSendStarted {
        message: String,
        context: String,
    },
    AutoSendFinished {
        message: String,
        context: String,
    },
    ReEnableAutoSendButtons,
}

impl ServerMessage {
    pub fn error(message: impl Into<String>, action: Option<&str>, context: &str) -> Self {
        ServerMessage::Error(Notice::new(message, action, context))
    }

    pub fn warning(message: impl Into<String>, action: Option<&str>, context: &str) -> Self {
        ServerMessage::Warning(Notice::new(message, action, context))
    }

    pub fn info(message: impl Into<String>, action: Option<&str>, context: &str) -> Self {
        ServerMessage::Info(Notice::new(message, action, context))
    }

    pub fn success(message: impl Into<String>, action: Option<&str>, context: &str) -> Self {
        ServerMessage::Success(Notice::new(message, action, context))
    }

    /// The wire `type` tag.
    pub fn type_name(&self) -> &'static str {
        match self {
            ServerMessage::RegistrationSuccess { .. } => "registration_success",
            ServerMessage::Error(_) => "error",
            ServerMessage::Warning(_) => "warning",
            ServerMessage::Info(_) => "info",
            ServerMessage::Success(_) => "success",
            ServerMessage::ScriptOptionsUpdate(_) => "script_options_update",
            ServerMessage::ScriptLoadedPresenter(_) => "script_loaded_presenter",
            ServerMessage::PresenterGenericUpdate(_) => "presenter_generic_update",
            ServerMessage::EndOfScript { .. } => "end_of_script",
            ServerMessage::RoastSequenceReady { .. } => "roast_sequence_ready",
            ServerMessage::PresenterRoastUpdate { .. } => "presenter_roast_update",
            ServerMessage::RoastSequenceFinished { .. } => "roast_sequence_finished",
            ServerMessage::Danmaku { .. } => "danmaku",
            ServerMessage::DanmakuList { .. } => "danmaku_list",
            ServerMessage::ReversalList { .. } => "reversal_list",
            ServerMessage::CaptionsList { .. } => "captions_list",
            ServerMessage::AntiFanQuotesList { .. } => "anti_fan_quotes_list",
            ServerMessage::BossTemplatesList { .. } => "boss_templates_list",
            ServerMessage::StreamerSearchResults { .. } => "streamer_search_results",
            ServerMessage::TopicSearchResults { .. } => "topic_search_results",
            ServerMessage::AutoSendStarted { .. } => "auto_send_started",
            ServerMessage::AutoSendFinished { .. } => "auto_send_finished",
            ServerMessage::ReEnableAutoSendButtons => "re_enable_auto_send_buttons",
        }
    }
}

impl Notice {
    pub fn new(message: impl Into<String>, action: Option<&str>, context: &str) -> Self {
        Self {
            message: message.into(),
            action: action.map(str::to_string),
            context: context.to_string(),
        }
    }
}
