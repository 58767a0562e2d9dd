//! Server configuration: TOML file + CLI overrides.

use serde::Deserialize;
use stagehand_core::{StageError, StageResult};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub content: ContentSection,
    #[serde(default)]
    pub timing: TimingSection,
    #[serde(default)]
    pub limits: LimitsSection,
}

/// `[server]` section of the config TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_ws_port")]
    pub ws_port: u16,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_true")]
    pub enable_http: bool,
    #[serde(default = "default_register_timeout")]
    pub register_timeout_secs: u64,
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            ws_port: default_ws_port(),
            http_port: default_http_port(),
            enable_http: true,
            register_timeout_secs: default_register_timeout(),
            ping_interval_secs: default_ping_interval(),
            ping_timeout_secs: default_ping_timeout(),
        }
    }
}

/// `[content]` section: where documents and scripts live.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentSection {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_scripts_dir")]
    pub scripts_dir: String,
}

impl Default for ContentSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            scripts_dir: default_scripts_dir(),
        }
    }
}

/// `[timing]` section, all values in milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct TimingSection {
    #[serde(default = "default_send_interval")]
    pub send_interval_ms: u64,
    #[serde(default = "default_group_pause")]
    pub group_pause_ms: u64,
    #[serde(default = "default_auto_send_duration")]
    pub auto_send_duration_ms: u64,
    #[serde(default = "default_boss_duration")]
    pub boss_duration_ms: u64,
    #[serde(default = "default_roast_duration")]
    pub roast_duration_ms: u64,
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            send_interval_ms: default_send_interval(),
            group_pause_ms: default_group_pause(),
            auto_send_duration_ms: default_auto_send_duration(),
            boss_duration_ms: default_boss_duration(),
            roast_duration_ms: default_roast_duration(),
        }
    }
}

/// `[limits]` section: how much content each query pulls.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsSection {
    #[serde(default = "default_fetch_limit")]
    pub danmaku_fetch_limit: usize,
    #[serde(default = "default_roast_quotes")]
    pub roast_quote_count: usize,
    #[serde(default = "default_boss_fetch")]
    pub boss_fetch_limit: usize,
    #[serde(default = "default_boss_target")]
    pub boss_target_count: usize,
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            danmaku_fetch_limit: default_fetch_limit(),
            roast_quote_count: default_roast_quotes(),
            boss_fetch_limit: default_boss_fetch(),
            boss_target_count: default_boss_target(),
            search_limit: default_search_limit(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_ws_port() -> u16 {
    8765
}
fn default_http_port() -> u16 {
    5000
}
fn default_true() -> bool {
    true
}
fn default_register_timeout() -> u64 {
    10
}
fn default_ping_interval() -> u64 {
    30
}
fn default_ping_timeout() -> u64 {
    60
}
fn default_data_dir() -> String {
    "~/.stagehand/data".to_string()
}
fn default_scripts_dir() -> String {
    "~/.stagehand/scripts".to_string()
}
fn default_send_interval() -> u64 {
    2200
}
fn default_group_pause() -> u64 {
    3000
}
fn default_auto_send_duration() -> u64 {
    10_000
}
fn default_boss_duration() -> u64 {
    22_000
}
fn default_roast_duration() -> u64 {
    8000
}
fn default_fetch_limit() -> usize {
    10
}
fn default_roast_quotes() -> usize {
    3
}
fn default_boss_fetch() -> usize {
    30
}
fn default_boss_target() -> usize {
    10
}
fn default_search_limit() -> usize {
    20
}

/// Pacing used by the timed sequence sender.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub send_interval: Duration,
    pub group_pause: Duration,
    pub auto_send_duration_ms: u64,
    pub boss_duration_ms: u64,
    pub roast_duration_ms: u64,
}

impl From<&TimingSection> for Timing {
    fn from(t: &TimingSection) -> Self {
        Self {
            send_interval: Duration::from_millis(t.send_interval_ms),
            group_pause: Duration::from_millis(t.group_pause_ms),
            auto_send_duration_ms: t.auto_send_duration_ms,
            boss_duration_ms: t.boss_duration_ms,
            roast_duration_ms: t.roast_duration_ms,
        }
    }
}

/// CLI values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub ws_port: Option<u16>,
    pub http_port: Option<u16>,
    pub disable_http: bool,
    pub data_dir: Option<String>,
    pub scripts_dir: Option<String>,
}

/// Resolved server configuration (all paths expanded, CLI overrides applied).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub ws_port: u16,
    pub http_port: u16,
    pub enable_http: bool,
    pub register_timeout: Duration,
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
    pub data_dir: PathBuf,
    pub scripts_dir: PathBuf,
    pub timing: Timing,
    pub limits: LimitsSection,
}

impl ServerConfig {
    /// Load config from TOML file, then apply CLI overrides.
    pub fn load(config_path: Option<&Path>, cli: CliOverrides) -> StageResult<Self> {
        let file_config = match config_path {
            Some(path) => {
                let expanded = expand_tilde(path);
                if expanded.exists() {
                    info!(path = %expanded.display(), "loading config file");
                    let content = std::fs::read_to_string(&expanded)?;
                    toml::from_str::<ConfigFile>(&content)
                        .map_err(|e| StageError::Other(format!("config parse error: {e}")))?
                } else {
                    info!(path = %expanded.display(), "config file not found, using defaults");
                    ConfigFile::default()
                }
            }
            None => ConfigFile::default(),
        };

        Ok(Self::resolve(file_config, cli))
    }

    fn resolve(file: ConfigFile, cli: CliOverrides) -> Self {
        let data_dir = cli.data_dir.unwrap_or(file.content.data_dir);
        let scripts_dir = cli.scripts_dir.unwrap_or(file.content.scripts_dir);

        Self {
            host: cli.host.unwrap_or(file.server.host),
            ws_port: cli.ws_port.unwrap_or(file.server.ws_port),
            http_port: cli.http_port.unwrap_or(file.server.http_port),
            enable_http: file.server.enable_http && !cli.disable_http,
            register_timeout: Duration::from_secs(file.server.register_timeout_secs),
            ping_interval: Duration::from_secs(file.server.ping_interval_secs.max(1)),
            ping_timeout: Duration::from_secs(file.server.ping_timeout_secs.max(1)),
            data_dir: expand_tilde_str(&data_dir),
            scripts_dir: expand_tilde_str(&scripts_dir),
            timing: Timing::from(&file.timing),
            limits: file.limits,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::resolve(ConfigFile::default(), CliOverrides::default())
    }
}

/// Expand `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    expand_tilde_str(&s)
}

fn expand_tilde_str(s: &str) -> PathBuf {
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(s)
}
