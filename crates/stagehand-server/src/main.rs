//! stagehand-server: live-show control server.
//!
//! Controllers drive a script or a roast sequence over WebSocket; viewers
//! receive the danmaku overlay stream. A small read-only HTTP API sits
//! alongside for search and status.

mod broadcast;
mod config;
mod content;
mod context;
mod dispatch;
mod handlers;
mod http;
mod scripts;
mod server;
mod session;
#[cfg(test)]
mod testutil;
mod transport;

use clap::Parser;
use config::{CliOverrides, ServerConfig};
use content::StoreHandle;
use server::StageServer;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// stagehand-server — live-show control server
#[derive(Parser, Debug)]
#[command(name = "stagehand-server", version, about = "Live-show control server")]
struct Cli {
    /// Bind address
    #[arg(long)]
    host: Option<String>,

    /// WebSocket listen port
    #[arg(long)]
    ws_port: Option<u16>,

    /// HTTP API listen port
    #[arg(long)]
    http_port: Option<u16>,

    /// Do not serve the HTTP API
    #[arg(long)]
    no_http: bool,

    /// Config file path
    #[arg(long, default_value = "~/.stagehand/config.toml")]
    config: String,

    /// Content data directory (one JSON file per collection)
    #[arg(long)]
    data_dir: Option<String>,

    /// Scripts directory
    #[arg(long)]
    scripts_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    use tracing_subscriber::EnvFilter;
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "starting stagehand-server");

    let config_path = PathBuf::from(&cli.config);
    let overrides = CliOverrides {
        host: cli.host,
        ws_port: cli.ws_port,
        http_port: cli.http_port,
        disable_http: cli.no_http,
        data_dir: cli.data_dir,
        scripts_dir: cli.scripts_dir,
    };
    let server_config = match ServerConfig::load(Some(&config_path), overrides) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };

    if !server_config.scripts_dir.is_dir() {
        warn!(path = %server_config.scripts_dir.display(), "scripts directory not found, browsing will fail");
    }
    // A missing store is not fatal; content actions report it per request.
    let store = StoreHandle::open_json_dir(&server_config.data_dir);

    let running = match StageServer::new(server_config, store).start().await {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, "failed to start server");
            std::process::exit(1);
        }
    };

    shutdown_signal().await;
    info!("received shutdown signal");
    running.shutdown().await;

    info!("stagehand-server stopped");
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable, waiting for Ctrl-C only");
                ctrl_c.await.ok();
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}
