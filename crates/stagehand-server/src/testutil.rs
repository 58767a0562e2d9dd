//! Shared fixtures for handler and dispatcher tests.

use crate::config::ServerConfig;
use crate::content::queries::fixtures::sample_store;
use crate::content::StoreHandle;
use crate::context::AppContext;
use std::sync::Arc;
use std::time::Duration;

pub fn test_config(scripts_dir: &std::path::Path) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.scripts_dir = scripts_dir.to_path_buf();
    config.data_dir = scripts_dir.join("data");
    config.timing.send_interval = Duration::from_millis(100);
    config.timing.group_pause = Duration::from_millis(200);
    config
}

/// Context over the sample catalogue and an empty scripts directory.
pub fn test_context() -> (Arc<AppContext>, tempfile::TempDir) {
    test_context_with(sample_store())
}

pub fn test_context_with(store: StoreHandle) -> (Arc<AppContext>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let ctx = AppContext::new(test_config(dir.path()), store);
    (ctx, dir)
}
