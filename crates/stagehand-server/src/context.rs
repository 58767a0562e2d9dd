//! Shared application state handed to every handler.

use crate::broadcast::{Broadcaster, SequenceSender, SequenceSlots};
use crate::config::ServerConfig;
use crate::content::{ContentQueries, StoreHandle};
use crate::scripts::ScriptBrowser;
use crate::session::SessionRegistry;
use stagehand_core::{PresentationSnapshot, PresentationState};
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct AppContext {
    pub config: ServerConfig,
    pub registry: Arc<SessionRegistry>,
    /// The single presentation state, serialized across controllers.
    pub state: Arc<Mutex<PresentationState>>,
    pub content: ContentQueries,
    pub scripts: Arc<ScriptBrowser>,
    pub broadcaster: Arc<Broadcaster>,
    pub sequencer: Arc<SequenceSender>,
    pub slots: Arc<SequenceSlots>,
}

impl AppContext {
    pub fn new(config: ServerConfig, store: StoreHandle) -> Arc<Self> {
        let scripts = Arc::new(ScriptBrowser::new(config.scripts_dir.clone()));
        let registry = Arc::new(SessionRegistry::new().with_controller_cleanup(scripts.clone()));
        let broadcaster = Arc::new(Broadcaster::new(registry.clone()));
        let sequencer = Arc::new(SequenceSender::new(
            broadcaster.clone(),
            config.timing,
        ));
        Arc::new(Self {
            config,
            registry,
            state: Arc::new(Mutex::new(PresentationState::new())),
            content: ContentQueries::new(store),
            scripts,
            broadcaster,
            sequencer,
            slots: Arc::new(SequenceSlots::new()),
        })
    }

    pub async fn snapshot(&self) -> PresentationSnapshot {
        self.state.lock().await.snapshot()
    }

    /// The subset exposed to the HTTP side. Nothing in it can mutate the show.
    pub fn read_only(&self) -> ReadOnlyView {
        ReadOnlyView {
            content: self.content.clone(),
            state: self.state.clone(),
            registry: self.registry.clone(),
            search_limit: self.config.limits.search_limit,
        }
    }
}

#[derive(Clone)]
pub struct ReadOnlyView {
    content: ContentQueries,
    state: Arc<Mutex<PresentationState>>,
    registry: Arc<SessionRegistry>,
    search_limit: usize,
}

impl ReadOnlyView {
    pub fn content(&self) -> &ContentQueries {
        &self.content
    }

    pub fn search_limit(&self) -> usize {
        self.search_limit
    }

    pub async fn snapshot(&self) -> PresentationSnapshot {
        self.state.lock().await.snapshot()
    }

    pub async fn counts(&self) -> (usize, usize) {
        self.registry.counts().await
    }
}
