//! Action name → handler mapping, assembled once at startup.
//!
//! Later registrations of the same action replace earlier ones and log a
//! conflict warning. Feature modules rely on this to override defaults.

use crate::context::AppContext;
use crate::session::Connection;
use futures_util::future::BoxFuture;
use stagehand_core::{ClientRole, Inbound, StageResult};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

pub type Handler =
    Arc<dyn Fn(Arc<AppContext>, Connection, Inbound) -> BoxFuture<'static, StageResult<()>> + Send + Sync>;

/// Which registered roles may invoke an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Any,
    Controller,
}

impl Access {
    pub fn permits(&self, role: Option<ClientRole>) -> bool {
        match self {
            Access::Any => true,
            Access::Controller => role == Some(ClientRole::Controller),
        }
    }
}

#[derive(Clone)]
pub struct HandlerEntry {
    pub handler: Handler,
    pub access: Access,
    /// Failures must be followed by the controls re-enable signal.
    pub gated: bool,
}

#[derive(Default, Clone)]
pub struct HandlerTable {
    entries: HashMap<String, HandlerEntry>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, action: &str, entry: HandlerEntry) {
        if self.entries.insert(action.to_string(), entry).is_some() {
            warn!(action, "handler re-registered, later registration wins");
        } else {
            debug!(action, "handler registered");
        }
    }

    pub fn register<F, Fut>(&mut self, action: &str, access: Access, f: F)
    where
        F: Fn(Arc<AppContext>, Connection, Inbound) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StageResult<()>> + Send + 'static,
    {
        let handler: Handler = Arc::new(
            move |ctx: Arc<AppContext>, conn: Connection, msg: Inbound| -> BoxFuture<'static, StageResult<()>> {
                Box::pin(f(ctx, conn, msg))
            },
        );
        self.insert(
            action,
            HandlerEntry {
                handler,
                access,
                gated: false,
            },
        );
    }

    /// Register a controller action whose failures re-enable the UI controls.
    pub fn register_gated<F, Fut>(&mut self, action: &str, f: F)
    where
        F: Fn(Arc<AppContext>, Connection, Inbound) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StageResult<()>> + Send + 'static,
    {
        self.register(action, Access::Controller, f);
        if let Some(entry) = self.entries.get_mut(action) {
            entry.gated = true;
        }
    }

    /// Fold another table in; its entries win on conflict.
    pub fn merge(&mut self, other: HandlerTable) {
        for (action, entry) in other.entries {
            self.insert(&action, entry);
        }
    }

    pub fn get(&self, action: &str) -> Option<&HandlerEntry> {
        self.entries.get(action)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn actions(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
