//! Session registry: live connections partitioned by role.
//!
//! A connection sits in at most one role set. Both sets live under one
//! lock so registration checks and inserts are atomic.

use super::connection::{Connection, ConnectionId};
use async_trait::async_trait;
use stagehand_core::{ClientRole, StageResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Outcome of a registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Registered,
    AlreadyRegistered,
    /// The connection already holds a different role; nothing changed.
    RoleConflict { existing: ClientRole },
}

/// Collaborators holding per-controller state implement this to be told
/// when a controller leaves.
#[async_trait]
pub trait ControllerCleanup: Send + Sync {
    fn name(&self) -> &'static str;

    async fn on_controller_gone(&self, id: ConnectionId) -> StageResult<()>;
}

#[derive(Default)]
struct Members {
    controllers: HashMap<ConnectionId, Connection>,
    viewers: HashMap<ConnectionId, Connection>,
}

impl Members {
    fn set(&self, role: ClientRole) -> &HashMap<ConnectionId, Connection> {
        match role {
            ClientRole::Controller => &self.controllers,
            ClientRole::Viewer => &self.viewers,
        }
    }

    fn set_mut(&mut self, role: ClientRole) -> &mut HashMap<ConnectionId, Connection> {
        match role {
            ClientRole::Controller => &mut self.controllers,
            ClientRole::Viewer => &mut self.viewers,
        }
    }
}

/// Registry of role-assigned connections.
#[derive(Default)]
pub struct SessionRegistry {
    members: RwLock<Members>,
    cleanups: Vec<Arc<dyn ControllerCleanup>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a hook run whenever a controller is unregistered.
    pub fn with_controller_cleanup(mut self, hook: Arc<dyn ControllerCleanup>) -> Self {
        self.cleanups.push(hook);
        self
    }

    pub async fn register(&self, conn: &Connection, role: ClientRole) -> Registration {
        let mut members = self.members.write().await;

        if members.set(role).contains_key(&conn.id()) {
            debug!(conn_id = conn.id(), role = %role, "already registered");
            return Registration::AlreadyRegistered;
        }
        let other = match role {
            ClientRole::Controller => ClientRole::Viewer,
            ClientRole::Viewer => ClientRole::Controller,
        };
        if members.set(other).contains_key(&conn.id()) {
            warn!(conn_id = conn.id(), existing = %other, requested = %role, "role change rejected");
            return Registration::RoleConflict { existing: other };
        }

        members.set_mut(role).insert(conn.id(), conn.clone());
        conn.set_role(Some(role));
        info!(
            conn_id = conn.id(),
            remote = %conn.remote(),
            role = %role,
            controllers = members.controllers.len(),
            viewers = members.viewers.len(),
            "client registered"
        );
        Registration::Registered
    }

    /// Remove a connection from whichever set holds it.
    ///
    /// Always succeeds. Both sets are checked. Controller cleanup hooks run
    /// after the lock is released; their failures are logged only.
    pub async fn unregister(&self, conn: &Connection) -> Option<ClientRole> {
        let (was_controller, was_viewer) = {
            let mut members = self.members.write().await;
            let c = members.controllers.remove(&conn.id()).is_some();
            let v = members.viewers.remove(&conn.id()).is_some();
            (c, v)
        };
        conn.set_role(None);

        if was_controller && was_viewer {
            warn!(conn_id = conn.id(), "connection was present in both role sets");
        }

        if was_controller {
            for hook in &self.cleanups {
                if let Err(e) = hook.on_controller_gone(conn.id()).await {
                    warn!(conn_id = conn.id(), hook = hook.name(), error = %e, "controller cleanup failed");
                }
            }
        }

        match (was_controller, was_viewer) {
            (true, _) => {
                info!(conn_id = conn.id(), remote = %conn.remote(), "controller unregistered");
                Some(ClientRole::Controller)
            }
            (false, true) => {
                info!(conn_id = conn.id(), remote = %conn.remote(), "viewer unregistered");
                Some(ClientRole::Viewer)
            }
            (false, false) => {
                debug!(conn_id = conn.id(), "unregister of unknown connection");
                None
            }
        }
    }

    /// Live members of a role at call time. Closed connections are skipped.
    pub async fn members(&self, role: ClientRole) -> Vec<Connection> {
        let members = self.members.read().await;
        members
            .set(role)
            .values()
            .filter(|c| c.is_live())
            .cloned()
            .collect()
    }

    pub async fn role_of(&self, id: ConnectionId) -> Option<ClientRole> {
        let members = self.members.read().await;
        if members.controllers.contains_key(&id) {
            Some(ClientRole::Controller)
        } else if members.viewers.contains_key(&id) {
            Some(ClientRole::Viewer)
        } else {
            None
        }
    }

    /// `(controllers, viewers)` counts.
    pub async fn counts(&self) -> (usize, usize) {
        let members = self.members.read().await;
        (members.controllers.len(), members.viewers.len())
    }
}
