//! Concurrent, failure-tolerant delivery to a role group.

use crate::session::{Connection, SessionRegistry};
use futures_util::future::join_all;
use stagehand_core::{ClientRole, Envelope};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-recipient bound on how long a full outbound queue may stall a send.
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Controllers,
    Viewers,
    All,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub attempted: usize,
    pub delivered: usize,
}

pub struct Broadcaster {
    registry: Arc<SessionRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    async fn resolve(&self, target: Target) -> Vec<Connection> {
        match target {
            Target::Controllers => self.registry.members(ClientRole::Controller).await,
            Target::Viewers => self.registry.members(ClientRole::Viewer).await,
            Target::All => {
                let mut all = self.registry.members(ClientRole::Controller).await;
                all.extend(self.registry.members(ClientRole::Viewer).await);
                all
            }
        }
    }

    /// Send to every live member of `target` at once.
    ///
    /// The envelope is stamped once so all recipients see the same time.
    /// A failed send is logged and never stops the others.
    pub async fn broadcast(&self, target: Target, message: impl Into<Envelope>) -> FanoutReport {
        let envelope = message.into().stamped();
        let recipients = self.resolve(target).await;
        if recipients.is_empty() {
            debug!(target = ?target, msg_type = envelope.type_name(), "no recipients for broadcast");
            return FanoutReport::default();
        }

        let sends = recipients.iter().map(|conn| {
            let envelope = envelope.clone();
            async move {
                match conn.send_within(envelope, SEND_TIMEOUT).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(conn_id = conn.id(), remote = %conn.remote(), error = %e, "broadcast send failed");
                        false
                    }
                }
            }
        });
        let results = join_all(sends).await;

        let report = FanoutReport {
            attempted: results.len(),
            delivered: results.iter().filter(|ok| **ok).count(),
        };
        debug!(
            target = ?target,
            msg_type = envelope.type_name(),
            attempted = report.attempted,
            delivered = report.delivered,
            "broadcast done"
        );
        report
    }
}
