//! Broadcast hub
//!
//! Sessions register on connect and unregister on disconnect, from any task.
//! A broadcast encodes the envelope once, takes a snapshot of the registered
//! sessions and sends to every open one concurrently. A failing session is
//! logged and left registered: removal is the transport's job.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::session::Session;
use crate::broker::EnvelopeHandler;
use crate::message::{Envelope, encode};
use crate::utils::RelayError;

/// Per-broadcast tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// Sessions already closed when the broadcast reached them.
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Default)]
pub struct BroadcastHub {
    sessions: RwLock<HashMap<String, Arc<dyn Session>>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `session`, replacing any session registered under the same id.
    pub fn register(&self, session: Arc<dyn Session>) {
        let id = session.id().to_string();
        self.write().insert(id.clone(), session);
        debug!(session = %id, "Session registered");
    }

    /// Returns `false` if no session was registered under `id`.
    pub fn unregister(&self, id: &str) -> bool {
        let removed = self.write().remove(id).is_some();
        if removed {
            debug!(session = %id, "Session unregistered");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().contains_key(id)
    }

    fn snapshot(&self) -> Vec<Arc<dyn Session>> {
        self.read().values().cloned().collect()
    }

    /// Sends `envelope` as one text frame to every open session.
    ///
    /// An envelope that cannot be encoded is sent to nobody.
    pub async fn broadcast<P: Serialize>(&self, envelope: &Envelope<P>) -> BroadcastReport {
        let bytes = encode(envelope);
        if bytes.is_empty() {
            warn!("Envelope could not be encoded, broadcast skipped");
            return BroadcastReport::default();
        }
        let text = String::from_utf8_lossy(&bytes);

        let mut report = BroadcastReport::default();
        let mut sends = Vec::new();
        for session in self.snapshot() {
            if session.is_open() {
                let text = text.as_ref();
                sends.push(async move { (session.id().to_string(), session.send_text(text).await) });
            } else {
                report.skipped += 1;
            }
        }

        for (id, result) in join_all(sends).await {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(session = %id, error = %e, "Error sending message to session");
                    report.failed += 1;
                }
            }
        }
        debug!(
            delivered = report.delivered,
            skipped = report.skipped,
            failed = report.failed,
            "Broadcast complete"
        );
        report
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<dyn Session>>> {
        self.sessions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<dyn Session>>> {
        self.sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl EnvelopeHandler for BroadcastHub {
    async fn handle(&self, envelope: Envelope<Value>) -> Result<(), RelayError> {
        self.broadcast(&envelope).await;
        Ok(())
    }
}
