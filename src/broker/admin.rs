//! Topic administration
//!
//! `TopicAdmin` creates, deletes and clears topics on the broker. Every call
//! is bounded by the configured admin timeout and is a successful no-op while
//! the [`BrokerGate`] is closed. Faults are logged here and returned to the
//! caller as a plain `Err`; nothing is retried.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::backend::{AdminClient, BrokerError, TopicSpec};
use super::gate::BrokerGate;
use crate::utils::RelayError;

const ABSENCE_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct TopicAdmin {
    client: Arc<dyn AdminClient>,
    gate: BrokerGate,
    timeout: Duration,
    clear_partitions: i32,
    clear_replication_factor: i32,
}

impl TopicAdmin {
    pub fn new(client: Arc<dyn AdminClient>, gate: BrokerGate, timeout: Duration) -> Self {
        Self {
            client,
            gate,
            timeout,
            clear_partitions: 1,
            clear_replication_factor: 1,
        }
    }

    /// Shape a topic is recreated with by [`TopicAdmin::clear_topic`]. Defaults to 1/1.
    pub fn with_clear_shape(mut self, partitions: i32, replication_factor: i32) -> Self {
        self.clear_partitions = partitions;
        self.clear_replication_factor = replication_factor;
        self
    }

    /// Creates the topic unless it already exists.
    pub async fn ensure_topic(
        &self,
        name: &str,
        partitions: i32,
        replication_factor: i32,
    ) -> Result<(), RelayError> {
        if !self.gate.is_enabled() {
            debug!(topic = name, "Messaging disabled, skipping topic creation");
            return Ok(());
        }

        let spec = TopicSpec::new(name, partitions, replication_factor);
        match self
            .bounded("create_topic", self.client.create_topic(&spec))
            .await
        {
            Ok(()) => {
                info!(topic = name, partitions, replication_factor, "Topic created");
                Ok(())
            }
            Err(RelayError::Broker(BrokerError::TopicAlreadyExists(_))) => {
                debug!(topic = name, "Topic already exists");
                Ok(())
            }
            Err(e) => {
                error!(topic = name, error = %e, "Exception while creating topic");
                Err(e)
            }
        }
    }

    pub async fn delete_topic(&self, name: &str) -> Result<(), RelayError> {
        if !self.gate.is_enabled() {
            debug!(topic = name, "Messaging disabled, skipping topic deletion");
            return Ok(());
        }

        self.remove(name).await.inspect_err(|e| {
            error!(topic = name, error = %e, "Exception while deleting topic");
        })
    }

    /// Deletes the topic and recreates it with the clear shape.
    ///
    /// All queued records are lost. An absent topic counts as already
    /// deleted. If the delete fails the topic is not recreated; if the
    /// recreate fails the topic is left absent.
    pub async fn clear_topic(&self, name: &str) -> Result<(), RelayError> {
        if !self.gate.is_enabled() {
            debug!(topic = name, "Messaging disabled, skipping topic clear");
            return Ok(());
        }

        match self.remove(name).await {
            Ok(()) => self.await_absence(name).await,
            Err(RelayError::Broker(BrokerError::UnknownTopic(_))) => {
                info!(topic = name, "Topic absent, nothing to delete before recreate");
            }
            Err(e) => {
                error!(topic = name, error = %e, "Delete failed, topic not recreated");
                return Err(e);
            }
        }

        self.ensure_topic(name, self.clear_partitions, self.clear_replication_factor)
            .await
    }

    /// Whether a non-internal topic named `name` exists. Lookup faults are
    /// logged and reported as `false`, as is a closed gate.
    pub async fn topic_exists(&self, name: &str) -> bool {
        if !self.gate.is_enabled() {
            return false;
        }

        match self
            .bounded("list_topics", self.client.list_topics(false))
            .await
        {
            Ok(names) => names.contains(name),
            Err(e) => {
                error!(topic = name, error = %e, "Error checking topic existence");
                false
            }
        }
    }

    async fn remove(&self, name: &str) -> Result<(), RelayError> {
        self.bounded("delete_topic", self.client.delete_topic(name))
            .await?;
        info!(topic = name, "Topic deleted");
        Ok(())
    }

    /// Deletion is acknowledged before metadata converges on some brokers;
    /// wait until the name is gone so the recreate does not collide with it.
    async fn await_absence(&self, name: &str) {
        let poll = async {
            loop {
                match self.client.list_topics(false).await {
                    Ok(names) if !names.contains(name) => return,
                    Ok(_) => {}
                    Err(e) => debug!(topic = name, error = %e, "Metadata lookup failed"),
                }
                tokio::time::sleep(ABSENCE_POLL_INTERVAL).await;
            }
        };
        if tokio::time::timeout(self.timeout, poll).await.is_err() {
            warn!(topic = name, timeout = ?self.timeout, "Topic still listed after delete");
        }
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, BrokerError>>,
    ) -> Result<T, RelayError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(RelayError::from),
            Err(_) => Err(RelayError::Timeout {
                operation,
                timeout: self.timeout,
            }),
        }
    }
}
