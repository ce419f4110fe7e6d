use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::broker::{
    BrokerBackend, BrokerGate, DeliveryHandle, Publisher, RunnerState, SubscriptionBinding,
    SubscriptionRegistry, TopicAdmin,
};
use crate::config::BrokerSettings;
use crate::hub::BroadcastHub;
use crate::message::{ApiResponse, Envelope};
use crate::utils::RelayError;

pub const SEND_OK: &str = "Message sent successfully";
pub const SEND_FAILED: &str = "Error while sending message";
/// The broker did not answer in time; the record may still be appended.
pub const SEND_UNCONFIRMED: &str = "Message delivery not confirmed";
pub const MAY_BE_DELIVERED: &str =
    "the message may still be delivered; retrying can publish it twice";
pub const HEALTHY: &str = "Kafka service is running";

/// Composition root of the relay.
///
/// Owns the topic administrator, the publisher and the subscription of the
/// configured topic, whose runner feeds the [`BroadcastHub`].
pub struct RelayService {
    settings: BrokerSettings,
    gate: BrokerGate,
    admin: TopicAdmin,
    publisher: Publisher,
    subscriptions: SubscriptionRegistry,
    hub: Arc<BroadcastHub>,
}

impl RelayService {
    pub fn new(
        settings: BrokerSettings,
        backend: BrokerBackend,
        gate: BrokerGate,
        hub: Arc<BroadcastHub>,
    ) -> Self {
        let admin = TopicAdmin::new(backend.admin, gate.clone(), settings.admin_timeout())
            .with_clear_shape(settings.clear_partitions, settings.clear_replication_factor);
        let publisher = Publisher::new(backend.producer, gate.clone());
        let subscriptions = SubscriptionRegistry::new(backend.consumer, gate.clone());

        Self {
            settings,
            gate,
            admin,
            publisher,
            subscriptions,
            hub,
        }
    }

    /// The relay's own subscription.
    pub fn binding(&self) -> SubscriptionBinding {
        SubscriptionBinding::new(
            self.settings.topic.clone(),
            self.settings.group_id.clone(),
            self.settings.client_id.clone(),
        )
    }

    /// Ensures the relay topic exists, then starts the runner that feeds the hub.
    pub async fn start(&self) -> Result<(), RelayError> {
        self.admin
            .ensure_topic(
                &self.settings.topic,
                self.settings.partitions,
                self.settings.replication_factor,
            )
            .await?;

        let handler = Arc::clone(&self.hub);
        self.subscriptions.start(self.binding(), handler).await?;
        info!(
            topic = %self.settings.topic,
            enabled = self.gate.is_enabled(),
            "Relay started"
        );
        Ok(())
    }

    /// Publishes `envelope` to the relay topic under a fresh random key and
    /// returns without waiting for the broker.
    pub fn publish<P: Serialize>(&self, envelope: &Envelope<P>) -> Result<DeliveryHandle, RelayError> {
        let key = Uuid::new_v4().to_string();
        self.publisher.publish(&self.settings.topic, &key, envelope)
    }

    /// Publishes and waits for the broker acknowledgment, bounded by the
    /// delivery timeout. Every failure becomes a 400 response.
    ///
    /// A timeout is not a rejection: the record was already enqueued, so the
    /// response says [`SEND_UNCONFIRMED`] rather than [`SEND_FAILED`].
    pub async fn send_message(&self, envelope: Envelope<String>) -> ApiResponse {
        let timeout = self.settings.delivery_timeout();
        let result = match self.publish(&envelope) {
            Ok(handle) => tokio::time::timeout(timeout, handle)
                .await
                .unwrap_or_else(|_| {
                    Err(RelayError::Timeout {
                        operation: "publish",
                        timeout,
                    })
                }),
            Err(e) => Err(e),
        };

        match result {
            Ok(_) => ApiResponse::success(SEND_OK, None),
            Err(e @ RelayError::Timeout { .. }) => {
                warn!(error = %e, "Message delivery not confirmed");
                ApiResponse::error(SEND_UNCONFIRMED, vec![e.to_string(), MAY_BE_DELIVERED.to_string()])
            }
            Err(e) => {
                error!(error = %e, kind = e.as_label(), "Error while sending message");
                ApiResponse::error(SEND_FAILED, vec![e.to_string()])
            }
        }
    }

    pub fn health(&self) -> ApiResponse {
        ApiResponse::success(HEALTHY, None)
    }

    pub async fn create_topic(
        &self,
        name: &str,
        partitions: i32,
        replication_factor: i32,
    ) -> Result<(), RelayError> {
        self.admin
            .ensure_topic(name, partitions, replication_factor)
            .await
    }

    pub async fn delete_topic(&self, name: &str) -> Result<(), RelayError> {
        self.admin.delete_topic(name).await
    }

    /// Destructive: every unread record of `name` is lost.
    pub async fn clear_topic(&self, name: &str) -> Result<(), RelayError> {
        self.admin.clear_topic(name).await
    }

    pub async fn topic_exists(&self, name: &str) -> bool {
        self.admin.topic_exists(name).await
    }

    /// State of the relay's subscription; `Stopped` if it never started.
    pub async fn subscription_state(&self) -> RunnerState {
        match self.subscriptions.get(&self.binding()).await {
            Some(runner) => runner.state(),
            None => RunnerState::Stopped,
        }
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn gate(&self) -> &BrokerGate {
        &self.gate
    }

    pub fn settings(&self) -> &BrokerSettings {
        &self.settings
    }

    /// Stops every subscription. Sessions are left to the transport.
    pub async fn shutdown(&self) {
        self.subscriptions.stop_all().await;
        info!("Relay stopped");
    }
}
