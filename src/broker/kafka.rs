//! Kafka backend (`kafka` feature)
//!
//! Implements the broker-client traits on top of `rdkafka`: an admin client
//! for topic lifecycle and metadata, one shared `FutureProducer`, and a fresh
//! `StreamConsumer` per subscription. Connection-level retries and backoff
//! are left to librdkafka and driven by [`BrokerSettings`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future;
use rdkafka::admin::{AdminClient as KafkaAdmin, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use tracing::debug;

use super::backend::{
    AdminClient, BrokerBackend, BrokerError, BrokerRecord, ConsumerConnector, DeliveryFuture,
    DeliveryReport, OutboundRecord, ProducerClient, RecordStream, SubscriptionBinding, TopicSpec,
};
use crate::config::BrokerSettings;

const INTERNAL_PREFIX: &str = "__";

fn from_code(name: &str, code: RDKafkaErrorCode) -> BrokerError {
    match code {
        RDKafkaErrorCode::TopicAlreadyExists => BrokerError::TopicAlreadyExists(name.to_string()),
        RDKafkaErrorCode::UnknownTopicOrPartition | RDKafkaErrorCode::UnknownTopic => {
            BrokerError::UnknownTopic(name.to_string())
        }
        RDKafkaErrorCode::InvalidReplicationFactor | RDKafkaErrorCode::InvalidPartitions => {
            BrokerError::InvalidTopic {
                topic: name.to_string(),
                reason: code.to_string(),
            }
        }
        RDKafkaErrorCode::Fatal => BrokerError::Fatal(code.to_string()),
        other => BrokerError::Transport(other.to_string()),
    }
}

fn from_kafka(error: KafkaError) -> BrokerError {
    match error.rdkafka_error_code() {
        Some(RDKafkaErrorCode::Fatal) => BrokerError::Fatal(error.to_string()),
        _ => BrokerError::Transport(error.to_string()),
    }
}

pub struct KafkaBackend;

impl KafkaBackend {
    /// Builds admin, producer and consumer clients for `settings.bootstrap_servers`.
    pub fn connect(settings: &BrokerSettings) -> Result<BrokerBackend, BrokerError> {
        let mut base = ClientConfig::new();
        base.set("bootstrap.servers", &settings.bootstrap_servers)
            .set("retry.backoff.ms", settings.retry_backoff_ms.to_string());

        let admin: KafkaAdmin<DefaultClientContext> = base
            .clone()
            .set("retries", "1")
            .create()
            .map_err(from_kafka)?;

        let producer: FutureProducer = base
            .clone()
            .set("retries", "1")
            .set("message.timeout.ms", settings.delivery_timeout_ms.to_string())
            .create()
            .map_err(from_kafka)?;

        let mut consumer_config = base;
        consumer_config
            .set("auto.offset.reset", &settings.auto_offset_reset)
            .set("enable.auto.commit", "true");

        let timeout = settings.admin_timeout();
        Ok(BrokerBackend {
            admin: Arc::new(KafkaAdminClient {
                admin: Arc::new(admin),
                timeout,
            }),
            producer: Arc::new(KafkaProducer { producer }),
            consumer: Arc::new(KafkaConsumerConnector {
                config: consumer_config,
            }),
        })
    }
}

struct KafkaAdminClient {
    admin: Arc<KafkaAdmin<DefaultClientContext>>,
    timeout: Duration,
}

impl KafkaAdminClient {
    fn options(&self) -> AdminOptions {
        AdminOptions::new().operation_timeout(Some(self.timeout))
    }
}

#[async_trait]
impl AdminClient for KafkaAdminClient {
    async fn create_topic(&self, spec: &TopicSpec) -> Result<(), BrokerError> {
        let topic = NewTopic::new(
            &spec.name,
            spec.partitions,
            TopicReplication::Fixed(spec.replication_factor),
        );
        let results = self
            .admin
            .create_topics(&[topic], &self.options())
            .await
            .map_err(from_kafka)?;
        for result in results {
            result.map_err(|(name, code)| from_code(&name, code))?;
        }
        Ok(())
    }

    async fn delete_topic(&self, name: &str) -> Result<(), BrokerError> {
        let results = self
            .admin
            .delete_topics(&[name], &self.options())
            .await
            .map_err(from_kafka)?;
        for result in results {
            result.map_err(|(name, code)| from_code(&name, code))?;
        }
        Ok(())
    }

    async fn list_topics(&self, include_internal: bool) -> Result<HashSet<String>, BrokerError> {
        let admin = Arc::clone(&self.admin);
        let timeout = self.timeout;
        let metadata = tokio::task::spawn_blocking(move || {
            admin.inner().fetch_metadata(None, Timeout::After(timeout))
        })
        .await
        .map_err(|e| BrokerError::Transport(e.to_string()))?
        .map_err(from_kafka)?;

        Ok(metadata
            .topics()
            .iter()
            .map(|topic| topic.name())
            .filter(|name| include_internal || !name.starts_with(INTERNAL_PREFIX))
            .map(str::to_string)
            .collect())
    }
}

struct KafkaProducer {
    producer: FutureProducer,
}

impl ProducerClient for KafkaProducer {
    fn send(&self, record: OutboundRecord) -> DeliveryFuture {
        let future_record = FutureRecord::to(&record.topic)
            .key(record.key.as_str())
            .payload(&record.payload);
        let delivery = match self.producer.send_result(future_record) {
            Ok(delivery) => delivery,
            Err((e, _)) => return future::ready(Err(from_kafka(e))).boxed(),
        };

        let topic = record.topic;
        async move {
            match delivery.await {
                Ok(Ok((partition, offset))) => Ok(DeliveryReport {
                    topic,
                    partition,
                    offset,
                }),
                Ok(Err((e, _))) => Err(from_kafka(e)),
                Err(_) => Err(BrokerError::Transport("delivery canceled".to_string())),
            }
        }
        .boxed()
    }
}

struct KafkaConsumerConnector {
    config: ClientConfig,
}

#[async_trait]
impl ConsumerConnector for KafkaConsumerConnector {
    async fn subscribe(
        &self,
        binding: &SubscriptionBinding,
    ) -> Result<Box<dyn RecordStream>, BrokerError> {
        let consumer: StreamConsumer = self
            .config
            .clone()
            .set("group.id", &binding.group_id)
            .set("client.id", &binding.client_id)
            .create()
            .map_err(from_kafka)?;
        consumer
            .subscribe(&[binding.topic.as_str()])
            .map_err(from_kafka)?;
        debug!(%binding, "Kafka consumer subscribed");
        Ok(Box::new(KafkaStream { consumer }))
    }
}

struct KafkaStream {
    consumer: StreamConsumer,
}

#[async_trait]
impl RecordStream for KafkaStream {
    async fn next_record(&mut self) -> Option<Result<BrokerRecord, BrokerError>> {
        let record = self.consumer.recv().await.map_err(from_kafka).map(|message| BrokerRecord {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            key: message
                .key()
                .map(|key| String::from_utf8_lossy(key).into_owned()),
            payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        });
        Some(record)
    }

    async fn close(&mut self) {
        self.consumer.unsubscribe();
    }
}
