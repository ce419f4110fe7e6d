//! Broker-client seam
//!
//! The relay is a client of an external partitioned log. Everything it needs
//! from that log is expressed by three traits:
//! - [`AdminClient`]: topic metadata and lifecycle,
//! - [`ProducerClient`]: appending keyed records,
//! - [`ConsumerConnector`] / [`RecordStream`]: pulling records for a consumer group.
//!
//! [`BrokerBackend`] bundles one implementation of each so components can be
//! wired against Kafka or against the in-memory broker used in tests.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("topic '{0}' already exists")]
    TopicAlreadyExists(String),

    #[error("unknown topic '{0}'")]
    UnknownTopic(String),

    #[error("invalid topic '{topic}': {reason}")]
    InvalidTopic { topic: String, reason: String },

    #[error("broker transport error: {0}")]
    Transport(String),

    #[error("unrecoverable broker error: {0}")]
    Fatal(String),

    #[error("broker client is closed")]
    Closed,
}

impl BrokerError {
    /// Fatal errors end a subscription; everything else is retried by the
    /// broker client itself.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BrokerError::Fatal(_) | BrokerError::Closed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSpec {
    pub name: String,
    pub partitions: i32,
    pub replication_factor: i32,
}

impl TopicSpec {
    pub fn new(name: impl Into<String>, partitions: i32, replication_factor: i32) -> Self {
        Self {
            name: name.into(),
            partitions,
            replication_factor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRecord {
    pub topic: String,
    pub key: String,
    pub payload: Vec<u8>,
}

/// Broker acknowledgment for a single appended record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

/// A (topic, consumer group, client identity) triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionBinding {
    pub topic: String,
    pub group_id: String,
    pub client_id: String,
}

impl SubscriptionBinding {
    pub fn new(
        topic: impl Into<String>,
        group_id: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            group_id: group_id.into(),
            client_id: client_id.into(),
        }
    }
}

impl fmt::Display for SubscriptionBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.topic, self.group_id, self.client_id)
    }
}

#[async_trait]
pub trait AdminClient: Send + Sync {
    /// Fails with [`BrokerError::TopicAlreadyExists`] if the name is taken.
    async fn create_topic(&self, spec: &TopicSpec) -> Result<(), BrokerError>;

    /// Fails with [`BrokerError::UnknownTopic`] if there is nothing to delete.
    async fn delete_topic(&self, name: &str) -> Result<(), BrokerError>;

    async fn list_topics(&self, include_internal: bool) -> Result<HashSet<String>, BrokerError>;
}

/// Resolves once the broker has acknowledged (or rejected) a record.
pub type DeliveryFuture = BoxFuture<'static, Result<DeliveryReport, BrokerError>>;

pub trait ProducerClient: Send + Sync {
    /// Enqueues `record` before returning, so records sent one after another
    /// from the same caller keep their order within a partition.
    fn send(&self, record: OutboundRecord) -> DeliveryFuture;
}

#[async_trait]
pub trait ConsumerConnector: Send + Sync {
    /// Joins the binding's consumer group and returns a fresh stream.
    async fn subscribe(
        &self,
        binding: &SubscriptionBinding,
    ) -> Result<Box<dyn RecordStream>, BrokerError>;
}

#[async_trait]
pub trait RecordStream: Send {
    /// Waits for the next record. `None` means the stream has ended for good.
    ///
    /// Implementations must be cancel safe: dropping the future before it
    /// completes must not lose a record.
    async fn next_record(&mut self) -> Option<Result<BrokerRecord, BrokerError>>;

    /// Leaves the consumer group and releases broker-side resources.
    async fn close(&mut self);
}

#[derive(Clone)]
pub struct BrokerBackend {
    pub admin: Arc<dyn AdminClient>,
    pub producer: Arc<dyn ProducerClient>,
    pub consumer: Arc<dyn ConsumerConnector>,
}

impl fmt::Debug for BrokerBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerBackend").finish_non_exhaustive()
    }
}
