//! The `broker` module is the relay's client side of the message broker.
//!
//! - `backend`: traits the broker is reached through, plus shared record types.
//! - `gate`: the global messaging switch.
//! - `connect`: picks the configured backend for the binary.
//! - `admin`: topic lifecycle ([`TopicAdmin`]).
//! - `publisher`: fire-and-forget publishing ([`Publisher`]).
//! - `subscription`: long-lived pull loops ([`SubscriptionRunner`]).
//! - `memory`: an in-memory broker implementing the backend traits.
//! - `kafka`: the `rdkafka` backend, behind the `kafka` feature.

pub mod admin;
pub mod backend;
pub mod connect;
pub mod gate;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;
pub mod publisher;
pub mod subscription;

pub use admin::TopicAdmin;
pub use backend::{
    AdminClient, BrokerBackend, BrokerError, BrokerRecord, ConsumerConnector, DeliveryFuture,
    DeliveryReport, OutboundRecord, ProducerClient, RecordStream, SubscriptionBinding, TopicSpec,
};
pub use connect::connect;
pub use gate::BrokerGate;
#[cfg(feature = "kafka")]
pub use kafka::KafkaBackend;
pub use memory::MemoryBroker;
pub use publisher::{DeliveryHandle, DeliveryOutcome, Publisher};
pub use subscription::{EnvelopeHandler, RunnerState, SubscriptionRegistry, SubscriptionRunner};
