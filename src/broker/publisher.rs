//! Publishing
//!
//! [`Publisher::publish`] hands a keyed envelope to the broker and returns at
//! once. The broker acknowledgment arrives later through the returned
//! [`DeliveryHandle`], which callers may await, attach a callback to, or drop.
//! A failed delivery is always logged, whether or not anyone awaits it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

use super::backend::{BrokerError, DeliveryReport, OutboundRecord, ProducerClient};
use super::gate::BrokerGate;
use crate::message::{Envelope, try_encode};
use crate::utils::RelayError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered(DeliveryReport),
    /// Messaging was disabled; nothing was sent.
    Suppressed,
}

type DeliveryResult = Result<DeliveryReport, BrokerError>;

/// Pending broker acknowledgment for one published record.
#[derive(Debug)]
pub struct DeliveryHandle {
    pending: Option<oneshot::Receiver<DeliveryResult>>,
}

impl DeliveryHandle {
    fn suppressed() -> Self {
        Self { pending: None }
    }

    /// Runs `callback` with the delivery result once the broker answers.
    pub fn on_complete<F>(self, callback: F)
    where
        F: FnOnce(Result<DeliveryOutcome, RelayError>) + Send + 'static,
    {
        tokio::spawn(async move { callback(self.await) });
    }
}

impl Future for DeliveryHandle {
    type Output = Result<DeliveryOutcome, RelayError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Some(pending) = self.pending.as_mut() else {
            return Poll::Ready(Ok(DeliveryOutcome::Suppressed));
        };
        Pin::new(pending).poll(cx).map(|received| match received {
            Ok(Ok(report)) => Ok(DeliveryOutcome::Delivered(report)),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(RelayError::DeliveryAbandoned),
        })
    }
}

pub struct Publisher {
    producer: Arc<dyn ProducerClient>,
    gate: BrokerGate,
}

impl Publisher {
    pub fn new(producer: Arc<dyn ProducerClient>, gate: BrokerGate) -> Self {
        Self { producer, gate }
    }

    /// Submits `envelope` under `key` to `topic` without waiting for the broker.
    ///
    /// Must be called from within a tokio runtime. Records sharing a key keep
    /// their relative order; nothing else is ordered.
    pub fn publish<P: Serialize>(
        &self,
        topic: &str,
        key: &str,
        envelope: &Envelope<P>,
    ) -> Result<DeliveryHandle, RelayError> {
        if !self.gate.is_enabled() {
            debug!(topic, key, "Messaging disabled, publish suppressed");
            return Ok(DeliveryHandle::suppressed());
        }

        let payload = try_encode(envelope).inspect_err(|e| {
            error!(topic, key, error = %e, "Envelope could not be encoded");
        })?;
        let record = OutboundRecord {
            topic: topic.to_string(),
            key: key.to_string(),
            payload,
        };

        let delivery = self.producer.send(record);
        let (topic, key) = (topic.to_string(), key.to_string());
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let result = delivery.await;
            match &result {
                Ok(report) => debug!(
                    topic = %report.topic,
                    partition = report.partition,
                    offset = report.offset,
                    "Record delivered"
                ),
                Err(e) => warn!(%topic, %key, error = %e, "Record delivery failed"),
            }
            let _ = tx.send(result);
        });

        Ok(DeliveryHandle { pending: Some(rx) })
    }
}
