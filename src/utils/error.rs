//! The `error` module defines the crate-level error type.
//!
//! Broker-client faults are modelled by [`BrokerError`](crate::broker::BrokerError)
//! and converted into [`RelayError`] at component boundaries. None of these
//! ever cross the HTTP boundary raw: the relay service turns them into a
//! structured [`ApiResponse`](crate::message::ApiResponse).

use std::time::Duration;

use thiserror::Error;

use crate::broker::{BrokerError, SubscriptionBinding};
use crate::config::BackendKind;
use crate::message::CodecError;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("envelope codec failure: {0}")]
    Codec(#[from] CodecError),

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("subscription {0} is already running")]
    AlreadyRunning(SubscriptionBinding),

    #[error("delivery result was dropped before the broker answered")]
    DeliveryAbandoned,

    #[error("the {0} backend is not compiled into this build")]
    BackendUnavailable(BackendKind),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RelayError::Broker(_) => "broker",
            RelayError::Codec(_) => "codec",
            RelayError::Timeout { .. } => "timeout",
            RelayError::AlreadyRunning(_) => "already_running",
            RelayError::DeliveryAbandoned => "delivery_abandoned",
            RelayError::BackendUnavailable(_) => "backend_unavailable",
            RelayError::Config(_) => "config",
            RelayError::Io(_) => "io",
        }
    }
}
