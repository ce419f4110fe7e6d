//! Backend selection for the binary.

use tracing::{info, warn};

use super::backend::BrokerBackend;
use super::memory::MemoryBroker;
use crate::config::{BackendKind, BrokerSettings};
use crate::utils::error::RelayError;

/// Builds the backend named by `settings.backend`.
///
/// Asking for Kafka from a build without the `kafka` feature is an error;
/// the in-memory broker is never substituted silently.
pub fn connect(settings: &BrokerSettings) -> Result<BrokerBackend, RelayError> {
    match settings.backend {
        BackendKind::Memory => {
            warn!("Relaying through the in-memory broker; records are not shared across processes");
            Ok(MemoryBroker::new().backend())
        }
        BackendKind::Kafka => connect_kafka(settings),
    }
}

#[cfg(feature = "kafka")]
fn connect_kafka(settings: &BrokerSettings) -> Result<BrokerBackend, RelayError> {
    info!(bootstrap_servers = %settings.bootstrap_servers, "Using Kafka backend");
    Ok(super::kafka::KafkaBackend::connect(settings)?)
}

#[cfg(not(feature = "kafka"))]
fn connect_kafka(settings: &BrokerSettings) -> Result<BrokerBackend, RelayError> {
    info!(
        bootstrap_servers = %settings.bootstrap_servers,
        "Kafka backend requested but the `kafka` feature is off"
    );
    Err(RelayError::BackendUnavailable(BackendKind::Kafka))
}
