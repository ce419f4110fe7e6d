use std::fmt;
use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration settings for the relay.
///
/// Includes settings for the HTTP/WebSocket servers, the message broker and logging.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub logging: LoggingSettings,
}

/// Configuration settings for the servers.
///
/// `port` serves the HTTP API, `ws_port` the WebSocket broadcast endpoint.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub ws_port: u16,
}

impl ServerSettings {
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn ws_addr(&self) -> String {
        format!("{}:{}", self.host, self.ws_port)
    }
}

/// Which broker implementation the binary relays through.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Kafka,
    /// Process-local broker; nothing is shared with other relay instances.
    Memory,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Kafka => f.write_str("kafka"),
            BackendKind::Memory => f.write_str("memory"),
        }
    }
}

/// Configuration settings for the broker connection.
///
/// `backend` defaults to `kafka`; `memory` has to be asked for.
/// `topic`, `group_id` and `client_id` name the relay's own subscription.
/// `partitions`/`replication_factor` shape the topic created at startup,
/// `clear_partitions`/`clear_replication_factor` the topic recreated by a clear.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BrokerSettings {
    pub backend: BackendKind,
    pub enabled: bool,
    pub bootstrap_servers: String,
    pub topic: String,
    pub group_id: String,
    pub client_id: String,
    pub partitions: i32,
    pub replication_factor: i32,
    pub clear_partitions: i32,
    pub clear_replication_factor: i32,
    pub admin_timeout_ms: u64,
    pub delivery_timeout_ms: u64,
    pub retry_backoff_ms: u64,
    pub auto_offset_reset: String,
}

impl BrokerSettings {
    pub fn admin_timeout(&self) -> Duration {
        Duration::from_millis(self.admin_timeout_ms)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub ws_port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialBrokerSettings {
    pub backend: Option<BackendKind>,
    pub enabled: Option<bool>,
    pub bootstrap_servers: Option<String>,
    pub topic: Option<String>,
    pub group_id: Option<String>,
    pub client_id: Option<String>,
    pub partitions: Option<i32>,
    pub replication_factor: Option<i32>,
    pub clear_partitions: Option<i32>,
    pub clear_replication_factor: Option<i32>,
    pub admin_timeout_ms: Option<u64>,
    pub delivery_timeout_ms: Option<u64>,
    pub retry_backoff_ms: Option<u64>,
    pub auto_offset_reset: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl Settings {
    /// Fills every value missing from `partial` with its default.
    pub fn merge(partial: PartialSettings) -> Self {
        let default = Settings::default();
        let server = partial.server.unwrap_or_default();
        let broker = partial.broker.unwrap_or_default();
        let logging = partial.logging.unwrap_or_default();

        Settings {
            server: ServerSettings {
                host: server.host.unwrap_or(default.server.host),
                port: server.port.unwrap_or(default.server.port),
                ws_port: server.ws_port.unwrap_or(default.server.ws_port),
            },
            broker: BrokerSettings {
                backend: broker.backend.unwrap_or(default.broker.backend),
                enabled: broker.enabled.unwrap_or(default.broker.enabled),
                bootstrap_servers: broker
                    .bootstrap_servers
                    .unwrap_or(default.broker.bootstrap_servers),
                topic: broker.topic.unwrap_or(default.broker.topic),
                group_id: broker.group_id.unwrap_or(default.broker.group_id),
                client_id: broker.client_id.unwrap_or(default.broker.client_id),
                partitions: broker.partitions.unwrap_or(default.broker.partitions),
                replication_factor: broker
                    .replication_factor
                    .unwrap_or(default.broker.replication_factor),
                clear_partitions: broker
                    .clear_partitions
                    .unwrap_or(default.broker.clear_partitions),
                clear_replication_factor: broker
                    .clear_replication_factor
                    .unwrap_or(default.broker.clear_replication_factor),
                admin_timeout_ms: broker
                    .admin_timeout_ms
                    .unwrap_or(default.broker.admin_timeout_ms),
                delivery_timeout_ms: broker
                    .delivery_timeout_ms
                    .unwrap_or(default.broker.delivery_timeout_ms),
                retry_backoff_ms: broker
                    .retry_backoff_ms
                    .unwrap_or(default.broker.retry_backoff_ms),
                auto_offset_reset: broker
                    .auto_offset_reset
                    .unwrap_or(default.broker.auto_offset_reset),
            },
            logging: LoggingSettings {
                level: logging.level.unwrap_or(default.logging.level),
            },
        }
    }
}

/// Provides default values for `Settings`.
///
/// Ensures the relay has sensible defaults if no configuration is provided.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
                ws_port: 8081,
            },
            broker: BrokerSettings {
                backend: BackendKind::Kafka,
                enabled: true,
                bootstrap_servers: "localhost:9092".to_string(),
                topic: "notifications".to_string(),
                group_id: "notifications".to_string(),
                client_id: "eventrelay".to_string(),
                partitions: 3,
                replication_factor: 1,
                clear_partitions: 1,
                clear_replication_factor: 1,
                admin_timeout_ms: 10_000,
                delivery_timeout_ms: 5_000,
                retry_backoff_ms: 1_000,
                auto_offset_reset: "latest".to_string(),
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}
