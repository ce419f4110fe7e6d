use std::collections::HashMap;
use std::convert::Infallible;

use chrono::{NaiveDateTime, SubsecRound, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::codec::CodecError;

/// Textual pattern used for `timestamp` and `expirationTime` in both directions.
pub const WIRE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// The unit of transport between producers, the broker and live sessions.
///
/// `P` is the business payload type. On the wire the payload is untyped JSON,
/// so anything that went through the codec comes back as
/// `Envelope<serde_json::Value>` unless the caller re-types it with
/// [`Envelope::into_typed`], typically after checking `kind` and `version`.
///
/// Every field is optional. Absent fields are written as `null`, and unknown
/// fields are ignored when decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<P = Value> {
    /// Identifier used for dedup and tracing. Carried, never checked for uniqueness.
    pub message_id: Option<String>,
    pub correlation_id: Option<String>,
    /// Category of the message, e.g. `EVENT`, `COMMAND`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Action carried by the message, e.g. `CREATE`, `NOTIFY`.
    pub operation: Option<String>,
    pub source: Option<String>,
    /// `None` means the outcome is not known yet.
    pub success: Option<bool>,
    pub version: Option<String>,
    /// Advisory only; the relay does not reorder by priority.
    pub priority: Option<String>,
    pub message_log: Option<String>,
    #[serde(default, with = "wire_time")]
    pub timestamp: Option<NaiveDateTime>,
    #[serde(default, with = "wire_time")]
    pub expiration_time: Option<NaiveDateTime>,
    pub headers: Option<HashMap<String, String>>,
    pub payload: Option<P>,
}

impl<P> Default for Envelope<P> {
    fn default() -> Self {
        Self {
            message_id: None,
            correlation_id: None,
            kind: None,
            operation: None,
            source: None,
            success: None,
            version: None,
            priority: None,
            message_log: None,
            timestamp: None,
            expiration_time: None,
            headers: None,
            payload: None,
        }
    }
}

impl<P> Envelope<P> {
    /// Creates an envelope with a fresh message id, the current time
    /// (whole seconds, UTC) and the given payload.
    pub fn new(payload: P) -> Self {
        Self {
            message_id: Some(Uuid::new_v4().to_string()),
            timestamp: Some(Utc::now().naive_utc().trunc_subsecs(0)),
            payload: Some(payload),
            ..Self::default()
        }
    }

    /// True for the all-empty envelope the codec hands back on a failed
    /// decode. Such an envelope must not be treated as a real message.
    pub fn is_blank(&self) -> bool {
        self.message_id.is_none()
            && self.correlation_id.is_none()
            && self.kind.is_none()
            && self.operation.is_none()
            && self.source.is_none()
            && self.success.is_none()
            && self.version.is_none()
            && self.priority.is_none()
            && self.message_log.is_none()
            && self.timestamp.is_none()
            && self.expiration_time.is_none()
            && self.headers.is_none()
            && self.payload.is_none()
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .as_ref()
            .and_then(|h| h.get(key))
            .map(String::as_str)
    }

    /// Keeps every metadata field and converts the payload with `f`.
    pub fn map_payload<Q, F>(self, f: F) -> Envelope<Q>
    where
        F: FnOnce(P) -> Q,
    {
        match self.try_map_payload(|p| Ok::<Q, Infallible>(f(p))) {
            Ok(envelope) => envelope,
            Err(never) => match never {},
        }
    }

    /// Fallible form of [`Envelope::map_payload`].
    pub fn try_map_payload<Q, E, F>(self, f: F) -> Result<Envelope<Q>, E>
    where
        F: FnOnce(P) -> Result<Q, E>,
    {
        Ok(Envelope {
            message_id: self.message_id,
            correlation_id: self.correlation_id,
            kind: self.kind,
            operation: self.operation,
            source: self.source,
            success: self.success,
            version: self.version,
            priority: self.priority,
            message_log: self.message_log,
            timestamp: self.timestamp,
            expiration_time: self.expiration_time,
            headers: self.headers,
            payload: self.payload.map(f).transpose()?,
        })
    }
}

impl Envelope<Value> {
    /// Re-types an untyped payload. Metadata is carried over unchanged.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<Envelope<T>, CodecError> {
        self.try_map_payload(|value| serde_json::from_value(value).map_err(CodecError::Payload))
    }
}

mod wire_time {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de};

    use super::WIRE_TIME_FORMAT;

    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(time) => serializer.collect_str(&time.format(WIRE_TIME_FORMAT)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| NaiveDateTime::parse_from_str(&raw, WIRE_TIME_FORMAT).map_err(de::Error::custom))
            .transpose()
    }
}
