//! Envelope codec
//!
//! Envelopes travel as JSON bytes, both to the broker and to live sessions.
//! The `try_*` functions report faults; [`encode`] and [`decode`] never fail
//! and instead log the fault and return a sentinel:
//! - a zero-length buffer for a failed encode,
//! - a blank envelope (see [`Envelope::is_blank`]) for a failed decode.
//!
//! Unknown fields are skipped while decoding, so producers may add fields
//! without breaking older consumers.

use serde::Serialize;
use serde::de::{self, DeserializeOwned, Unexpected};
use serde_json::Value;
use thiserror::Error;
use tracing::error;

use super::envelope::Envelope;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("error on serializing message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("error on deserializing message: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("payload does not match the requested type: {0}")]
    Payload(#[source] serde_json::Error),
}

pub fn try_encode<P: Serialize>(envelope: &Envelope<P>) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(envelope).map_err(CodecError::Encode)
}

/// Only a JSON object is an envelope; arrays and scalars are rejected even
/// when their elements would line up with the envelope fields.
pub fn try_decode<P: DeserializeOwned>(bytes: &[u8]) -> Result<Envelope<P>, CodecError> {
    let value: Value = serde_json::from_slice(bytes).map_err(CodecError::Decode)?;
    if !value.is_object() {
        let unexpected = match &value {
            Value::Array(_) => Unexpected::Seq,
            Value::String(s) => Unexpected::Str(s.as_str()),
            Value::Bool(b) => Unexpected::Bool(*b),
            Value::Null => Unexpected::Unit,
            _ => Unexpected::Other("number"),
        };
        return Err(CodecError::Decode(de::Error::invalid_type(
            unexpected,
            &"an envelope object",
        )));
    }
    serde_json::from_value(value).map_err(CodecError::Decode)
}

/// Encodes an envelope, returning an empty buffer on failure.
pub fn encode<P: Serialize>(envelope: &Envelope<P>) -> Vec<u8> {
    match try_encode(envelope) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(error = %e, message_id = ?envelope.message_id, "The message type not supported");
            Vec::new()
        }
    }
}

/// Decodes an envelope, returning a blank envelope on failure.
pub fn decode<P: DeserializeOwned>(bytes: &[u8]) -> Envelope<P> {
    match try_decode(bytes) {
        Ok(envelope) => envelope,
        Err(e) => {
            error!(error = %e, len = bytes.len(), "The message type not supported");
            Envelope::default()
        }
    }
}
