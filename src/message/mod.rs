//! The `message` module defines what travels through the relay.
//!
//! - `envelope`: the generic [`Envelope`] wrapper (metadata + business payload).
//! - `codec`: byte-level encoding of envelopes for the broker and for live sessions.
//! - `response`: the [`ApiResponse`] status envelope returned to publishers.

pub mod codec;
pub mod envelope;
pub mod response;

pub use codec::{CodecError, decode, encode, try_decode, try_encode};
pub use envelope::{Envelope, WIRE_TIME_FORMAT};
pub use response::ApiResponse;
