//! The `client` module defines a connected WebSocket client.
//!
//! [`Client`] is the [`Session`](crate::hub::Session) implementation the
//! WebSocket transport registers with the broadcast hub for every connection.

pub mod pubsub_client;
pub use pubsub_client::Client;
