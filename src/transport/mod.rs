//! The `transport` module is responsible for network communication with
//! publishers and live sessions.
//!
//! - `http`: the publish/health API in front of the [`RelayService`](crate::relay::RelayService).
//! - `websocket`: the push-only live-session server; every connection is a
//!   [`Client`](crate::client::Client) registered with the broadcast hub.

pub mod http;
pub mod websocket;

pub use http::{router, serve_http, start_http_server};
pub use websocket::{serve_websocket, start_websocket_server};

#[cfg(test)]
mod tests;
