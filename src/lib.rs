//! # EventRelay
//!
//! `eventrelay` relays events published over HTTP through a partitioned
//! message broker to every connected WebSocket session, and manages the
//! broker topic those events flow through.
//!
//! ## Core Modules
//!
//! The library is structured into several modules, each with a distinct responsibility:
//!
//! - `message`: The envelope every event travels in, its JSON codec, and the API response shape.
//! - `broker`: Broker client side: topic administration, publishing, and subscription runners,
//!   over an in-memory backend or Kafka (`kafka` feature).
//! - `hub`: The registry of live sessions and the broadcast fan-out.
//! - `client`: Represents a connected WebSocket client.
//! - `relay`: Wires the broker components and the hub into one service.
//! - `transport`: The HTTP API and the WebSocket server.
//! - `config`: Handles loading and managing configuration.
//! - `utils`: Contains shared utilities, such as error handling and logging.

pub mod broker;
pub mod client;
pub mod config;
pub mod hub;
pub mod message;
pub mod relay;
pub mod transport;
pub mod utils;
