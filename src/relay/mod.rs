//! The `relay` module wires the broker components and the broadcast hub into
//! one service: events published through it reach the broker, and events
//! pulled from the broker reach every live session.

pub mod service;

pub use service::RelayService;

#[cfg(test)]
mod tests;
