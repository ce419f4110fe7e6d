//! The `hub` module fans decoded envelopes out to connected WebSocket sessions.
//!
//! - `session`: the [`Session`] trait a connection implements to receive frames.
//! - `broadcast`: [`BroadcastHub`], the registry of sessions and the broadcast itself.

pub mod broadcast;
pub mod session;

pub use broadcast::{BroadcastHub, BroadcastReport};
pub use session::{Session, SessionError};
