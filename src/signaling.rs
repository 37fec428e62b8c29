//! Signaling link between the call core and the relay.
//!
//! Messages are JSON objects tagged by `type`, one per websocket text frame.
//! Description and candidate blobs are carried opaquely.

pub mod link;
pub mod message;
pub mod websocket;

pub use link::{LinkEvents, LinkId, LinkState, SignalingLink};
pub use message::SignalMessage;
pub use websocket::connect;
