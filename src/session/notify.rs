use crate::session::state::CallState;
use log::debug;
use serde::Serialize;
use tokio::sync::mpsc;

/// What the presentation layer gets to see of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Notification {
    /// Identifier assigned by the relay for this connection.
    LocalId(String),
    PeerCount(u64),
    State(CallState),
    /// Seconds since the call connected, once per second.
    Duration(u64),
    /// Human-readable failure message.
    Notice(String),
}

#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Never blocks; a no-op once the receiver is gone.
    pub fn emit(&self, notification: Notification) {
        debug!("emit {:?}", notification);
        let _ = self.tx.send(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_tagged_event() {
        let json = serde_json::to_value(Notification::State(CallState::Calling)).unwrap();
        assert_eq!(json, serde_json::json!({ "event": "state", "data": "Calling" }));
    }

    #[test]
    fn emit_after_receiver_dropped_is_harmless() {
        let (notifier, rx) = Notifier::channel();
        drop(rx);
        notifier.emit(Notification::PeerCount(1));
    }
}
