use serde::Serialize;
use std::fmt;

/// Negotiation state of the single call a session can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum CallState {
    /// No local media; cannot place or receive calls.
    #[default]
    Idle,
    /// Local media captured, no call in progress.
    Ready,
    /// Offer sent, waiting for the answer and the media path.
    Calling,
    /// Answer sent, waiting for the media path.
    Answering,
    /// Media path established; the duration timer is running.
    Connected,
    /// Teardown in progress. Always resolves within the same step.
    Disconnecting,
}

impl CallState {
    /// True while a remote peer is involved.
    pub fn in_call(self) -> bool {
        matches!(self, Self::Calling | Self::Answering | Self::Connected)
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Ready => "ready",
            Self::Calling => "calling",
            Self::Answering => "answering",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
        };
        f.write_str(name)
    }
}

/// Which side of the offer/answer exchange this session plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum Role {
    #[default]
    None,
    Caller,
    Callee,
}
