//! Error types for the call core, the media primitive and the signaling link.

use crate::session::state::CallState;
use thiserror::Error;

/// Failures surfaced by [`CallSession`](crate::session::CallSession).
///
/// None of these escape the session's event loop; they are turned into a
/// state transition plus a notice for the presentation layer.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("local media unavailable: {0}")]
    LocalMediaUnavailable(String),

    #[error("negotiation failed: {0}")]
    NegotiationFailure(#[from] MediaError),

    #[error("signaling link is down")]
    LinkDown,

    #[error("remote peer hung up")]
    RemoteHangup,

    #[error("connectivity to the remote peer was lost")]
    ConnectivityLost,

    #[error("cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: CallState,
    },

    #[error("remote peer id is required")]
    MissingRemoteId,
}

/// Failures reported by the media-negotiation primitive.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("capture failed: {0}")]
    Capture(String),

    #[error("peer connection setup failed: {0}")]
    Setup(String),

    #[error("create offer failed: {0}")]
    CreateOffer(String),

    #[error("create answer failed: {0}")]
    CreateAnswer(String),

    #[error("set remote description failed: {0}")]
    SetRemoteDescription(String),

    #[error("add candidate failed: {0}")]
    AddCandidate(String),

    #[error("malformed blob: {0}")]
    InvalidBlob(String),
}

/// Failures of the websocket signaling link and the relay server.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid signaling message: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("ICE server {0}: url cannot be empty")]
    EmptyUrl(String),

    #[error("ICE server {0}: TURN servers require username and credential")]
    MissingTurnCredentials(String),
}
