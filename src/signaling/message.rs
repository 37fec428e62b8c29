use crate::peer::types::{IceCandidate, SessionDescription};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Types the relay forwards between peers.
pub const RELAYED_TYPES: [&str; 4] = ["offer", "answer", "ice-candidate", "hangup"];

const KNOWN_TYPES: [&str; 6] = ["myId", "peerCount", "offer", "answer", "ice-candidate", "hangup"];

/// Signaling wire message.
///
/// Outbound peer messages carry `to`; the relay adds `from` when it
/// forwards them, so inbound ones carry both.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum SignalMessage {
    #[serde(rename = "myId")]
    MyId { id: String },

    #[serde(rename = "peerCount")]
    PeerCount { count: u64 },

    #[serde(rename = "offer")]
    Offer {
        #[serde(default)]
        to: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
        offer: SessionDescription,
    },

    #[serde(rename = "answer")]
    Answer {
        #[serde(default)]
        to: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
        answer: SessionDescription,
    },

    #[serde(rename = "ice-candidate")]
    Candidate {
        #[serde(default)]
        to: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
        candidate: IceCandidate,
    },

    #[serde(rename = "hangup")]
    Hangup {
        #[serde(default)]
        to: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
    },
}

impl SignalMessage {
    pub fn offer(to: impl Into<String>, offer: SessionDescription) -> Self {
        Self::Offer {
            to: to.into(),
            from: None,
            offer,
        }
    }

    pub fn answer(to: impl Into<String>, answer: SessionDescription) -> Self {
        Self::Answer {
            to: to.into(),
            from: None,
            answer,
        }
    }

    pub fn candidate(to: impl Into<String>, candidate: IceCandidate) -> Self {
        Self::Candidate {
            to: to.into(),
            from: None,
            candidate,
        }
    }

    pub fn hangup(to: impl Into<String>) -> Self {
        Self::Hangup {
            to: to.into(),
            from: None,
        }
    }

    /// Wire `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MyId { .. } => "myId",
            Self::PeerCount { .. } => "peerCount",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::Candidate { .. } => "ice-candidate",
            Self::Hangup { .. } => "hangup",
        }
    }

    /// Sender id stamped by the relay, if any.
    pub fn sender(&self) -> Option<&str> {
        match self {
            Self::Offer { from, .. }
            | Self::Answer { from, .. }
            | Self::Candidate { from, .. }
            | Self::Hangup { from, .. } => from.as_deref(),
            Self::MyId { .. } | Self::PeerCount { .. } => None,
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses one wire message. Unknown types yield `Ok(None)`.
    pub fn decode(text: &str) -> Result<Option<Self>, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;
        let known = value
            .get("type")
            .and_then(Value::as_str)
            .is_some_and(|t| KNOWN_TYPES.contains(&t));
        if !known {
            return Ok(None);
        }
        serde_json::from_value(value).map(Some)
    }
}
