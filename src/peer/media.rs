//! Seams to the external media-negotiation primitive.
//!
//! The call core only sequences *when* descriptions and candidates are
//! created and applied. Everything behind these traits (capture, codecs,
//! NAT traversal) belongs to the implementation.

use crate::error::MediaError;
use crate::peer::types::{IceCandidate, MediaEvent, MediaSessionId, SessionDescription};
use crate::session::SessionEvent;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Factory for media sessions; also owns local capture.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Captures local audio. Must succeed before any call can be placed or received.
    async fn acquire_local_media(&mut self) -> Result<(), MediaError>;

    /// Stops local capture.
    async fn release_local_media(&mut self);

    /// Creates a fresh session carrying the local audio. Events it raises
    /// are delivered through `events`, tagged with `id`.
    async fn open_session(
        &self,
        id: MediaSessionId,
        events: MediaEventSink,
    ) -> Result<Box<dyn MediaSession>, MediaError>;
}

/// One point-to-point negotiation, exclusively owned by the call session.
#[async_trait]
pub trait MediaSession: Send + Sync {
    /// Creates an offer and installs it as the local description.
    async fn create_offer(&self) -> Result<SessionDescription, MediaError>;

    /// Creates an answer and installs it as the local description.
    async fn create_answer(&self) -> Result<SessionDescription, MediaError>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), MediaError>;

    async fn add_candidate(&self, candidate: IceCandidate) -> Result<(), MediaError>;

    /// Stops the local tracks and closes the transport.
    async fn close(&self);
}

/// Delivers media events into the session's event queue.
#[derive(Clone)]
pub struct MediaEventSink {
    id: MediaSessionId,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl MediaEventSink {
    pub fn new(id: MediaSessionId, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> MediaSessionId {
        self.id
    }

    /// Returns false once the session's event loop is gone.
    pub fn emit(&self, event: MediaEvent) -> bool {
        self.tx
            .send(SessionEvent::Media {
                session: self.id,
                event,
            })
            .is_ok()
    }
}
