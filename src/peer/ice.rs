use crate::peer::media::MediaSession;
use crate::peer::types::IceCandidate;
use log::{debug, warn};

/// Remote candidates received before the remote description was applied.
///
/// Append-only until flushed. A flush applies every candidate in arrival
/// order and leaves the buffer empty, so flushing twice is a no-op.
#[derive(Debug, Default)]
pub struct CandidateBuffer {
    pending: Vec<IceCandidate>,
}

impl CandidateBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, candidate: IceCandidate) {
        self.pending.push(candidate);
        debug!("Remote description not set yet, queued candidate ({} pending)", self.pending.len());
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        if !self.pending.is_empty() {
            debug!("Dropping {} pending candidates", self.pending.len());
        }
        self.pending.clear();
    }

    /// Applies all pending candidates to `session` in arrival order.
    /// Returns how many were handed over.
    pub async fn flush_into(&mut self, session: &dyn MediaSession) -> usize {
        let candidates = std::mem::take(&mut self.pending);
        let count = candidates.len();
        if count > 0 {
            debug!("Applying {count} pending candidates");
        }

        for candidate in candidates {
            if let Err(e) = session.add_candidate(candidate).await {
                warn!("Failed to apply pending candidate: {e}");
            }
        }
        count
    }
}
