use crate::session::SessionEvent;
use crate::signaling::message::SignalMessage;
use log::{debug, warn};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

static NEXT_LINK_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one signaling connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connecting,
    Open,
    Closed,
}

impl LinkState {
    fn to_u8(self) -> u8 {
        match self {
            Self::Connecting => 0,
            Self::Open => 1,
            Self::Closed => 2,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Connecting,
            1 => Self::Open,
            _ => Self::Closed,
        }
    }
}

/// Outbound half of a signaling connection, owned by the call session.
///
/// Sends are fire-and-forget: nothing is queued or retried while the link
/// is not open, and each send produces exactly one wire message.
#[derive(Debug)]
pub struct SignalingLink {
    id: LinkId,
    state: Arc<AtomicU8>,
    outbound: mpsc::UnboundedSender<String>,
}

impl SignalingLink {
    /// Creates a link in the `Connecting` state.
    ///
    /// Returns the link, the inbound side that feeds `events`, and the
    /// stream of encoded outbound wire messages for the transport to drain.
    pub fn pair(
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> (Self, LinkEvents, mpsc::UnboundedReceiver<String>) {
        let id = LinkId(NEXT_LINK_ID.fetch_add(1, Ordering::Relaxed));
        let state = Arc::new(AtomicU8::new(LinkState::Connecting.to_u8()));
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let link = Self {
            id,
            state: state.clone(),
            outbound,
        };
        (link, LinkEvents { id, state, events }, outbound_rx)
    }

    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn state(&self) -> LinkState {
        LinkState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_open(&self) -> bool {
        self.state() == LinkState::Open
    }

    pub fn mark_open(&self) {
        self.state.store(LinkState::Open.to_u8(), Ordering::SeqCst);
    }

    /// Sends one message; silently dropped unless the link is open.
    pub fn send(&self, message: &SignalMessage) -> bool {
        if !self.is_open() {
            debug!("Link not open, dropping outbound {}", message.kind());
            return false;
        }
        match message.encode() {
            Ok(text) => {
                debug!("-> {}", message.kind());
                self.outbound.send(text).is_ok()
            }
            Err(e) => {
                warn!("Failed to encode {}: {e}", message.kind());
                false
            }
        }
    }
}

/// Inbound half of a signaling connection, driven by the transport.
pub struct LinkEvents {
    id: LinkId,
    state: Arc<AtomicU8>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl LinkEvents {
    /// Decodes one wire message and queues it for the session, keeping
    /// arrival order. Malformed and unknown messages are dropped.
    pub fn deliver(&self, text: &str) {
        match SignalMessage::decode(text) {
            Ok(Some(message)) => {
                debug!("<- {} from {:?}", message.kind(), message.sender());
                let _ = self.events.send(SessionEvent::Inbound(message));
            }
            Ok(None) => debug!("Ignoring signaling message of unknown type"),
            Err(e) => warn!("Invalid signaling message: {e}"),
        }
    }

    /// Marks the link closed and notifies the session. Consumes the inbound
    /// half, so it fires at most once per connection.
    pub fn closed(self) {
        self.state.store(LinkState::Closed.to_u8(), Ordering::SeqCst);
        let _ = self.events.send(SessionEvent::LinkClosed(self.id));
    }
}
