#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use voip_lib::peer::media::{MediaEngine, MediaEventSink, MediaSession};
use voip_lib::peer::types::{
    ConnectionState, IceCandidate, MediaEvent, MediaSessionId, SessionDescription,
};
use voip_lib::signaling::{LinkEvents, SignalMessage, SignalingLink};
use voip_lib::{CallSession, CallState, MediaError, Notification, Notifier, SessionEvent, UserIntent};

/// Which primitive calls should fail.
#[derive(Debug, Default, Clone)]
pub struct Faults {
    pub acquire: bool,
    pub offer: bool,
    pub answer: bool,
    pub remote_description: bool,
}

/// Ordered record of every primitive call, e.g. `"candidate media#1 a"`.
#[derive(Debug, Default, Clone)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.starts_with(prefix))
            .collect()
    }
}

pub struct FakeEngine {
    pub journal: Journal,
    pub faults: Arc<Mutex<Faults>>,
    /// Reports `Connected` as soon as a remote description lands.
    pub auto_connect: bool,
}

impl FakeEngine {
    pub fn new(journal: Journal, faults: Arc<Mutex<Faults>>) -> Self {
        Self {
            journal,
            faults,
            auto_connect: false,
        }
    }
}

#[async_trait]
impl MediaEngine for FakeEngine {
    async fn acquire_local_media(&mut self) -> Result<(), MediaError> {
        self.journal.push("acquire".into());
        if self.faults.lock().unwrap().acquire {
            return Err(MediaError::Capture("permission denied".into()));
        }
        Ok(())
    }

    async fn release_local_media(&mut self) {
        self.journal.push("release".into());
    }

    async fn open_session(
        &self,
        id: MediaSessionId,
        events: MediaEventSink,
    ) -> Result<Box<dyn MediaSession>, MediaError> {
        self.journal.push(format!("open {id}"));
        Ok(Box::new(FakeSession {
            id,
            journal: self.journal.clone(),
            faults: self.faults.clone(),
            events,
            auto_connect: self.auto_connect,
        }))
    }
}

struct FakeSession {
    id: MediaSessionId,
    journal: Journal,
    faults: Arc<Mutex<Faults>>,
    events: MediaEventSink,
    auto_connect: bool,
}

#[async_trait]
impl MediaSession for FakeSession {
    async fn create_offer(&self) -> Result<SessionDescription, MediaError> {
        self.journal.push(format!("offer {}", self.id));
        if self.faults.lock().unwrap().offer {
            return Err(MediaError::CreateOffer("no codecs".into()));
        }
        Ok(description("offer"))
    }

    async fn create_answer(&self) -> Result<SessionDescription, MediaError> {
        self.journal.push(format!("answer {}", self.id));
        if self.faults.lock().unwrap().answer {
            return Err(MediaError::CreateAnswer("no codecs".into()));
        }
        Ok(description("answer"))
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), MediaError> {
        let kind = desc.0["type"].as_str().unwrap_or("?").to_string();
        self.journal.push(format!("remote {} {kind}", self.id));
        if self.faults.lock().unwrap().remote_description {
            return Err(MediaError::SetRemoteDescription("bad sdp".into()));
        }
        if self.auto_connect {
            self.events
                .emit(MediaEvent::StateChanged(ConnectionState::Connected));
        }
        Ok(())
    }

    async fn add_candidate(&self, candidate: IceCandidate) -> Result<(), MediaError> {
        let name = candidate.0["candidate"].as_str().unwrap_or("?").to_string();
        self.journal.push(format!("candidate {} {name}", self.id));
        Ok(())
    }

    async fn close(&self) {
        self.journal.push(format!("close {}", self.id));
    }
}

pub fn description(kind: &str) -> SessionDescription {
    SessionDescription(json!({ "type": kind, "sdp": format!("v=0 {kind}") }))
}

pub fn candidate(name: &str) -> Value {
    json!({ "candidate": name, "sdpMid": "0", "sdpMLineIndex": 0 })
}

/// A session wired to an in-memory link.
pub struct Harness {
    pub session: CallSession,
    pub journal: Journal,
    pub faults: Arc<Mutex<Faults>>,
    pub link: Option<LinkEvents>,
    wire: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    notes: mpsc::UnboundedReceiver<Notification>,
}

impl Harness {
    pub fn new() -> Self {
        let journal = Journal::default();
        let faults = Arc::new(Mutex::new(Faults::default()));
        let engine = FakeEngine::new(journal.clone(), faults.clone());
        let (events_tx, events) = mpsc::unbounded_channel();
        let (link, inbound, wire) = SignalingLink::pair(events_tx.clone());
        link.mark_open();
        let (notifier, notes) = Notifier::channel();
        let session = CallSession::new(Box::new(engine), link, events_tx, notifier);
        Self {
            session,
            journal,
            faults,
            link: Some(inbound),
            wire,
            events,
            notes,
        }
    }

    /// Identified as `me` with local audio captured.
    pub async fn ready() -> Self {
        let mut h = Self::new();
        h.inbound(json!({ "type": "myId", "id": "me" })).await;
        h.intent(UserIntent::AcquireLocalMedia).await;
        assert_eq!(h.session.state(), CallState::Ready);
        h.drain_notes();
        h
    }

    /// In a call with `peer`, as caller, with the answer applied.
    pub async fn calling_with_answer() -> Self {
        let mut h = Self::ready().await;
        h.intent(UserIntent::PlaceCall { to: "peer".into() }).await;
        h.inbound(json!({ "type": "answer", "to": "me", "from": "peer", "answer": description("answer").0 }))
            .await;
        h.sent();
        h
    }

    pub async fn intent(&mut self, intent: UserIntent) {
        self.session.handle(SessionEvent::Intent(intent)).await;
    }

    /// Feeds one wire message through the link's decoder.
    pub async fn inbound(&mut self, message: Value) {
        let decoded = SignalMessage::decode(&message.to_string())
            .expect("valid json")
            .expect("known type");
        self.session.handle(SessionEvent::Inbound(decoded)).await;
    }

    pub async fn media(&mut self, event: MediaEvent) {
        let session = self.session.media_session().expect("live media session");
        self.session
            .handle(SessionEvent::Media { session, event })
            .await;
    }

    pub async fn connect_media(&mut self) {
        self.media(MediaEvent::StateChanged(ConnectionState::Connected))
            .await;
    }

    /// Closes the link and lets the session see it.
    pub async fn close_link(&mut self) {
        if let Some(inbound) = self.link.take() {
            inbound.closed();
        }
        self.pump().await;
    }

    /// Handles every queued event, e.g. those raised by media sessions.
    pub async fn pump(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.session.handle(event).await;
        }
    }

    /// Wire messages sent since the last call.
    pub fn sent(&mut self) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(text) = self.wire.try_recv() {
            out.push(serde_json::from_str(&text).expect("sent json"));
        }
        out
    }

    pub fn sent_types(&mut self) -> Vec<String> {
        self.sent()
            .into_iter()
            .map(|m| m["type"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn drain_notes(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(note) = self.notes.try_recv() {
            out.push(note);
        }
        out
    }

    pub fn states(&mut self) -> Vec<CallState> {
        self.drain_notes()
            .into_iter()
            .filter_map(|n| match n {
                Notification::State(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn notices(notes: &[Notification]) -> Vec<String> {
        notes
            .iter()
            .filter_map(|n| match n {
                Notification::Notice(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }
}
