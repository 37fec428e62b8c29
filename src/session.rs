//! Call negotiation state machine.
//!
//! A [`CallSession`] carries at most one call at a time. Signaling
//! messages, user intents, media events and link loss all arrive as
//! [`SessionEvent`]s on one queue and are handled strictly one after the
//! other. A step that awaits the media primitive holds back every later
//! event until it finishes, so nothing interleaves with a transition.
//!
//! Every media session gets a fresh [`MediaSessionId`]. Results and events
//! are only applied while that id is still the live one.

pub mod notify;
pub mod state;
pub mod timer;

pub use notify::{Notification, Notifier};
pub use state::{CallState, Role};

use crate::error::CallError;
use crate::peer::ice::CandidateBuffer;
use crate::peer::media::{MediaEngine, MediaEventSink, MediaSession};
use crate::peer::types::{
    ConnectionState, IceCandidate, MediaEvent, MediaSessionId, SessionDescription,
};
use crate::signaling::{LinkId, LinkState, SignalMessage, SignalingLink};
use log::{debug, info, warn};
use timer::CallTimer;
use tokio::sync::mpsc;

/// Local user actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserIntent {
    AcquireLocalMedia,
    PlaceCall { to: String },
    HangUp,
}

/// Everything the session reacts to.
#[derive(Debug)]
pub enum SessionEvent {
    Intent(UserIntent),
    Inbound(SignalMessage),
    Media {
        session: MediaSessionId,
        event: MediaEvent,
    },
    LinkClosed(LinkId),
    /// Replaces the signaling link after a reconnect.
    LinkAttached(SignalingLink),
}

struct ActiveMedia {
    id: MediaSessionId,
    handle: Box<dyn MediaSession>,
    remote_applied: bool,
}

pub struct CallSession {
    local_id: Option<String>,
    remote_id: Option<String>,
    role: Role,
    state: CallState,
    media: Option<ActiveMedia>,
    local_media_ready: bool,
    candidates: CandidateBuffer,
    timer: CallTimer,
    engine: Box<dyn MediaEngine>,
    link: SignalingLink,
    events: mpsc::UnboundedSender<SessionEvent>,
    notifier: Notifier,
    next_media_id: u64,
}

impl CallSession {
    /// `events` must feed the queue this session is driven from; media
    /// sessions post their events there.
    pub fn new(
        engine: Box<dyn MediaEngine>,
        link: SignalingLink,
        events: mpsc::UnboundedSender<SessionEvent>,
        notifier: Notifier,
    ) -> Self {
        Self {
            local_id: None,
            remote_id: None,
            role: Role::None,
            state: CallState::Idle,
            media: None,
            local_media_ready: false,
            candidates: CandidateBuffer::new(),
            timer: CallTimer::new(),
            engine,
            link,
            events,
            notifier,
            next_media_id: 0,
        }
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn local_id(&self) -> Option<&str> {
        self.local_id.as_deref()
    }

    pub fn remote_id(&self) -> Option<&str> {
        self.remote_id.as_deref()
    }

    pub fn local_media_ready(&self) -> bool {
        self.local_media_ready
    }

    pub fn link_state(&self) -> LinkState {
        self.link.state()
    }

    pub fn link_id(&self) -> LinkId {
        self.link.id()
    }

    /// Id of the live media session, if any.
    pub fn media_session(&self) -> Option<MediaSessionId> {
        self.media.as_ref().map(|m| m.id)
    }

    pub fn remote_description_applied(&self) -> bool {
        self.media.as_ref().is_some_and(|m| m.remote_applied)
    }

    pub fn pending_candidates(&self) -> usize {
        self.candidates.len()
    }

    pub fn call_duration_secs(&self) -> u64 {
        self.timer.elapsed_secs()
    }

    /// Runs one event to completion. Failures are reported as notices and
    /// state changes, never returned.
    pub async fn handle(&mut self, event: SessionEvent) {
        let result = match event {
            SessionEvent::Intent(UserIntent::AcquireLocalMedia) => {
                self.acquire_local_media().await
            }
            SessionEvent::Intent(UserIntent::PlaceCall { to }) => self.place_call(&to).await,
            SessionEvent::Intent(UserIntent::HangUp) => {
                self.hang_up().await;
                Ok(())
            }
            SessionEvent::Inbound(message) => {
                self.on_signal(message).await;
                Ok(())
            }
            SessionEvent::Media { session, event } => {
                self.on_media_event(session, event).await;
                Ok(())
            }
            SessionEvent::LinkClosed(link) => {
                self.on_link_closed(link).await;
                Ok(())
            }
            SessionEvent::LinkAttached(link) => {
                self.attach_link(link).await;
                Ok(())
            }
        };
        if let Err(e) = result {
            debug!("Intent rejected: {e}");
        }
    }

    /// Captures local audio and moves Idle to Ready.
    pub async fn acquire_local_media(&mut self) -> Result<(), CallError> {
        if self.link.state() == LinkState::Closed {
            return Err(self.reject(CallError::LinkDown));
        }
        if !self.local_media_ready {
            if let Err(e) = self.engine.acquire_local_media().await {
                return Err(self.reject(CallError::LocalMediaUnavailable(e.to_string())));
            }
            self.local_media_ready = true;
        }
        if self.state == CallState::Idle {
            self.set_state(CallState::Ready);
        }
        Ok(())
    }

    /// Starts an outgoing call to `to`.
    pub async fn place_call(&mut self, to: &str) -> Result<(), CallError> {
        let to = to.trim();
        if !self.local_media_ready {
            return Err(self.reject(CallError::LocalMediaUnavailable(
                "local audio not ready".into(),
            )));
        }
        if self.state != CallState::Ready {
            return Err(self.reject(CallError::InvalidState {
                action: "place a call",
                state: self.state,
            }));
        }
        if to.is_empty() {
            return Err(self.reject(CallError::MissingRemoteId));
        }
        if !self.link.is_open() {
            return Err(self.reject(CallError::LinkDown));
        }

        info!("Calling {to}");
        self.role = Role::Caller;
        self.remote_id = Some(to.to_string());

        let id = match self.open_media().await {
            Ok(id) => id,
            Err(e) => return Err(self.fail_call(e).await),
        };
        let offer = match &self.media {
            Some(media) if media.id == id => media.handle.create_offer().await,
            _ => return Ok(()),
        };
        if !self.is_current(id) {
            debug!("Discarding offer of stale {id}");
            return Ok(());
        }
        let offer = match offer {
            Ok(offer) => offer,
            Err(e) => return Err(self.fail_call(e.into()).await),
        };

        self.link.send(&SignalMessage::offer(to, offer));
        self.set_state(CallState::Calling);
        Ok(())
    }

    /// Ends the current call and tells the peer. A no-op without a call.
    pub async fn hang_up(&mut self) {
        if !self.state.in_call() && self.media.is_none() {
            debug!("Nothing to hang up");
            return;
        }
        if let Some(to) = self.remote_id.clone() {
            self.link.send(&SignalMessage::hangup(to));
        }
        self.teardown().await;
    }

    async fn on_signal(&mut self, message: SignalMessage) {
        match message {
            SignalMessage::MyId { id } => self.on_local_id(id),
            SignalMessage::PeerCount { count } => {
                self.notifier.emit(Notification::PeerCount(count));
            }
            SignalMessage::Offer { from, offer, .. } => self.on_offer(from, offer).await,
            SignalMessage::Answer { from, answer, .. } => self.on_answer(from, answer).await,
            SignalMessage::Candidate {
                from, candidate, ..
            } => self.on_remote_candidate(from, candidate).await,
            SignalMessage::Hangup { from, .. } => self.on_remote_hangup(from).await,
        }
    }

    fn on_local_id(&mut self, id: String) {
        match &self.local_id {
            Some(current) if *current != id => {
                warn!("Ignoring new local id {id}, already known as {current}");
            }
            Some(_) => {}
            None => {
                info!("Local id: {id}");
                self.local_id = Some(id.clone());
                self.notifier.emit(Notification::LocalId(id));
            }
        }
    }

    async fn on_offer(&mut self, from: Option<String>, offer: SessionDescription) {
        let Some(from) = from.filter(|f| !f.is_empty()) else {
            warn!("Ignoring offer without sender");
            return;
        };
        if self.state != CallState::Ready || !self.local_media_ready {
            // keeps whatever call is in progress
            info!("Rejecting offer from {from} while {}", self.state);
            self.link.send(&SignalMessage::hangup(from));
            return;
        }

        info!("Received offer from {from}");
        self.role = Role::Callee;
        self.remote_id = Some(from.clone());

        let id = match self.open_media().await {
            Ok(id) => id,
            Err(e) => {
                self.fail_call(e).await;
                return;
            }
        };

        let applied = match &self.media {
            Some(media) if media.id == id => media.handle.set_remote_description(offer).await,
            _ => return,
        };
        if !self.is_current(id) {
            debug!("Discarding offer result of stale {id}");
            return;
        }
        if let Err(e) = applied {
            self.fail_call(e.into()).await;
            return;
        }
        self.remote_description_ready().await;

        let answer = match &self.media {
            Some(media) if media.id == id => media.handle.create_answer().await,
            _ => return,
        };
        if !self.is_current(id) {
            debug!("Discarding answer of stale {id}");
            return;
        }
        match answer {
            Ok(answer) => {
                self.link.send(&SignalMessage::answer(from, answer));
                self.set_state(CallState::Answering);
            }
            Err(e) => {
                self.fail_call(e.into()).await;
            }
        }
    }

    async fn on_answer(&mut self, from: Option<String>, answer: SessionDescription) {
        if self.state != CallState::Calling || !self.is_from_remote(from.as_deref()) {
            debug!("Ignoring answer from {from:?} while {}", self.state);
            return;
        }
        let id = match &self.media {
            Some(media) if !media.remote_applied => media.id,
            Some(_) => {
                debug!("Ignoring duplicate answer");
                return;
            }
            None => return,
        };

        info!("Received answer");
        let applied = match &self.media {
            Some(media) => media.handle.set_remote_description(answer).await,
            None => return,
        };
        if !self.is_current(id) {
            debug!("Discarding answer result of stale {id}");
            return;
        }
        match applied {
            // stays Calling until the media path reports connected
            Ok(()) => self.remote_description_ready().await,
            Err(e) => {
                self.fail_call(e.into()).await;
            }
        }
    }

    async fn on_remote_candidate(&mut self, from: Option<String>, candidate: IceCandidate) {
        if !self.state.in_call() || !self.is_from_remote(from.as_deref()) {
            debug!("Discarding stale candidate from {from:?}");
            return;
        }
        let Some(media) = &self.media else {
            debug!("Discarding candidate without media session");
            return;
        };
        if media.remote_applied {
            if let Err(e) = media.handle.add_candidate(candidate).await {
                warn!("Failed to add ICE candidate: {e}");
            }
        } else {
            self.candidates.append(candidate);
        }
    }

    async fn on_remote_hangup(&mut self, from: Option<String>) {
        if !self.state.in_call() || !self.is_from_remote(from.as_deref()) {
            debug!("Ignoring hangup from {from:?} while {}", self.state);
            return;
        }
        info!("{}", CallError::RemoteHangup);
        self.teardown().await;
    }

    async fn on_media_event(&mut self, session: MediaSessionId, event: MediaEvent) {
        if !self.is_current(session) {
            debug!("Discarding {event:?} from stale {session}");
            return;
        }
        match event {
            MediaEvent::LocalCandidate(candidate) => {
                if let Some(to) = &self.remote_id {
                    self.link.send(&SignalMessage::candidate(to.clone(), candidate));
                }
            }
            MediaEvent::StateChanged(ConnectionState::Connected) => self.on_media_connected().await,
            MediaEvent::StateChanged(ConnectionState::Failed | ConnectionState::Disconnected) => {
                if self.state.in_call() {
                    // same as a remote hangup: silent, the peer is unreachable
                    info!("{}", CallError::ConnectivityLost);
                    self.teardown().await;
                }
            }
            MediaEvent::StateChanged(other) => debug!("Media connection state: {other:?}"),
        }
    }

    async fn on_media_connected(&mut self) {
        let waiting = matches!(self.state, CallState::Calling | CallState::Answering);
        if !waiting || !self.remote_description_applied() {
            debug!("Ignoring connect confirmation while {}", self.state);
            return;
        }
        // candidates were flushed when the description landed; this is a no-op then
        self.flush_candidates().await;
        self.set_state(CallState::Connected);
    }

    async fn on_link_closed(&mut self, link: LinkId) {
        if link != self.link.id() {
            debug!("Ignoring close of replaced link {link:?}");
            return;
        }
        let err = CallError::LinkDown;
        warn!("{err}");
        // the peer cannot be reached, so no hangup goes out
        self.local_media_ready = false;
        self.teardown().await;
        self.engine.release_local_media().await;
        self.local_id = None;
        self.set_state(CallState::Idle);
        self.notifier.emit(Notification::Notice(err.to_string()));
    }

    /// Installs a fresh link, resetting whatever the old one carried.
    pub async fn attach_link(&mut self, link: SignalingLink) {
        if self.state != CallState::Idle || self.media.is_some() {
            self.local_media_ready = false;
            self.teardown().await;
            self.engine.release_local_media().await;
        }
        self.link = link;
        self.set_state(CallState::Idle);
        info!("Signaling link attached ({:?})", self.link.state());
    }

    /// Hangs up and releases local capture.
    pub async fn shutdown(&mut self) {
        self.hang_up().await;
        self.engine.release_local_media().await;
        self.local_media_ready = false;
    }

    async fn open_media(&mut self) -> Result<MediaSessionId, CallError> {
        self.close_media().await;
        self.candidates.clear();
        self.next_media_id += 1;
        let id = MediaSessionId(self.next_media_id);
        let sink = MediaEventSink::new(id, self.events.clone());
        let handle = self.engine.open_session(id, sink).await?;
        self.media = Some(ActiveMedia {
            id,
            handle,
            remote_applied: false,
        });
        Ok(id)
    }

    async fn close_media(&mut self) {
        if let Some(media) = self.media.take() {
            media.handle.close().await;
        }
    }

    async fn remote_description_ready(&mut self) {
        if let Some(media) = self.media.as_mut() {
            media.remote_applied = true;
        }
        self.flush_candidates().await;
    }

    async fn flush_candidates(&mut self) {
        if let Some(media) = &self.media {
            self.candidates.flush_into(media.handle.as_ref()).await;
        }
    }

    fn is_current(&self, id: MediaSessionId) -> bool {
        self.media.as_ref().is_some_and(|m| m.id == id)
    }

    fn is_from_remote(&self, from: Option<&str>) -> bool {
        match (from, self.remote_id.as_deref()) {
            (Some(from), Some(remote)) => from == remote,
            // relays that do not stamp a sender
            (None, Some(_)) => true,
            (_, None) => false,
        }
    }

    /// Aborts a call on a negotiation failure and returns to Ready.
    /// The peer is only told when it is waiting on us.
    async fn fail_call(&mut self, err: CallError) -> CallError {
        warn!("Call failed: {err}");
        let peer_waiting = self.state.in_call() || self.role == Role::Callee;
        if let Some(to) = self.remote_id.clone().filter(|_| peer_waiting) {
            self.link.send(&SignalMessage::hangup(to));
        }
        self.teardown().await;
        self.reject(err)
    }

    fn reject(&self, err: CallError) -> CallError {
        self.notifier.emit(Notification::Notice(err.to_string()));
        err
    }

    async fn teardown(&mut self) {
        if self.state.in_call() || self.media.is_some() {
            self.set_state(CallState::Disconnecting);
        }
        self.close_media().await;
        self.candidates.clear();
        self.remote_id = None;
        self.role = Role::None;
        let next = self.resting_state();
        self.set_state(next);
    }

    fn resting_state(&self) -> CallState {
        if self.local_media_ready && self.link.state() != LinkState::Closed {
            CallState::Ready
        } else {
            CallState::Idle
        }
    }

    fn set_state(&mut self, next: CallState) {
        let prev = self.state;
        if prev == next {
            return;
        }
        if prev == CallState::Connected {
            self.timer.stop();
        }
        self.state = next;
        info!("Call state: {prev} -> {next}");
        if next == CallState::Connected {
            self.timer.start(self.notifier.clone());
        }
        self.notifier.emit(Notification::State(next));
    }
}
