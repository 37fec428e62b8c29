//! Headless call client: one signaling link, one call session.

use crate::config::Config;
use crate::error::LinkError;
use crate::peer::connection::WebRtcEngine;
use crate::peer::media::MediaEngine;
use crate::session::{CallSession, Notifier, SessionEvent, UserIntent};
use crate::signaling;
use log::{info, warn};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Handle to a running call session.
///
/// Dropping every handle, or calling [`CallClient::shutdown`], hangs up and
/// stops the session.
pub struct CallClient {
    intents: mpsc::UnboundedSender<UserIntent>,
    task: JoinHandle<()>,
}

impl CallClient {
    /// Connects to the relay from `config` with WebRTC media.
    pub async fn connect(config: &Config, notifier: Notifier) -> Result<Self, LinkError> {
        let engine = WebRtcEngine::new(config.ice_servers.clone());
        Self::connect_with_engine(config, Box::new(engine), notifier).await
    }

    /// Like [`CallClient::connect`] with a caller-supplied media engine.
    pub async fn connect_with_engine(
        config: &Config,
        engine: Box<dyn MediaEngine>,
        notifier: Notifier,
    ) -> Result<Self, LinkError> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let link = signaling::connect(&config.signaling_url, events_tx.clone()).await?;
        let session = CallSession::new(engine, link, events_tx.clone(), notifier);
        let _ = events_tx.send(SessionEvent::Intent(UserIntent::AcquireLocalMedia));

        let (intents, intents_rx) = mpsc::unbounded_channel();
        let driver = Driver {
            session,
            events_tx,
            url: config.signaling_url.clone(),
            reconnect_delay: config.reconnect_delay(),
            reconnect: None,
        };
        let task = tokio::spawn(driver.run(events_rx, intents_rx));
        Ok(Self { intents, task })
    }

    pub fn place_call(&self, to: impl Into<String>) {
        let _ = self.intents.send(UserIntent::PlaceCall { to: to.into() });
    }

    pub fn hang_up(&self) {
        let _ = self.intents.send(UserIntent::HangUp);
    }

    /// Re-acquires local audio, e.g. after the user granted access.
    pub fn acquire_local_media(&self) {
        let _ = self.intents.send(UserIntent::AcquireLocalMedia);
    }

    pub async fn shutdown(self) {
        drop(self.intents);
        if let Err(e) = self.task.await {
            warn!("Call session task ended abnormally: {e}");
        }
    }
}

struct Driver {
    session: CallSession,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    url: String,
    reconnect_delay: Option<Duration>,
    reconnect: Option<JoinHandle<()>>,
}

impl Driver {
    async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<SessionEvent>,
        mut intents: mpsc::UnboundedReceiver<UserIntent>,
    ) {
        loop {
            tokio::select! {
                intent = intents.recv() => match intent {
                    Some(intent) => self.session.handle(SessionEvent::Intent(intent)).await,
                    None => break,
                },
                Some(event) = events.recv() => {
                    let lost = matches!(&event, SessionEvent::LinkClosed(id) if *id == self.session.link_id());
                    self.session.handle(event).await;
                    if lost {
                        self.schedule_reconnect();
                    }
                }
            }
        }
        if let Some(task) = self.reconnect.take() {
            task.abort();
        }
        self.session.shutdown().await;
        info!("Call session stopped");
    }

    fn schedule_reconnect(&mut self) {
        let Some(delay) = self.reconnect_delay else {
            return;
        };
        if self.reconnect.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }
        let url = self.url.clone();
        let events = self.events_tx.clone();
        self.reconnect = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(delay).await;
                info!("Reconnecting to {url}");
                match signaling::connect(&url, events.clone()).await {
                    Ok(link) => {
                        let _ = events.send(SessionEvent::LinkAttached(link));
                        let _ = events.send(SessionEvent::Intent(UserIntent::AcquireLocalMedia));
                        return;
                    }
                    Err(e) => warn!("Reconnect failed: {e}"),
                }
            }
        }));
    }
}
