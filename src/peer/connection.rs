use crate::error::MediaError;
use crate::logger::dump_candidate;
use crate::peer::media::{MediaEngine, MediaEventSink, MediaSession};
use crate::peer::types::{
    ConnectionState, IceCandidate, MediaEvent, MediaSessionId, ServerConfig, SessionDescription,
};
use crate::utils::add_ice_url_scheme;
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine as RtcMediaEngine, MIME_TYPE_OPUS};
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// Browser wire form of a session description.
#[derive(Serialize, Deserialize, Debug)]
struct WireDescription {
    #[serde(rename = "type")]
    kind: String,
    sdp: String,
}

/// Browser wire form of an ICE candidate.
#[derive(Serialize, Deserialize, Debug)]
struct WireCandidate {
    candidate: String,
    #[serde(rename = "sdpMid", default)]
    sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex", default)]
    sdp_mline_index: Option<u16>,
    #[serde(rename = "usernameFragment", default)]
    username_fragment: Option<String>,
}

/// Media engine backed by webrtc-rs, sending one Opus audio track.
pub struct WebRtcEngine {
    ice_servers: Vec<ServerConfig>,
    local_track: Option<Arc<TrackLocalStaticSample>>,
}

impl WebRtcEngine {
    pub fn new(ice_servers: Vec<ServerConfig>) -> Self {
        Self {
            ice_servers,
            local_track: None,
        }
    }
}

#[async_trait]
impl MediaEngine for WebRtcEngine {
    async fn acquire_local_media(&mut self) -> Result<(), MediaError> {
        if self.local_track.is_none() {
            let track = TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_OPUS.to_owned(),
                    clock_rate: 48000,
                    channels: 2,
                    sdp_fmtp_line: "minptime=10;useinbandfec=1".to_owned(),
                    ..Default::default()
                },
                "audio".to_owned(),
                "voip".to_owned(),
            );
            self.local_track = Some(Arc::new(track));
            info!("Local audio track acquired");
        }
        Ok(())
    }

    async fn release_local_media(&mut self) {
        if self.local_track.take().is_some() {
            info!("Local audio track released");
        }
    }

    async fn open_session(
        &self,
        id: MediaSessionId,
        events: MediaEventSink,
    ) -> Result<Box<dyn MediaSession>, MediaError> {
        let track = self
            .local_track
            .clone()
            .ok_or_else(|| MediaError::Capture("local audio not acquired".into()))?;
        let pc = new_peer(rtc_config(&self.ice_servers), events).await?;

        pc.add_track(track as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(|e| MediaError::Setup(format!("add track: {e}")))?;

        debug!("Opened {id}");
        Ok(Box::new(WebRtcSession { id, pc }))
    }
}

/// Builds a peer connection and wires its callbacks into the event sink.
async fn new_peer(
    config: RTCConfiguration,
    events: MediaEventSink,
) -> Result<Arc<RTCPeerConnection>, MediaError> {
    let mut media_engine = RtcMediaEngine::default();
    media_engine
        .register_default_codecs()
        .map_err(|e| MediaError::Setup(format!("register codecs: {e}")))?;
    let registry = register_default_interceptors(Registry::new(), &mut media_engine)
        .map_err(|e| MediaError::Setup(format!("register interceptors: {e}")))?;
    let api = APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .build();

    let pc = Arc::new(
        api.new_peer_connection(config)
            .await
            .map_err(|e| MediaError::Setup(e.to_string()))?,
    );

    let candidate_sink = events.clone();
    pc.on_ice_candidate(Box::new(move |cand: Option<RTCIceCandidate>| {
        let sink = candidate_sink.clone();
        Box::pin(async move {
            let Some(c) = cand else {
                debug!("ICE candidate gathering completed for {}", sink.id());
                return;
            };
            match c.to_json() {
                Ok(init) => {
                    dump_candidate("LOCAL", &init);
                    if let Some(blob) = candidate_to_blob(init) {
                        sink.emit(MediaEvent::LocalCandidate(blob));
                    }
                }
                Err(e) => warn!("Failed to serialize local candidate: {e}"),
            }
        })
    }));

    pc.on_ice_gathering_state_change(Box::new(move |state| {
        debug!("ICE gathering state changed to: {:?}", state);
        Box::pin(async {})
    }));

    let state_sink = events;
    pc.on_peer_connection_state_change(Box::new(move |st: RTCPeerConnectionState| {
        debug!("Peer connection state changed to: {:?}", st);
        let mapped = match st {
            RTCPeerConnectionState::New => Some(ConnectionState::New),
            RTCPeerConnectionState::Connecting => Some(ConnectionState::Connecting),
            RTCPeerConnectionState::Connected => Some(ConnectionState::Connected),
            RTCPeerConnectionState::Disconnected => Some(ConnectionState::Disconnected),
            RTCPeerConnectionState::Failed => Some(ConnectionState::Failed),
            RTCPeerConnectionState::Closed => Some(ConnectionState::Closed),
            _ => None,
        };
        if let Some(state) = mapped {
            state_sink.emit(MediaEvent::StateChanged(state));
        }
        Box::pin(async {})
    }));

    pc.on_track(Box::new(|track: Arc<TrackRemote>, _receiver, _transceiver| {
        info!("Received remote audio track: kind={:?}", track.kind());
        Box::pin(async {})
    }));

    Ok(pc)
}

/// Peer connection configuration for the static relay list
fn rtc_config(servers: &[ServerConfig]) -> RTCConfiguration {
    RTCConfiguration {
        ice_servers: ice_servers(servers),
        bundle_policy: RTCBundlePolicy::MaxBundle,
        rtcp_mux_policy: RTCRtcpMuxPolicy::Require,
        ..Default::default()
    }
}

pub fn ice_servers(servers: &[ServerConfig]) -> Vec<RTCIceServer> {
    servers
        .iter()
        .map(|config| RTCIceServer {
            urls: vec![add_ice_url_scheme(config)],
            username: config.username.clone().unwrap_or_default(),
            credential: config.credential.clone().unwrap_or_default(),
        })
        .collect()
}

fn candidate_to_blob(init: RTCIceCandidateInit) -> Option<IceCandidate> {
    let wire = WireCandidate {
        candidate: init.candidate,
        sdp_mid: init.sdp_mid,
        sdp_mline_index: init.sdp_mline_index,
        username_fragment: init.username_fragment,
    };
    serde_json::to_value(wire).ok().map(IceCandidate)
}

fn blob_to_candidate(blob: IceCandidate) -> Result<RTCIceCandidateInit, MediaError> {
    let wire: WireCandidate =
        serde_json::from_value(blob.0).map_err(|e| MediaError::InvalidBlob(e.to_string()))?;
    Ok(RTCIceCandidateInit {
        candidate: wire.candidate,
        sdp_mid: wire.sdp_mid,
        sdp_mline_index: wire.sdp_mline_index,
        username_fragment: wire.username_fragment,
    })
}

fn description_to_blob(desc: &RTCSessionDescription) -> Result<SessionDescription, MediaError> {
    let wire = WireDescription {
        kind: desc.sdp_type.to_string(),
        sdp: desc.sdp.clone(),
    };
    serde_json::to_value(wire)
        .map(SessionDescription)
        .map_err(|e| MediaError::InvalidBlob(e.to_string()))
}

fn blob_to_description(blob: SessionDescription) -> Result<RTCSessionDescription, MediaError> {
    let wire: WireDescription =
        serde_json::from_value(blob.0).map_err(|e| MediaError::InvalidBlob(e.to_string()))?;
    let parsed = match wire.kind.as_str() {
        "offer" => RTCSessionDescription::offer(wire.sdp),
        "answer" => RTCSessionDescription::answer(wire.sdp),
        other => return Err(MediaError::InvalidBlob(format!("description type {other}"))),
    };
    parsed.map_err(|e| MediaError::InvalidBlob(e.to_string()))
}

struct WebRtcSession {
    id: MediaSessionId,
    pc: Arc<RTCPeerConnection>,
}

impl WebRtcSession {
    async fn local_blob(&self) -> Result<SessionDescription, MediaError> {
        let desc = self
            .pc
            .local_description()
            .await
            .ok_or_else(|| MediaError::Setup("local description missing".into()))?;
        description_to_blob(&desc)
    }
}

#[async_trait]
impl MediaSession for WebRtcSession {
    async fn create_offer(&self) -> Result<SessionDescription, MediaError> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| MediaError::CreateOffer(e.to_string()))?;
        self.pc
            .set_local_description(offer)
            .await
            .map_err(|e| MediaError::CreateOffer(format!("set local description: {e}")))?;
        self.local_blob().await
    }

    async fn create_answer(&self) -> Result<SessionDescription, MediaError> {
        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| MediaError::CreateAnswer(e.to_string()))?;
        self.pc
            .set_local_description(answer)
            .await
            .map_err(|e| MediaError::CreateAnswer(format!("set local description: {e}")))?;
        self.local_blob().await
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), MediaError> {
        let desc = blob_to_description(desc)?;
        self.pc
            .set_remote_description(desc)
            .await
            .map_err(|e| MediaError::SetRemoteDescription(e.to_string()))
    }

    async fn add_candidate(&self, candidate: IceCandidate) -> Result<(), MediaError> {
        let init = blob_to_candidate(candidate)?;
        self.pc
            .add_ice_candidate(init)
            .await
            .map_err(|e| MediaError::AddCandidate(e.to_string()))
    }

    async fn close(&self) {
        for sender in self.pc.get_senders().await {
            if let Err(e) = sender.stop().await {
                debug!("Failed to stop sender on {}: {e}", self.id);
            }
        }
        if let Err(e) = self.pc.close().await {
            warn!("Failed to close {}: {e}", self.id);
        }
        debug!("Closed {}", self.id);
    }
}
