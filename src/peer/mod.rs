pub mod connection;
pub mod ice;
pub mod media;
pub mod types;

pub use connection::WebRtcEngine;
pub use ice::CandidateBuffer;
pub use media::{MediaEngine, MediaEventSink, MediaSession};
pub use types::{ConnectionState, IceCandidate, MediaEvent, MediaSessionId, ServerConfig, SessionDescription};
