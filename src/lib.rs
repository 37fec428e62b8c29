pub mod client;
pub mod config;
pub mod error;
pub mod logger;
pub mod peer;
pub mod server;
pub mod session;
pub mod signaling;
mod utils;

pub use client::CallClient;
pub use config::Config;
pub use error::{CallError, ConfigError, LinkError, MediaError};
pub use server::SignalingServer;
pub use session::{CallSession, CallState, Notification, Notifier, Role, SessionEvent, UserIntent};

/// Runs the signaling relay on `config.port` until the process exits.
pub async fn run(config: Config) -> Result<(), LinkError> {
    let server = SignalingServer::bind(("0.0.0.0", config.port)).await?;
    log::info!("VoIP server is running at http://localhost:{}", config.port);
    server.run().await
}
