// Application configuration

use crate::error::ConfigError;
use crate::peer::types::ServerConfig;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[cfg(debug_assertions)]
pub const DEFAULT_LOG_FILTER: &str = "debug"; // verbose while developing

#[cfg(not(debug_assertions))]
pub const DEFAULT_LOG_FILTER: &str = "info";

pub const DEFAULT_PORT: u16 = 3000;

/// Static relay list used when none is configured.
pub static DEFAULT_ICE_SERVERS: Lazy<Vec<ServerConfig>> = Lazy::new(|| {
    vec![
        ServerConfig {
            id: "default-stun-1".into(),
            r#type: "stun".into(),
            url: "stun:stun1.l.google.com:19302".into(),
            username: None,
            credential: None,
        },
        ServerConfig {
            id: "default-stun-2".into(),
            r#type: "stun".into(),
            url: "stun:stun2.l.google.com:19302".into(),
            username: None,
            credential: None,
        },
    ]
});

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Listen port of the signaling relay.
    pub port: u16,
    /// Relay endpoint the call client connects to.
    pub signaling_url: String,
    pub ice_servers: Vec<ServerConfig>,
    /// Delay before the client reconnects a lost link; `None` disables it.
    pub reconnect_delay_ms: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            signaling_url: format!("ws://127.0.0.1:{DEFAULT_PORT}/ws"),
            ice_servers: DEFAULT_ICE_SERVERS.clone(),
            reconnect_delay_ms: Some(2000),
        }
    }
}

impl Config {
    /// Defaults overridden by `PORT` and `SIGNALING_URL`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(port) = lookup("PORT").and_then(|p| p.trim().parse().ok()) {
            config.port = port;
        }
        if let Some(url) = lookup("SIGNALING_URL").filter(|u| !u.trim().is_empty()) {
            config.signaling_url = url;
        }
        config
    }

    pub fn reconnect_delay(&self) -> Option<Duration> {
        self.reconnect_delay_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for server in &self.ice_servers {
            if server.url.trim().is_empty() {
                return Err(ConfigError::EmptyUrl(server.id.clone()));
            }
            if server.r#type == "turn" && (server.username.is_none() || server.credential.is_none())
            {
                return Err(ConfigError::MissingTurnCredentials(server.id.clone()));
            }
        }
        Ok(())
    }
}
