use crate::peer::types::ServerConfig;
use rand::Rng;

/// Peer identifier handed out by the relay: 16 random bytes, hex encoded.
pub fn random_id() -> String {
    hex::encode(rand::rng().random::<[u8; 16]>())
}

// Adds the protocol scheme to an ICE server URL when it is missing
pub fn add_ice_url_scheme(config: &ServerConfig) -> String {
    if config.url.starts_with("turn:") || config.url.starts_with("stun:") {
        config.url.clone()
    } else {
        let scheme = if config.r#type == "turn" {
            "turn:"
        } else {
            "stun:"
        };
        format!("{}{}", scheme, config.url)
    }
}
