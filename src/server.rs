//! Signaling relay.
//!
//! Assigns every websocket connection a random id, tells it that id and
//! keeps everyone informed of the peer count. Negotiation messages are
//! forwarded verbatim to the addressed peer with the sender's id added.
//! The relay never looks inside descriptions or candidates.

use crate::error::LinkError;
use crate::signaling::message::RELAYED_TYPES;
use crate::utils::random_id;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message;

type Peers = Arc<RwLock<HashMap<String, mpsc::UnboundedSender<Message>>>>;

pub struct SignalingServer {
    listener: TcpListener,
    peers: Peers,
}

impl SignalingServer {
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self, LinkError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            peers: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, LinkError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until the task is dropped.
    pub async fn run(self) -> Result<(), LinkError> {
        info!("VoIP relay listening on ws://{}", self.local_addr()?);
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let peers = self.peers.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peers).await {
                            warn!("Connection from {addr} failed: {e}");
                        }
                    });
                }
                Err(e) => warn!("Accept error: {e}"),
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, peers: Peers) -> Result<(), LinkError> {
    // any request path is accepted
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_write, mut ws_read) = ws_stream.split();

    let id = random_id();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let _ = tx.send(text_frame(json!({ "type": "myId", "id": id })));
    peers.write().await.insert(id.clone(), tx);
    broadcast_peer_count(&peers).await;
    info!("New user connected: {id}");

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_write.send(msg).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = ws_read.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(data)) => match String::from_utf8(data) {
                Ok(text) => text,
                Err(_) => continue,
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!("Read error from {id}: {e}");
                break;
            }
        };
        let Some((to, forwarded)) = relay_envelope(&id, &text) else {
            continue;
        };
        if let Some(target) = peers.read().await.get(&to) {
            if target.send(Message::Text(forwarded)).is_err() {
                debug!("Forward to {to} failed, peer is leaving");
            }
        } else {
            debug!("No peer {to}, dropping message from {id}");
        }
    }

    peers.write().await.remove(&id);
    writer.abort();
    broadcast_peer_count(&peers).await;
    info!("User disconnected: {id}");
    Ok(())
}

/// Decides whether `text` from `from` gets forwarded.
///
/// Returns the target id and the message to deliver, which is the input
/// with `from` set. Invalid JSON, non-relayed types and a missing `to`
/// all yield `None`.
pub fn relay_envelope(from: &str, text: &str) -> Option<(String, String)> {
    let mut msg: serde_json::Map<String, Value> = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("invalid json: {e}");
            return None;
        }
    };
    let kind = msg.get("type").and_then(Value::as_str)?;
    if !RELAYED_TYPES.contains(&kind) {
        return None;
    }
    let to = msg
        .get("to")
        .and_then(Value::as_str)
        .filter(|to| !to.is_empty())?
        .to_string();
    msg.insert("from".into(), Value::String(from.to_string()));
    let forwarded = serde_json::to_string(&msg).ok()?;
    Some((to, forwarded))
}

async fn broadcast_peer_count(peers: &Peers) {
    let peers = peers.read().await;
    let msg = text_frame(json!({ "type": "peerCount", "count": peers.len() }));
    for tx in peers.values() {
        let _ = tx.send(msg.clone());
    }
}

fn text_frame(value: Value) -> Message {
    Message::Text(value.to_string())
}
