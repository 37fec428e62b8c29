mod common;

use common::{FakeEngine, Journal};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use voip_lib::{CallClient, CallState, Config, Notification, Notifier, SignalingServer};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

async fn start_relay() -> SocketAddr {
    let server = SignalingServer::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

async fn join(addr: SocketAddr) -> (Ws, String) {
    let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    let hello = next_json(&mut ws).await;
    assert_eq!(hello["type"], "myId");
    let id = hello["id"].as_str().unwrap().to_string();
    (ws, id)
}

async fn next_json(ws: &mut Ws) -> Value {
    loop {
        let frame = timeout(WAIT, ws.next())
            .await
            .expect("relay went quiet")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn send(ws: &mut Ws, value: Value) {
    ws.send(Message::Text(value.to_string())).await.unwrap();
}

#[tokio::test]
async fn assigns_ids_and_tracks_peer_count() {
    let addr = start_relay().await;

    let (mut alice, alice_id) = join(addr).await;
    assert_eq!(alice_id.len(), 32);
    assert_eq!(next_json(&mut alice).await, json!({ "type": "peerCount", "count": 1 }));

    let (mut bob, bob_id) = join(addr).await;
    assert_ne!(alice_id, bob_id);
    assert_eq!(next_json(&mut bob).await["count"], 2);
    assert_eq!(next_json(&mut alice).await["count"], 2);

    bob.close(None).await.unwrap();
    assert_eq!(next_json(&mut alice).await, json!({ "type": "peerCount", "count": 1 }));
}

#[tokio::test]
async fn forwards_to_the_addressed_peer_with_sender() {
    let addr = start_relay().await;
    let (mut alice, alice_id) = join(addr).await;
    next_json(&mut alice).await;
    let (mut bob, bob_id) = join(addr).await;
    next_json(&mut bob).await;
    next_json(&mut alice).await;

    send(&mut alice, json!({ "type": "chat", "to": bob_id, "text": "hi" })).await;
    send(&mut alice, json!({ "type": "offer", "offer": { "sdp": "lost" } })).await;
    send(&mut alice, json!({ "type": "offer", "to": "nobody", "offer": {} })).await;
    send(&mut alice, json!({ "type": "offer", "to": bob_id, "offer": { "type": "offer", "sdp": "v=0" } })).await;

    assert_eq!(
        next_json(&mut bob).await,
        json!({ "type": "offer", "to": bob_id, "from": alice_id, "offer": { "type": "offer", "sdp": "v=0" } })
    );

    send(&mut bob, json!({ "type": "hangup", "to": alice_id })).await;
    assert_eq!(
        next_json(&mut alice).await,
        json!({ "type": "hangup", "to": alice_id, "from": bob_id })
    );
}

async fn start_client(addr: SocketAddr) -> (CallClient, mpsc::UnboundedReceiver<Notification>, Journal) {
    let config = Config {
        signaling_url: format!("ws://{addr}/ws"),
        reconnect_delay_ms: None,
        ..Config::default()
    };
    let journal = Journal::default();
    let mut engine = FakeEngine::new(journal.clone(), Default::default());
    engine.auto_connect = true;
    let (notifier, notes) = Notifier::channel();
    let client = CallClient::connect_with_engine(&config, Box::new(engine), notifier)
        .await
        .unwrap();
    (client, notes, journal)
}

/// Waits until the client knows its id and has local audio.
async fn ready(notes: &mut mpsc::UnboundedReceiver<Notification>) -> String {
    let mut id = None;
    let mut ready = false;
    while id.is_none() || !ready {
        match timeout(WAIT, notes.recv()).await.expect("no notification").unwrap() {
            Notification::LocalId(local) => id = Some(local),
            Notification::State(CallState::Ready) => ready = true,
            _ => {}
        }
    }
    id.unwrap_or_default()
}

async fn reach(notes: &mut mpsc::UnboundedReceiver<Notification>, state: CallState) {
    loop {
        let note = timeout(WAIT, notes.recv()).await.expect("no notification").unwrap();
        if note == Notification::State(state) {
            return;
        }
    }
}

#[tokio::test]
async fn two_clients_call_each_other_through_the_relay() {
    let addr = start_relay().await;
    let (alice, mut alice_notes, _) = start_client(addr).await;
    let (bob, mut bob_notes, bob_journal) = start_client(addr).await;
    ready(&mut alice_notes).await;
    let bob_id = ready(&mut bob_notes).await;

    alice.place_call(bob_id);
    reach(&mut bob_notes, CallState::Answering).await;
    reach(&mut bob_notes, CallState::Connected).await;
    reach(&mut alice_notes, CallState::Calling).await;
    reach(&mut alice_notes, CallState::Connected).await;
    assert_eq!(bob_journal.matching("remote"), vec!["remote media#1 offer"]);

    alice.hang_up();
    reach(&mut alice_notes, CallState::Ready).await;
    reach(&mut bob_notes, CallState::Ready).await;
    assert_eq!(bob_journal.matching("close"), vec!["close media#1"]);

    alice.shutdown().await;
    bob.shutdown().await;
}

/// Relay stand-in that hangs up on its first client and keeps later ones.
async fn start_flaky_relay() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut served = 0;
        while let Ok((stream, _)) = listener.accept().await {
            served += 1;
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let id = format!("id{served}");
            ws.send(Message::Text(json!({ "type": "myId", "id": id }).to_string()))
                .await
                .unwrap();
            if served == 1 {
                tokio::time::sleep(Duration::from_millis(100)).await;
                ws.close(None).await.unwrap();
            } else {
                tokio::spawn(async move { while ws.next().await.is_some() {} });
            }
        }
    });
    addr
}

#[tokio::test]
async fn client_reconnects_after_losing_the_relay() {
    let addr = start_flaky_relay().await;
    let config = Config {
        signaling_url: format!("ws://{addr}/ws"),
        reconnect_delay_ms: Some(50),
        ..Config::default()
    };
    let journal = Journal::default();
    let engine = FakeEngine::new(journal.clone(), Default::default());
    let (notifier, mut notes) = Notifier::channel();
    let client = CallClient::connect_with_engine(&config, Box::new(engine), notifier)
        .await
        .unwrap();

    assert_eq!(ready(&mut notes).await, "id1");

    let mut went_idle = false;
    loop {
        match timeout(WAIT, notes.recv()).await.expect("no notification").unwrap() {
            Notification::State(CallState::Idle) => went_idle = true,
            Notification::Notice(text) => {
                assert_eq!(text, "signaling link is down");
                break;
            }
            _ => {}
        }
    }
    assert!(went_idle);

    assert_eq!(ready(&mut notes).await, "id2");
    assert_eq!(journal.matching("acquire").len(), 2);
    assert_eq!(journal.matching("release").len(), 1);

    client.shutdown().await;
}
