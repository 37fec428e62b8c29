//! Terminal call client.
//!
//! Reads `call <peer-id>`, `hangup` and `quit` from stdin and prints
//! session notifications as they arrive.

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use voip_lib::session::timer::format_duration;
use voip_lib::{logger, CallClient, Config, Notification, Notifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::init();
    let config = Config::from_env();
    config.validate()?;

    let (notifier, mut notifications) = Notifier::channel();
    let client = CallClient::connect(&config, notifier)
        .await
        .with_context(|| format!("connecting to {}", config.signaling_url))?;

    tokio::spawn(async move {
        while let Some(notification) = notifications.recv().await {
            match notification {
                Notification::LocalId(id) => println!("Your ID: {id}"),
                Notification::PeerCount(count) => println!("Users online: {count}"),
                Notification::State(state) => println!("Status: {state}"),
                Notification::Duration(secs) => println!("Call duration: {}", format_duration(secs)),
                Notification::Notice(text) => println!("! {text}"),
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let mut words = line.split_whitespace();
        match (words.next(), words.next()) {
            (Some("call"), Some(peer)) => client.place_call(peer),
            (Some("call"), None) => println!("usage: call <peer-id>"),
            (Some("hangup"), _) => client.hang_up(),
            (Some("mic"), _) => client.acquire_local_media(),
            (Some("quit"), _) => break,
            (None, _) => {}
            (Some(other), _) => println!("unknown command: {other}"),
        }
    }

    client.shutdown().await;
    Ok(())
}
