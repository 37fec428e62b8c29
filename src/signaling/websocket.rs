use crate::error::LinkError;
use crate::session::SessionEvent;
use crate::signaling::link::SignalingLink;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Opens a websocket to the relay and returns the open link.
///
/// Inbound messages and the final close are delivered to `events`.
pub async fn connect(
    url: &str,
    events: mpsc::UnboundedSender<SessionEvent>,
) -> Result<SignalingLink, LinkError> {
    let (ws_stream, _) = connect_async(url).await?;
    info!("WebSocket connected to {url}");

    let (link, inbound, mut outbound) = SignalingLink::pair(events);
    link.mark_open();
    let (mut ws_write, mut ws_read) = ws_stream.split();

    let writer = tokio::spawn(async move {
        while let Some(text) = outbound.recv().await {
            if ws_write.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = ws_write.close().await;
    });

    tokio::spawn(async move {
        while let Some(frame) = ws_read.next().await {
            match frame {
                Ok(Message::Text(text)) => inbound.deliver(&text),
                Ok(Message::Binary(data)) => match String::from_utf8(data) {
                    Ok(text) => inbound.deliver(&text),
                    Err(_) => debug!("Ignoring non UTF-8 binary frame"),
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!("WebSocket receive error: {e}");
                    break;
                }
            }
        }
        info!("WebSocket disconnected");
        writer.abort();
        inbound.closed();
    });

    Ok(link)
}
