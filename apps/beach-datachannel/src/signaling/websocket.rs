use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

use super::{SignalingError, SignalingSink};

/// WebSocket-backed signaling channel.
///
/// Outbound frames go through an unbounded queue drained by a writer task, so
/// writes keep call order and never block the session loop. Inbound text frames
/// are forwarded, in delivery order, to the receiver returned by [`connect`];
/// the receiver ends when the socket closes.
pub struct WebSocketSignaling {
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
}

pub async fn connect(
    url: &Url,
) -> Result<(Arc<WebSocketSignaling>, mpsc::UnboundedReceiver<String>), SignalingError> {
    match url.scheme() {
        "ws" | "wss" => {}
        other => {
            return Err(SignalingError::InvalidUrl(format!(
                "unsupported scheme '{other}' in {url}"
            )));
        }
    }
    let (ws_stream, _) = connect_async(url.as_str())
        .await
        .map_err(|err| SignalingError::Connect(err.to_string()))?;
    info!(url = %url, "signaling websocket connected");
    let (mut ws_write, mut ws_read) = ws_stream.split();

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if let Err(err) = ws_write.send(message).await {
                warn!(error = %err, "signaling websocket write failed");
                break;
            }
            if closing {
                break;
            }
        }
        let _ = ws_write.close().await;
        debug!("signaling writer stopped");
    });

    tokio::spawn(async move {
        while let Some(frame) = ws_read.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    if inbound_tx.send(text).is_err() {
                        break;
                    }
                }
                Ok(Message::Binary(bytes)) => {
                    debug!(len = bytes.len(), "ignoring binary signaling frame");
                }
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "signaling websocket closed by server");
                    break;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, "signaling websocket read failed");
                    break;
                }
            }
        }
        debug!("signaling reader stopped");
    });

    Ok((
        Arc::new(WebSocketSignaling {
            outbound: Mutex::new(Some(outbound_tx)),
        }),
        inbound_rx,
    ))
}

impl SignalingSink for WebSocketSignaling {
    fn send_text(&self, text: String) -> Result<(), SignalingError> {
        let guard = self.outbound.lock();
        let tx = guard.as_ref().ok_or(SignalingError::Closed)?;
        tx.send(Message::Text(text))
            .map_err(|_| SignalingError::Closed)
    }

    fn close(&self) {
        if let Some(tx) = self.outbound.lock().take() {
            info!("closing signaling websocket");
            let _ = tx.send(Message::Close(None));
        }
    }
}
