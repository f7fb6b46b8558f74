pub mod memory;
pub mod websocket;

use std::sync::Arc;

use datachannel_proto::{ClientMessage, DecodeError, IceCandidate, ServerMessage};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("signaling channel closed")]
    Closed,
    #[error("invalid signaling url: {0}")]
    InvalidUrl(String),
    #[error("websocket connect failed: {0}")]
    Connect(String),
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Outbound half of the duplex signaling channel. Writes are queued in order
/// and never wait for the peer.
pub trait SignalingSink: Send + Sync {
    fn send_text(&self, text: String) -> Result<(), SignalingError>;

    /// Closes the channel. Later writes fail with [`SignalingError::Closed`].
    fn close(&self);
}

/// Builds protocol frames and writes them to the sink, fire-and-forget.
#[derive(Clone)]
pub struct SignalingClient {
    sink: Arc<dyn SignalingSink>,
}

impl SignalingClient {
    pub fn new(sink: Arc<dyn SignalingSink>) -> Self {
        Self { sink }
    }

    pub fn send_start(&self, sdp_offer: String) {
        self.send(ClientMessage::Start { sdp_offer });
    }

    pub fn send_receive(&self, sdp_offer: String) {
        self.send(ClientMessage::Receive { sdp_offer });
    }

    pub fn send_stop(&self) {
        self.send(ClientMessage::Stop);
    }

    pub fn send_ice_candidate(&self, candidate: IceCandidate) {
        self.send(ClientMessage::OnIceCandidate { candidate });
    }

    pub fn decode(text: &str) -> Result<ServerMessage, DecodeError> {
        datachannel_proto::decode_server_message(text)
    }

    pub fn close(&self) {
        self.sink.close();
    }

    fn send(&self, message: ClientMessage) {
        let id = message.id();
        let result = message
            .to_json()
            .map_err(SignalingError::from)
            .and_then(|text| {
                debug!(message = %text, "sending message");
                self.sink.send_text(text)
            });
        if let Err(err) = result {
            warn!(id, error = %err, "dropping outbound signaling message");
        }
    }
}
