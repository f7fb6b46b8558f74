pub mod controller;
pub mod rtc;

use std::sync::Arc;

use async_trait::async_trait;
use clap::ValueEnum;
use datachannel_proto::IceCandidate;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::IceServerConfig;
use crate::session::SessionEvent;

pub use controller::PeerController;

/// Which half of the demo this client plays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Role {
    /// Sends and receives over the data channel (`start` message).
    #[default]
    #[value(name = "send")]
    SenderReceiver,
    /// Only receives (`receive` message); no send control.
    #[value(name = "receive")]
    ReceiverOnly,
}

#[derive(Debug, Clone)]
pub struct PeerOptions {
    pub ice_servers: Vec<IceServerConfig>,
    pub audio: bool,
}

impl Default for PeerOptions {
    fn default() -> Self {
        Self {
            ice_servers: Vec::new(),
            audio: true,
        }
    }
}

/// Everything a factory needs to build one peer connection.
#[derive(Debug, Clone)]
pub struct PeerSpec {
    pub role: Role,
    pub channel_id: String,
    pub options: PeerOptions,
}

/// Callbacks raised by a live peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    IceCandidate(IceCandidate),
    ChannelOpen,
    ChannelClosed,
    ChannelMessage(String),
}

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("peer setup failed: {0}")]
    Setup(String),
    #[error("offer generation failed: {0}")]
    Offer(String),
    #[error("remote answer rejected: {0}")]
    Answer(String),
    #[error("remote candidate rejected: {0}")]
    Candidate(String),
    #[error("data channel is not open")]
    ChannelNotOpen,
    #[error("data channel send failed: {0}")]
    Send(String),
    #[error("no active peer")]
    NoActivePeer,
}

/// Posts a peer's callbacks into the session queue, stamped with the peer's
/// generation so the session can drop callbacks from a disposed peer.
#[derive(Debug, Clone)]
pub struct PeerEventSink {
    tx: mpsc::UnboundedSender<SessionEvent>,
    generation: u64,
}

impl PeerEventSink {
    pub fn new(tx: mpsc::UnboundedSender<SessionEvent>, generation: u64) -> Self {
        Self { tx, generation }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn emit(&self, event: PeerEvent) {
        let _ = self.tx.send(SessionEvent::Peer {
            generation: self.generation,
            event,
        });
    }
}

/// One WebRTC peer connection with exactly one data channel.
#[async_trait]
pub trait Peer: Send + Sync {
    /// Creates the local offer, sets it as local description and returns its SDP.
    async fn generate_offer(&self) -> Result<String, PeerError>;

    /// Applies the remote SDP answer.
    async fn process_answer(&self, sdp_answer: String) -> Result<(), PeerError>;

    /// Adds a remote candidate. Must accept candidates that arrive before the
    /// remote description.
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), PeerError>;

    /// Writes a text payload to the data channel.
    async fn send(&self, payload: String) -> Result<(), PeerError>;

    async fn close(&self);
}

#[async_trait]
pub trait PeerFactory: Send + Sync {
    async fn create(&self, spec: PeerSpec, events: PeerEventSink)
    -> Result<Arc<dyn Peer>, PeerError>;
}
