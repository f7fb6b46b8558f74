use datachannel_proto::DecodeError;
use thiserror::Error;

use crate::peer::PeerError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("protocol error: {0}")]
    Protocol(#[from] DecodeError),
    #[error("error message from server: {0}")]
    Signaling(String),
    #[error("signaling channel closed")]
    ChannelClosed,
    #[error("negotiation failed: {0}")]
    Negotiation(PeerError),
    #[error("candidate error: {0}")]
    Candidate(PeerError),
}

impl SessionError {
    /// Whether the error moves a starting session back to `CanStart`.
    /// Unparseable frames and candidate failures never do.
    pub fn reverts_start(&self) -> bool {
        match self {
            SessionError::Protocol(err) => !err.is_malformed(),
            SessionError::Signaling(_)
            | SessionError::ChannelClosed
            | SessionError::Negotiation(_) => true,
            SessionError::Candidate(_) => false,
        }
    }
}
