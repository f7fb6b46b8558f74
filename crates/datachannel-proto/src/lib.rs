//! Wire protocol spoken between the data-channel client and the media server's
//! signaling endpoint. Every frame is a JSON object whose `id` field names the
//! message; the remaining fields are the message payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// ICE candidate as exchanged in `onIceCandidate` / `iceCandidate` frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(
        rename = "sdpMLineIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_mline_index: Option<u16>,
}

/// Messages sent from the client to the signaling endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "id", rename_all = "camelCase")]
pub enum ClientMessage {
    Start {
        #[serde(rename = "sdpOffer")]
        sdp_offer: String,
    },
    Receive {
        #[serde(rename = "sdpOffer")]
        sdp_offer: String,
    },
    Stop,
    OnIceCandidate {
        candidate: IceCandidate,
    },
}

impl ClientMessage {
    pub fn id(&self) -> &'static str {
        match self {
            ClientMessage::Start { .. } => "start",
            ClientMessage::Receive { .. } => "receive",
            ClientMessage::Stop => "stop",
            ClientMessage::OnIceCandidate { .. } => "onIceCandidate",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Messages received from the signaling endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "id", rename_all = "camelCase")]
pub enum ServerMessage {
    StartResponse {
        #[serde(rename = "sdpAnswer")]
        sdp_answer: String,
    },
    Error {
        message: String,
    },
    IceCandidate {
        candidate: IceCandidate,
    },
}

const SERVER_IDS: [&str; 3] = ["startResponse", "error", "iceCandidate"];

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed json: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("message is not a json object")]
    NotAnObject,
    #[error("message has no string id")]
    MissingId,
    #[error("unrecognized message id '{0}'")]
    Unrecognized(String),
    #[error("invalid '{id}' payload: {source}")]
    InvalidPayload {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

impl DecodeError {
    /// Whether the frame could not be parsed at all. Such frames carry no
    /// trustworthy id, so callers must not act on them beyond reporting.
    pub fn is_malformed(&self) -> bool {
        matches!(self, DecodeError::Malformed(_))
    }
}

/// Decode one inbound text frame.
pub fn decode_server_message(text: &str) -> Result<ServerMessage, DecodeError> {
    let value: Value = serde_json::from_str(text).map_err(DecodeError::Malformed)?;
    let object = value.as_object().ok_or(DecodeError::NotAnObject)?;
    let id = object
        .get("id")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingId)?
        .to_string();
    if !SERVER_IDS.contains(&id.as_str()) {
        return Err(DecodeError::Unrecognized(id));
    }
    serde_json::from_value(value).map_err(|source| DecodeError::InvalidPayload { id, source })
}
