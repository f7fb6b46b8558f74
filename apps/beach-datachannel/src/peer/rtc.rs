use std::sync::Arc;

use async_trait::async_trait;
use datachannel_proto::IceCandidate;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;

use super::{Peer, PeerError, PeerEvent, PeerEventSink, PeerFactory, PeerSpec, Role};

/// Builds webrtc-rs peer connections.
#[derive(Debug, Default, Clone)]
pub struct RtcPeerFactory;

impl RtcPeerFactory {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Default)]
struct Negotiation {
    remote_description_set: bool,
    pending_candidates: Vec<RTCIceCandidateInit>,
}

pub struct RtcPeer {
    channel_id: String,
    peer_connection: Arc<RTCPeerConnection>,
    data_channel: Arc<RTCDataChannel>,
    negotiation: AsyncMutex<Negotiation>,
}

fn setup_err(err: webrtc::Error) -> PeerError {
    PeerError::Setup(err.to_string())
}

fn to_init(candidate: IceCandidate) -> RTCIceCandidateInit {
    RTCIceCandidateInit {
        candidate: candidate.candidate,
        sdp_mid: candidate.sdp_mid,
        sdp_mline_index: candidate.sdp_mline_index,
        username_fragment: None,
    }
}

#[async_trait]
impl PeerFactory for RtcPeerFactory {
    async fn create(
        &self,
        spec: PeerSpec,
        events: PeerEventSink,
    ) -> Result<Arc<dyn Peer>, PeerError> {
        Ok(Arc::new(self.build(spec, events).await?))
    }
}

impl RtcPeerFactory {
    /// Builds the concrete peer; [`PeerFactory::create`] wraps it for the controller.
    pub async fn build(
        &self,
        spec: PeerSpec,
        events: PeerEventSink,
    ) -> Result<RtcPeer, PeerError> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs().map_err(setup_err)?;
        let registry =
            register_default_interceptors(Registry::new(), &mut media_engine).map_err(setup_err)?;
        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: spec
                .options
                .ice_servers
                .iter()
                .map(|server| server.to_rtc())
                .collect(),
            ..Default::default()
        };
        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .map_err(setup_err)?,
        );

        if spec.options.audio {
            let direction = match spec.role {
                Role::SenderReceiver => RTCRtpTransceiverDirection::Sendrecv,
                Role::ReceiverOnly => RTCRtpTransceiverDirection::Recvonly,
            };
            peer_connection
                .add_transceiver_from_kind(
                    RTPCodecType::Audio,
                    Some(RTCRtpTransceiverInit {
                        direction,
                        send_encodings: vec![],
                    }),
                )
                .await
                .map_err(setup_err)?;
        }

        let data_channel = peer_connection
            .create_data_channel(
                &spec.channel_id,
                Some(RTCDataChannelInit {
                    ordered: Some(true),
                    ..Default::default()
                }),
            )
            .await
            .map_err(setup_err)?;

        if spec.role == Role::SenderReceiver {
            let on_open = events.clone();
            data_channel.on_open(Box::new(move || {
                on_open.emit(PeerEvent::ChannelOpen);
                Box::pin(async {})
            }));
            let on_close = events.clone();
            data_channel.on_close(Box::new(move || {
                on_close.emit(PeerEvent::ChannelClosed);
                Box::pin(async {})
            }));
        }
        let on_message = events.clone();
        data_channel.on_message(Box::new(move |message: DataChannelMessage| {
            let text = String::from_utf8_lossy(&message.data).into_owned();
            on_message.emit(PeerEvent::ChannelMessage(text));
            Box::pin(async {})
        }));

        let on_candidate = events;
        peer_connection.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            if let Some(candidate) = candidate {
                match candidate.to_json() {
                    Ok(init) => on_candidate.emit(PeerEvent::IceCandidate(IceCandidate {
                        candidate: init.candidate,
                        sdp_mid: init.sdp_mid,
                        sdp_mline_index: init.sdp_mline_index,
                    })),
                    Err(err) => warn!(error = %err, "failed to serialize local candidate"),
                }
            }
            Box::pin(async {})
        }));

        Ok(RtcPeer {
            channel_id: spec.channel_id,
            peer_connection,
            data_channel,
            negotiation: AsyncMutex::new(Negotiation::default()),
        })
    }
}

#[async_trait]
impl Peer for RtcPeer {
    async fn generate_offer(&self) -> Result<String, PeerError> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(|err| PeerError::Offer(err.to_string()))?;
        self.peer_connection
            .set_local_description(offer)
            .await
            .map_err(|err| PeerError::Offer(err.to_string()))?;
        // candidates trickle through on_ice_candidate; no need to wait for gathering
        let local = self
            .peer_connection
            .local_description()
            .await
            .ok_or_else(|| PeerError::Offer("local description missing".into()))?;
        Ok(local.sdp)
    }

    async fn process_answer(&self, sdp_answer: String) -> Result<(), PeerError> {
        let answer = RTCSessionDescription::answer(sdp_answer)
            .map_err(|err| PeerError::Answer(err.to_string()))?;
        let mut negotiation = self.negotiation.lock().await;
        self.peer_connection
            .set_remote_description(answer)
            .await
            .map_err(|err| PeerError::Answer(err.to_string()))?;
        negotiation.remote_description_set = true;

        let pending = std::mem::take(&mut negotiation.pending_candidates);
        if !pending.is_empty() {
            debug!(
                channel_id = %self.channel_id,
                count = pending.len(),
                "flushing queued remote candidates"
            );
        }
        for candidate in pending {
            if let Err(err) = self.peer_connection.add_ice_candidate(candidate).await {
                warn!(error = %err, "error adding queued candidate");
            }
        }
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), PeerError> {
        let init = to_init(candidate);
        let mut negotiation = self.negotiation.lock().await;
        if !negotiation.remote_description_set {
            negotiation.pending_candidates.push(init);
            return Ok(());
        }
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .map_err(|err| PeerError::Candidate(err.to_string()))
    }

    async fn send(&self, payload: String) -> Result<(), PeerError> {
        if self.data_channel.ready_state() != RTCDataChannelState::Open {
            return Err(PeerError::ChannelNotOpen);
        }
        self.data_channel
            .send_text(payload)
            .await
            .map(|_| ())
            .map_err(|err| PeerError::Send(err.to_string()))
    }

    async fn close(&self) {
        if let Err(err) = self.peer_connection.close().await {
            warn!(channel_id = %self.channel_id, error = %err, "error closing peer connection");
        }
    }
}
