use std::sync::Arc;

use datachannel_proto::IceCandidate;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use super::{Peer, PeerError, PeerEvent, PeerEventSink, PeerFactory, PeerOptions, PeerSpec, Role};
use crate::channel_id::ChannelIdAllocator;
use crate::session::{SessionError, SessionEvent};
use crate::signaling::SignalingClient;
use crate::surface::ControlSurface;

struct ActivePeer {
    peer: Arc<dyn Peer>,
    generation: u64,
    role: Role,
    channel_id: String,
    channel_open: bool,
    offer_sent: bool,
    pending_local: Vec<IceCandidate>,
}

/// Owns the single live peer connection and wires its callbacks to signaling
/// and to the data-channel controls.
pub struct PeerController {
    factory: Arc<dyn PeerFactory>,
    signaling: SignalingClient,
    channel_ids: ChannelIdAllocator,
    options: PeerOptions,
    events: mpsc::UnboundedSender<SessionEvent>,
    active: Option<ActivePeer>,
    generation: u64,
}

impl PeerController {
    pub fn new(
        factory: Arc<dyn PeerFactory>,
        signaling: SignalingClient,
        channel_ids: ChannelIdAllocator,
        options: PeerOptions,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            factory,
            signaling,
            channel_ids,
            options,
            events,
            active: None,
            generation: 0,
        }
    }

    pub fn has_active_peer(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_channel_id(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.channel_id.as_str())
    }

    pub async fn begin_send(&mut self) -> Result<(), PeerError> {
        self.begin(Role::SenderReceiver).await
    }

    pub async fn begin_receive(&mut self) -> Result<(), PeerError> {
        self.begin(Role::ReceiverOnly).await
    }

    /// Replaces any live peer with a fresh one for `role` and starts offer
    /// generation. The offer comes back as [`SessionEvent::OfferReady`].
    pub async fn begin(&mut self, role: Role) -> Result<(), PeerError> {
        self.dispose().await;

        let channel_id = self.channel_ids.next();
        self.generation += 1;
        let generation = self.generation;
        info!(
            channel_id = %channel_id,
            ?role,
            generation,
            "creating peer and generating local sdp offer"
        );

        let spec = PeerSpec {
            role,
            channel_id: channel_id.clone(),
            options: self.options.clone(),
        };
        let sink = PeerEventSink::new(self.events.clone(), generation);
        let peer = self.factory.create(spec, sink).await?;
        self.active = Some(ActivePeer {
            peer: peer.clone(),
            generation,
            role,
            channel_id,
            channel_open: false,
            offer_sent: false,
            pending_local: Vec::new(),
        });

        let events = self.events.clone();
        tokio::spawn(async move {
            let result = peer.generate_offer().await;
            let _ = events.send(SessionEvent::OfferReady { generation, result });
        });
        Ok(())
    }

    /// Handles a finished offer: sends `start`/`receive` on success, then any
    /// local candidates gathered before it. Hands the error back on failure.
    /// Offers from a disposed peer are dropped.
    pub fn offer_ready(
        &mut self,
        generation: u64,
        result: Result<String, PeerError>,
    ) -> Result<(), PeerError> {
        let signaling = self.signaling.clone();
        let Some(active) = self.current_mut(generation) else {
            debug!(generation, "discarding offer from disposed peer");
            return Ok(());
        };
        let sdp_offer = result?;
        info!(channel_id = %active.channel_id, "local sdp offer ready");
        match active.role {
            Role::SenderReceiver => signaling.send_start(sdp_offer),
            Role::ReceiverOnly => signaling.send_receive(sdp_offer),
        }
        active.offer_sent = true;
        let pending = std::mem::take(&mut active.pending_local);
        if !pending.is_empty() {
            debug!(count = pending.len(), "flushing local candidates held for the offer");
        }
        for candidate in pending {
            signaling.send_ice_candidate(candidate);
        }
        Ok(())
    }

    /// Starts applying the server's answer. The outcome comes back as
    /// [`SessionEvent::AnswerApplied`].
    pub fn apply_remote_answer(&mut self, sdp_answer: String) {
        let Some(active) = self.active.as_ref() else {
            warn!("sdp answer received with no active peer");
            return;
        };
        info!(channel_id = %active.channel_id, "sdp answer received from server, processing");
        let peer = active.peer.clone();
        let generation = active.generation;
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = peer.process_answer(sdp_answer).await;
            let _ = events.send(SessionEvent::AnswerApplied { generation, result });
        });
    }

    /// Logs a failed answer. The session has already settled, so nothing else
    /// changes.
    pub fn answer_applied(&mut self, generation: u64, result: Result<(), PeerError>) {
        if self.current(generation).is_none() {
            return;
        }
        match result {
            Ok(()) => debug!(generation, "remote description applied"),
            Err(err) => error!(
                error = %SessionError::Negotiation(err),
                "failed to process sdp answer"
            ),
        }
    }

    pub fn add_remote_ice_candidate(&mut self, candidate: IceCandidate) {
        let Some(active) = self.active.as_ref() else {
            warn!(candidate = %candidate.candidate, "dropping remote candidate: no active peer");
            return;
        };
        debug!(candidate = %candidate.candidate, "adding remote candidate");
        let peer = active.peer.clone();
        tokio::spawn(async move {
            if let Err(err) = peer.add_ice_candidate(candidate).await {
                warn!(error = %SessionError::Candidate(err), "error adding candidate");
            }
        });
    }

    pub async fn send_data(&mut self, payload: String) -> Result<(), PeerError> {
        let active = self.active.as_ref().ok_or(PeerError::NoActivePeer)?;
        if active.role != Role::SenderReceiver || !active.channel_open {
            return Err(PeerError::ChannelNotOpen);
        }
        info!(data = %payload, "sending data");
        active.peer.send(payload).await
    }

    /// Routes a peer callback. Callbacks from a disposed peer are ignored.
    pub fn handle_peer_event(
        &mut self,
        generation: u64,
        event: PeerEvent,
        surface: &mut dyn ControlSurface,
    ) {
        let signaling = self.signaling.clone();
        let Some(active) = self.current_mut(generation) else {
            trace!(generation, ?event, "ignoring event from disposed peer");
            return;
        };
        let can_send = active.role == Role::SenderReceiver;
        match event {
            // the server only knows the session once the offer is out
            PeerEvent::IceCandidate(candidate) if !active.offer_sent => {
                debug!(candidate = %candidate.candidate, "holding local candidate until offer is sent");
                active.pending_local.push(candidate);
            }
            PeerEvent::IceCandidate(candidate) => {
                debug!(candidate = %candidate.candidate, "local candidate");
                signaling.send_ice_candidate(candidate);
            }
            PeerEvent::ChannelOpen => {
                info!(channel_id = %active.channel_id, "data channel open");
                active.channel_open = true;
                if can_send {
                    surface.set_send_enabled(true);
                }
            }
            PeerEvent::ChannelClosed => {
                info!(channel_id = %active.channel_id, "data channel closed");
                active.channel_open = false;
                if can_send {
                    surface.set_send_enabled(false);
                }
            }
            PeerEvent::ChannelMessage(data) => {
                info!(data = %data, "received data");
                surface.show_received(&data);
            }
        }
    }

    /// Closes the live peer, if any. Returns whether one was released.
    pub async fn dispose(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };
        info!(channel_id = %active.channel_id, generation = active.generation, "disposing peer");
        active.peer.close().await;
        true
    }

    fn current(&self, generation: u64) -> Option<&ActivePeer> {
        self.active
            .as_ref()
            .filter(|active| active.generation == generation)
    }

    fn current_mut(&mut self, generation: u64) -> Option<&mut ActivePeer> {
        self.active
            .as_mut()
            .filter(|active| active.generation == generation)
    }
}
