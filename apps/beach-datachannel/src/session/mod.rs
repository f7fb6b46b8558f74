//! The session loop: one task owns the state machine, the signaling client and
//! the peer controller, and handles every event strictly one at a time.

mod error;

pub use error::SessionError;

use std::sync::Arc;

use datachannel_proto::ServerMessage;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::channel_id::ChannelIdAllocator;
use crate::peer::{PeerController, PeerError, PeerEvent, PeerFactory, PeerOptions, Role};
use crate::signaling::SignalingClient;
use crate::state::{SessionState, SessionStateMachine};
use crate::surface::ControlSurface;

/// User actions coming from the controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCommand {
    Start(Role),
    Stop,
    Send(String),
}

#[derive(Debug)]
pub enum SessionEvent {
    Ui(UiCommand),
    /// One inbound signaling frame, in delivery order.
    Signaling(String),
    SignalingClosed,
    Peer {
        generation: u64,
        event: PeerEvent,
    },
    OfferReady {
        generation: u64,
        result: Result<String, PeerError>,
    },
    AnswerApplied {
        generation: u64,
        result: Result<(), PeerError>,
    },
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub role: Role,
    pub channel_prefix: String,
    pub peer: PeerOptions,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            role: Role::default(),
            channel_prefix: crate::channel_id::DEFAULT_CHANNEL_PREFIX.to_string(),
            peer: PeerOptions::default(),
        }
    }
}

/// Cloneable entry point for feeding events into a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionEvent>,
    default_role: Role,
}

impl SessionHandle {
    pub fn start(&self) -> bool {
        self.send(SessionEvent::Ui(UiCommand::Start(self.default_role)))
    }

    pub fn start_as(&self, role: Role) -> bool {
        self.send(SessionEvent::Ui(UiCommand::Start(role)))
    }

    pub fn stop(&self) -> bool {
        self.send(SessionEvent::Ui(UiCommand::Stop))
    }

    pub fn send_data(&self, payload: impl Into<String>) -> bool {
        self.send(SessionEvent::Ui(UiCommand::Send(payload.into())))
    }

    pub fn shutdown(&self) -> bool {
        self.send(SessionEvent::Shutdown)
    }

    /// Whether the session loop has exited.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Forwards inbound signaling frames into the session in delivery order.
    /// When the stream ends the session is told the channel closed.
    pub fn pump_signaling(
        &self,
        mut inbound: mpsc::UnboundedReceiver<String>,
    ) -> tokio::task::JoinHandle<()> {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            while let Some(text) = inbound.recv().await {
                if tx.send(SessionEvent::Signaling(text)).is_err() {
                    return;
                }
            }
            let _ = tx.send(SessionEvent::SignalingClosed);
        })
    }

    fn send(&self, event: SessionEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

pub struct Session {
    machine: SessionStateMachine,
    role: Role,
    default_role: Role,
    signaling: SignalingClient,
    peers: PeerController,
    surface: Box<dyn ControlSurface>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl Session {
    /// Builds a session in `CanStart` and presents its initial controls. The
    /// returned receiver is the session's event queue; hand it to [`Session::run`].
    pub fn new(
        config: SessionConfig,
        signaling: SignalingClient,
        factory: Arc<dyn PeerFactory>,
        surface: Box<dyn ControlSurface>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let peers = PeerController::new(
            factory,
            signaling.clone(),
            ChannelIdAllocator::new(config.channel_prefix),
            config.peer,
            events.clone(),
        );
        let mut session = Self {
            machine: SessionStateMachine::new(),
            role: config.role,
            default_role: config.role,
            signaling,
            peers,
            surface,
            events,
        };
        session.present();
        session.surface.set_send_enabled(false);
        (session, events_rx)
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            tx: self.events.clone(),
            default_role: self.default_role,
        }
    }

    pub fn state(&self) -> SessionState {
        self.machine.state()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn has_active_peer(&self) -> bool {
        self.peers.has_active_peer()
    }

    pub fn active_channel_id(&self) -> Option<&str> {
        self.peers.active_channel_id()
    }

    /// Drains the event queue until shutdown, then tears the session down.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<SessionEvent>) {
        info!(role = ?self.role, "session running");
        while let Some(event) = events.recv().await {
            if matches!(event, SessionEvent::Shutdown) {
                break;
            }
            self.dispatch(event).await;
        }
        self.teardown().await;
    }

    /// Handles one event to completion.
    pub async fn dispatch(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Ui(UiCommand::Start(role)) => self.start(role).await,
            SessionEvent::Ui(UiCommand::Stop) => self.stop().await,
            SessionEvent::Ui(UiCommand::Send(payload)) => self.send_data(payload).await,
            SessionEvent::Signaling(text) => self.on_signaling(text).await,
            SessionEvent::SignalingClosed => self.fail(SessionError::ChannelClosed).await,
            SessionEvent::Peer { generation, event } => {
                self.peers
                    .handle_peer_event(generation, event, self.surface.as_mut());
            }
            SessionEvent::OfferReady { generation, result } => {
                if let Err(err) = self.peers.offer_ready(generation, result) {
                    self.fail(SessionError::Negotiation(err)).await;
                }
            }
            SessionEvent::AnswerApplied { generation, result } => {
                self.peers.answer_applied(generation, result);
            }
            SessionEvent::Shutdown => self.teardown().await,
        }
    }

    /// Closes the peer and the signaling channel. No stop message is sent.
    pub async fn teardown(&mut self) {
        info!("tearing down session");
        self.peers.dispose().await;
        self.signaling.close();
    }

    async fn start(&mut self, role: Role) {
        if !self.machine.request_start() {
            debug!(state = ?self.state(), "start ignored");
            return;
        }
        info!(?role, "starting");
        self.role = role;
        self.present();
        if let Err(err) = self.peers.begin(role).await {
            self.fail(SessionError::Negotiation(err)).await;
        }
    }

    async fn stop(&mut self) {
        if !self.machine.request_stop() {
            debug!(state = ?self.state(), "stop ignored");
            return;
        }
        info!("stopping");
        self.present();
        if self.peers.dispose().await {
            self.surface.set_send_enabled(false);
            self.signaling.send_stop();
        }
    }

    async fn send_data(&mut self, payload: String) {
        match self.peers.send_data(payload).await {
            Ok(()) => self.surface.clear_input(),
            Err(err) => warn!(error = %err, "data not sent"),
        }
    }

    async fn on_signaling(&mut self, text: String) {
        info!(message = %text, "received message");
        let message = match SignalingClient::decode(&text) {
            Ok(message) => message,
            Err(err) => {
                self.fail(SessionError::Protocol(err)).await;
                return;
            }
        };
        match message {
            ServerMessage::StartResponse { sdp_answer } => {
                if self.machine.on_start_confirmed() {
                    self.present();
                    self.peers.apply_remote_answer(sdp_answer);
                } else {
                    warn!(state = ?self.state(), "ignoring startResponse outside of start");
                }
            }
            ServerMessage::Error { message } => {
                self.fail(SessionError::Signaling(message)).await;
            }
            ServerMessage::IceCandidate { candidate } => {
                self.peers.add_remote_ice_candidate(candidate);
            }
        }
    }

    /// Reports `err` and, when it is the reverting kind and the session is
    /// starting, settles back to `CanStart` and drops the half-built peer.
    async fn fail(&mut self, err: SessionError) {
        error!(error = %err, state = ?self.state(), "session error");
        self.surface.report_error(&err);
        if !err.reverts_start() {
            return;
        }
        let reverted = match err {
            SessionError::Protocol(_) => self.machine.on_unrecognized_message(),
            _ => self.machine.on_failure(),
        };
        if reverted {
            if self.peers.dispose().await {
                self.surface.set_send_enabled(false);
            }
            self.present();
        }
    }

    fn present(&mut self) {
        self.surface.set_controls(self.machine.state().controls());
    }
}
