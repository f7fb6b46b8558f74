#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use beach_datachannel::peer::{PeerEventSink, PeerSpec};
use beach_datachannel::signaling::memory::MemorySignaling;
use beach_datachannel::{
    ControlSurface, Controls, Peer, PeerError, PeerEvent, PeerFactory, Role, Session,
    SessionConfig, SessionError, SessionEvent, SessionState, SignalingClient, UiCommand,
};
use datachannel_proto::IceCandidate;
use serde_json::Value;
use tokio::sync::mpsc;

pub struct FakePeer {
    pub spec: PeerSpec,
    offer: String,
    fail_offer: bool,
    fail_answer: bool,
    fail_candidate: bool,
    candidate_during_offer: bool,
    sink: PeerEventSink,
    pub answers: Mutex<Vec<String>>,
    pub candidates: Mutex<Vec<IceCandidate>>,
    pub sent: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl FakePeer {
    pub fn emit(&self, event: PeerEvent) {
        self.sink.emit(event);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn answers(&self) -> Vec<String> {
        self.answers.lock().unwrap().clone()
    }

    pub fn candidates(&self) -> Vec<IceCandidate> {
        self.candidates.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Peer for FakePeer {
    async fn generate_offer(&self) -> Result<String, PeerError> {
        if self.candidate_during_offer {
            self.sink.emit(PeerEvent::IceCandidate(candidate(&format!(
                "candidate:early-{}",
                self.offer
            ))));
        }
        if self.fail_offer {
            return Err(PeerError::Offer("scripted failure".into()));
        }
        Ok(self.offer.clone())
    }

    async fn process_answer(&self, sdp_answer: String) -> Result<(), PeerError> {
        self.answers.lock().unwrap().push(sdp_answer);
        if self.fail_answer {
            return Err(PeerError::Answer("scripted answer failure".into()));
        }
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), PeerError> {
        self.candidates.lock().unwrap().push(candidate);
        if self.fail_candidate {
            return Err(PeerError::Candidate("scripted candidate failure".into()));
        }
        Ok(())
    }

    async fn send(&self, payload: String) -> Result<(), PeerError> {
        self.sent.lock().unwrap().push(payload);
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Hands out peers whose offers are "O1", "O2", ... in creation order.
#[derive(Default)]
pub struct FakeFactory {
    pub peers: Mutex<Vec<Arc<FakePeer>>>,
    pub fail_offer: AtomicBool,
    pub fail_answer: AtomicBool,
    pub fail_candidate: AtomicBool,
    /// Peers emit one local candidate from inside offer generation.
    pub candidate_during_offer: AtomicBool,
}

impl FakeFactory {
    pub fn peer(&self, index: usize) -> Arc<FakePeer> {
        self.peers.lock().unwrap()[index].clone()
    }

    pub fn created(&self) -> usize {
        self.peers.lock().unwrap().len()
    }

    pub fn live(&self) -> usize {
        self.peers
            .lock()
            .unwrap()
            .iter()
            .filter(|peer| !peer.is_closed())
            .count()
    }
}

#[async_trait]
impl PeerFactory for FakeFactory {
    async fn create(
        &self,
        spec: PeerSpec,
        events: PeerEventSink,
    ) -> Result<Arc<dyn Peer>, PeerError> {
        let mut peers = self.peers.lock().unwrap();
        let peer = Arc::new(FakePeer {
            spec,
            offer: format!("O{}", peers.len() + 1),
            fail_offer: self.fail_offer.load(Ordering::SeqCst),
            fail_answer: self.fail_answer.load(Ordering::SeqCst),
            fail_candidate: self.fail_candidate.load(Ordering::SeqCst),
            candidate_during_offer: self.candidate_during_offer.load(Ordering::SeqCst),
            sink: events,
            answers: Mutex::new(Vec::new()),
            candidates: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        });
        peers.push(peer.clone());
        Ok(peer)
    }
}

#[derive(Debug, Default)]
pub struct SurfaceLog {
    pub controls: Vec<Controls>,
    pub send_enabled: Vec<bool>,
    pub received: Vec<String>,
    pub cleared: usize,
    pub errors: Vec<String>,
}

impl SurfaceLog {
    pub fn last_controls(&self) -> Option<Controls> {
        self.controls.last().copied()
    }

    pub fn send_enabled(&self) -> bool {
        self.send_enabled.last().copied().unwrap_or(false)
    }
}

pub struct RecordingSurface(pub Arc<Mutex<SurfaceLog>>);

impl ControlSurface for RecordingSurface {
    fn set_controls(&mut self, controls: Controls) {
        self.0.lock().unwrap().controls.push(controls);
    }

    fn set_send_enabled(&mut self, enabled: bool) {
        self.0.lock().unwrap().send_enabled.push(enabled);
    }

    fn show_received(&mut self, data: &str) {
        self.0.lock().unwrap().received.push(data.to_string());
    }

    fn clear_input(&mut self) {
        self.0.lock().unwrap().cleared += 1;
    }

    fn report_error(&mut self, error: &SessionError) {
        self.0.lock().unwrap().errors.push(error.to_string());
    }
}

/// Drives a [`Session`] one event at a time against fakes.
pub struct Harness {
    pub session: Session,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
    pub sink: Arc<MemorySignaling>,
    pub outbound: mpsc::UnboundedReceiver<String>,
    pub factory: Arc<FakeFactory>,
    pub surface: Arc<Mutex<SurfaceLog>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_factory(Arc::new(FakeFactory::default()))
    }

    pub fn with_factory(factory: Arc<FakeFactory>) -> Self {
        let (sink, outbound) = MemorySignaling::new();
        let surface = Arc::new(Mutex::new(SurfaceLog::default()));
        let (session, events) = Session::new(
            SessionConfig::default(),
            SignalingClient::new(sink.clone()),
            factory.clone(),
            Box::new(RecordingSurface(surface.clone())),
        );
        Self {
            session,
            events,
            sink,
            outbound,
            factory,
            surface,
        }
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn surface(&self) -> std::sync::MutexGuard<'_, SurfaceLog> {
        self.surface.lock().unwrap()
    }

    /// Dispatches `event`, then everything it causes, until the queue is quiet.
    pub async fn dispatch(&mut self, event: SessionEvent) {
        self.session.dispatch(event).await;
        self.settle().await;
    }

    pub async fn start(&mut self) {
        self.dispatch(SessionEvent::Ui(UiCommand::Start(Role::SenderReceiver)))
            .await;
    }

    pub async fn start_receive(&mut self) {
        self.dispatch(SessionEvent::Ui(UiCommand::Start(Role::ReceiverOnly)))
            .await;
    }

    pub async fn stop(&mut self) {
        self.dispatch(SessionEvent::Ui(UiCommand::Stop)).await;
    }

    pub async fn send_data(&mut self, payload: &str) {
        self.dispatch(SessionEvent::Ui(UiCommand::Send(payload.to_string())))
            .await;
    }

    pub async fn server(&mut self, frame: Value) {
        self.dispatch(SessionEvent::Signaling(frame.to_string())).await;
    }

    pub async fn server_raw(&mut self, text: &str) {
        self.dispatch(SessionEvent::Signaling(text.to_string())).await;
    }

    pub async fn settle(&mut self) {
        while let Ok(Some(event)) =
            tokio::time::timeout(Duration::from_millis(50), self.events.recv()).await
        {
            self.session.dispatch(event).await;
        }
    }

    /// Outbound frames written since the last call, parsed.
    pub fn sent(&mut self) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(text) = self.outbound.try_recv() {
            frames.push(serde_json::from_str(&text).expect("outbound frame is json"));
        }
        frames
    }

    pub fn sent_ids(&mut self) -> Vec<String> {
        self.sent()
            .iter()
            .map(|frame| frame["id"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

pub fn candidate(text: &str) -> IceCandidate {
    IceCandidate {
        candidate: text.to_string(),
        sdp_mid: Some("0".into()),
        sdp_mline_index: Some(0),
    }
}
