use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{SignalingError, SignalingSink};

/// In-process sink that hands every written frame to a channel. Used by tests
/// and by anything that wants to observe outbound signaling without a socket.
#[derive(Debug)]
pub struct MemorySignaling {
    tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

impl MemorySignaling {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                tx: Mutex::new(Some(tx)),
            }),
            rx,
        )
    }

    pub fn is_closed(&self) -> bool {
        self.tx.lock().is_none()
    }
}

impl SignalingSink for MemorySignaling {
    fn send_text(&self, text: String) -> Result<(), SignalingError> {
        let guard = self.tx.lock();
        let tx = guard.as_ref().ok_or(SignalingError::Closed)?;
        tx.send(text).map_err(|_| SignalingError::Closed)
    }

    fn close(&self) {
        self.tx.lock().take();
    }
}
