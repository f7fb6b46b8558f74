//! Client-side controller for a media server's data-channel demo: a WebRTC peer
//! negotiated over a JSON/WebSocket signaling channel, with start/stop controls
//! driven by a three-state session machine.

pub mod channel_id;
pub mod cli;
pub mod config;
pub mod peer;
pub mod session;
pub mod signaling;
pub mod state;
pub mod surface;
pub mod telemetry;

pub use channel_id::ChannelIdAllocator;
pub use config::{Config, ConfigError, IceServerConfig};
pub use peer::{Peer, PeerController, PeerError, PeerEvent, PeerFactory, PeerOptions, Role};
pub use session::{Session, SessionConfig, SessionError, SessionEvent, SessionHandle, UiCommand};
pub use signaling::{SignalingClient, SignalingError, SignalingSink};
pub use state::{Controls, SessionInput, SessionState, SessionStateMachine};
pub use surface::{ControlSurface, TerminalSurface};
