use thiserror::Error;
use url::Url;
use webrtc::ice_transport::ice_server::RTCIceServer;

use crate::channel_id::DEFAULT_CHANNEL_PREFIX;
use crate::peer::{PeerOptions, Role};
use crate::session::SessionConfig;

pub const DEFAULT_SIGNALING_HOST: &str = "127.0.0.1:8443";
pub const SIGNALING_PATH: &str = "/showdatachannel";
pub const DEFAULT_STUN_URL: &str = "stun:stun.l.google.com:19302";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("signaling url is empty")]
    EmptySignalingUrl,
    #[error("invalid signaling url {url:?}: {reason}")]
    InvalidSignalingUrl { url: String, reason: String },
    #[error("unsupported signaling scheme {0:?} (expected ws or wss)")]
    UnsupportedScheme(String),
    #[error("invalid ice server url {0:?}")]
    InvalidIceUrl(String),
    #[error("ice credential given without a username")]
    CredentialWithoutUsername,
}

/// One STUN/TURN entry. Credentials apply to every url in the entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            ..Default::default()
        }
    }

    pub fn to_rtc(&self) -> RTCIceServer {
        RTCIceServer {
            urls: self.urls.clone(),
            username: self.username.clone().unwrap_or_default(),
            credential: self.credential.clone().unwrap_or_default(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub signaling_url: Url,
    pub role: Role,
    pub ice_servers: Vec<IceServerConfig>,
    pub audio: bool,
    pub channel_prefix: String,
}

impl Config {
    pub fn peer_options(&self) -> PeerOptions {
        PeerOptions {
            ice_servers: self.ice_servers.clone(),
            audio: self.audio,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            role: self.role,
            channel_prefix: self.channel_prefix.clone(),
            peer: self.peer_options(),
        }
    }
}

/// Raw, unvalidated settings as they come from flags and the environment.
#[derive(Debug, Clone)]
pub struct RawConfig {
    pub signaling_url: String,
    pub role: Role,
    pub ice_urls: Vec<String>,
    pub ice_username: Option<String>,
    pub ice_credential: Option<String>,
    pub disable_stun: bool,
    pub audio: bool,
    pub channel_prefix: Option<String>,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            signaling_url: DEFAULT_SIGNALING_HOST.to_string(),
            role: Role::default(),
            ice_urls: Vec::new(),
            ice_username: None,
            ice_credential: None,
            disable_stun: false,
            audio: true,
            channel_prefix: None,
        }
    }
}

impl RawConfig {
    pub fn resolve(self) -> Result<Config, ConfigError> {
        let signaling_url = resolve_signaling_url(&self.signaling_url)?;
        let ice_servers = resolve_ice_servers(
            &self.ice_urls,
            self.ice_username,
            self.ice_credential,
            self.disable_stun,
        )?;
        let channel_prefix = self
            .channel_prefix
            .map(|prefix| prefix.trim().to_string())
            .filter(|prefix| !prefix.is_empty())
            .unwrap_or_else(|| DEFAULT_CHANNEL_PREFIX.to_string());
        Ok(Config {
            signaling_url,
            role: self.role,
            ice_servers,
            audio: self.audio,
            channel_prefix,
        })
    }
}

/// Turns `host[:port]` into `ws://host/showdatachannel` for loopback hosts and
/// `wss://host/showdatachannel` otherwise. Explicit ws/wss urls pass through.
pub fn resolve_signaling_url(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::EmptySignalingUrl);
    }
    let invalid = |reason: String| ConfigError::InvalidSignalingUrl {
        url: trimmed.to_string(),
        reason,
    };

    if trimmed.contains("://") {
        let url = Url::parse(trimmed).map_err(|err| invalid(err.to_string()))?;
        return match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(ConfigError::UnsupportedScheme(other.to_string())),
        };
    }

    let host = trimmed.trim_end_matches('/');
    let hostname = match host.rfind(']') {
        Some(end) => &host[..=end],
        None => host.rsplit_once(':').map_or(host, |(name, _)| name),
    };
    let scheme = if is_loopback(hostname) { "ws" } else { "wss" };
    Url::parse(&format!("{scheme}://{host}{SIGNALING_PATH}")).map_err(|err| invalid(err.to_string()))
}

fn is_loopback(hostname: &str) -> bool {
    matches!(hostname, "localhost" | "127.0.0.1" | "[::1]")
}

fn resolve_ice_servers(
    urls: &[String],
    username: Option<String>,
    credential: Option<String>,
    disable_stun: bool,
) -> Result<Vec<IceServerConfig>, ConfigError> {
    let urls: Vec<String> = urls
        .iter()
        .flat_map(|entry| entry.split(','))
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect();

    if urls.is_empty() {
        if disable_stun {
            return Ok(Vec::new());
        }
        return Ok(vec![IceServerConfig::stun(DEFAULT_STUN_URL)]);
    }

    for url in &urls {
        let known = ["stun:", "stuns:", "turn:", "turns:"]
            .iter()
            .any(|prefix| url.starts_with(prefix));
        if !known {
            return Err(ConfigError::InvalidIceUrl(url.clone()));
        }
    }
    if credential.is_some() && username.is_none() {
        return Err(ConfigError::CredentialWithoutUsername);
    }

    Ok(vec![IceServerConfig {
        urls,
        username,
        credential,
    }])
}

pub(crate) fn env_truthy(var: &str) -> Option<bool> {
    std::env::var(var).map(|v| v != "0" && !v.is_empty()).ok()
}
