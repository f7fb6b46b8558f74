use clap::{ArgAction, Args, Parser, builder::BoolishValueParser};
use std::path::PathBuf;

use crate::config::{Config, ConfigError, DEFAULT_SIGNALING_HOST, RawConfig};
use crate::peer::Role;
use crate::telemetry::logging::{LogConfig, LogLevel};

#[derive(Parser, Debug)]
#[command(
    name = "beach-datachannel",
    about = "Data-channel client for a media-server show-datachannel endpoint",
    version
)]
pub struct Cli {
    #[arg(
        long,
        env = "BEACH_DATACHANNEL_SIGNALING_URL",
        default_value = DEFAULT_SIGNALING_HOST,
        value_name = "URL",
        help = "Signaling endpoint; a bare host:port expands to ws(s)://host:port/showdatachannel"
    )]
    pub signaling_url: String,

    #[arg(
        long,
        value_enum,
        env = "BEACH_DATACHANNEL_ROLE",
        default_value_t = Role::SenderReceiver,
        help = "Role used by the `start` command"
    )]
    pub role: Role,

    #[arg(
        long = "channel-prefix",
        env = "BEACH_DATACHANNEL_CHANNEL_PREFIX",
        value_name = "PREFIX",
        help = "Prefix for data channel labels (default TestChannel)"
    )]
    pub channel_prefix: Option<String>,

    #[arg(
        long = "audio",
        env = "BEACH_DATACHANNEL_AUDIO",
        value_parser = BoolishValueParser::new(),
        action = ArgAction::Set,
        default_value_t = true,
        value_name = "BOOL",
        help = "Negotiate an audio transceiver alongside the data channel"
    )]
    pub audio: bool,

    #[arg(long = "no-audio", help = "Shorthand for --audio=false")]
    pub no_audio: bool,

    #[command(flatten)]
    pub ice: IceArgs,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct IceArgs {
    #[arg(
        long = "ice-url",
        env = "BEACH_DATACHANNEL_ICE_URLS",
        value_delimiter = ',',
        value_name = "URL",
        help = "STUN/TURN server url (repeatable)"
    )]
    pub urls: Vec<String>,

    #[arg(
        long = "ice-username",
        env = "BEACH_DATACHANNEL_ICE_USERNAME",
        value_name = "USER",
        hide_env_values = true
    )]
    pub username: Option<String>,

    #[arg(
        long = "ice-credential",
        env = "BEACH_DATACHANNEL_ICE_CREDENTIAL",
        value_name = "SECRET",
        hide_env_values = true
    )]
    pub credential: Option<String>,

    #[arg(
        long = "disable-stun",
        env = "BEACH_DATACHANNEL_DISABLE_STUN",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new(),
        value_name = "BOOL",
        help = "Use no ICE servers when none are configured"
    )]
    pub disable_stun: Option<bool>,
}

#[derive(Args, Debug, Clone)]
pub struct LoggingArgs {
    #[arg(
        long = "log-level",
        value_enum,
        env = "BEACH_DATACHANNEL_LOG_LEVEL",
        default_value_t = LogLevel::Warn,
        help = "Minimum log level (error, warn, info, debug, trace)"
    )]
    pub level: LogLevel,

    #[arg(
        long = "log-file",
        value_name = "PATH",
        env = "BEACH_DATACHANNEL_LOG_FILE",
        help = "Write structured logs to the specified file"
    )]
    pub file: Option<PathBuf>,
}

impl LoggingArgs {
    pub fn to_config(&self) -> LogConfig {
        LogConfig {
            level: self.level,
            file: self.file.clone(),
        }
    }
}

impl Cli {
    pub fn to_raw_config(&self) -> RawConfig {
        RawConfig {
            signaling_url: self.signaling_url.clone(),
            role: self.role,
            ice_urls: self.ice.urls.clone(),
            ice_username: self.ice.username.clone(),
            ice_credential: self.ice.credential.clone(),
            disable_stun: self.ice.disable_stun.unwrap_or(false),
            audio: self.audio && !self.no_audio,
            channel_prefix: self.channel_prefix.clone(),
        }
    }

    pub fn to_config(&self) -> Result<Config, ConfigError> {
        self.to_raw_config().resolve()
    }
}
