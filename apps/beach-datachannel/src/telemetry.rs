pub mod logging {
    use clap::ValueEnum;
    use std::fs::OpenOptions;
    use std::path::PathBuf;
    use std::sync::OnceLock;
    use tracing::subscriber::SetGlobalDefaultError;
    use tracing_appender::non_blocking::WorkerGuard;
    use tracing_subscriber::EnvFilter;

    use crate::config::env_truthy;

    pub const LOG_FILTER_ENV: &str = "BEACH_DATACHANNEL_LOG_FILTER";
    pub const TRACE_DEPS_ENV: &str = "BEACH_DATACHANNEL_TRACE_DEPS";

    /// Crates whose trace output drowns the session's own at trace level.
    const NOISY_DEPENDENCIES: &[&str] = &[
        "webrtc",
        "webrtc_ice",
        "webrtc_sctp",
        "webrtc_dtls",
        "webrtc_srtp",
        "webrtc_mdns",
        "tokio_tungstenite",
        "tungstenite",
        "rustls",
    ];

    #[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq, PartialOrd, Ord)]
    pub enum LogLevel {
        Error,
        #[default]
        Warn,
        Info,
        Debug,
        Trace,
    }

    #[derive(Clone, Debug, Default)]
    pub struct LogConfig {
        pub level: LogLevel,
        pub file: Option<PathBuf>,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum InitError {
        #[error("failed to open log file {path:?}: {source}")]
        Io {
            path: PathBuf,
            source: std::io::Error,
        },
        #[error("another tracing subscriber is already installed")]
        Subscriber(#[from] SetGlobalDefaultError),
    }

    static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

    /// Installs the global subscriber, writing to stderr or appending to
    /// `config.file`. Calling it again after a successful install does nothing.
    pub fn init(config: &LogConfig) -> Result<(), InitError> {
        if GUARD.get().is_some() {
            return Ok(());
        }

        let (directives, throttled) = match std::env::var(LOG_FILTER_ENV) {
            Ok(custom) => (custom, false),
            Err(_) => directives_for(config.level, env_truthy(TRACE_DEPS_ENV).unwrap_or(false)),
        };

        let (writer, guard) = match &config.file {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| InitError::Io {
                        path: path.clone(),
                        source,
                    })?;
                tracing_appender::non_blocking(file)
            }
            None => tracing_appender::non_blocking(std::io::stderr()),
        };

        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(directives))
            .with_target(config.level >= LogLevel::Debug)
            .with_thread_ids(config.level == LogLevel::Trace)
            .with_ansi(config.file.is_none())
            .with_writer(writer)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;

        let _ = GUARD.set(guard);
        if throttled {
            eprintln!(
                "[beach-datachannel] webrtc/websocket traces capped at info; set {TRACE_DEPS_ENV}=1 or {LOG_FILTER_ENV} to override"
            );
        }
        Ok(())
    }

    /// Filter directives for `level`; the flag reports whether noisy
    /// dependencies were capped.
    fn directives_for(level: LogLevel, allow_deps: bool) -> (String, bool) {
        let own = |max: &str| format!("info,beach_datachannel={max},datachannel_proto={max}");
        let directives = match level {
            LogLevel::Error => "error".to_string(),
            LogLevel::Warn => "warn".to_string(),
            LogLevel::Info => "info".to_string(),
            LogLevel::Debug => own("debug"),
            LogLevel::Trace => own("trace"),
        };
        if level != LogLevel::Trace || allow_deps {
            return (directives, false);
        }
        let capped = NOISY_DEPENDENCIES
            .iter()
            .fold(directives, |acc, target| format!("{acc},{target}=info"));
        (capped, true)
    }

}
