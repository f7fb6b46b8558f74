use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use beach_datachannel::cli::Cli;
use beach_datachannel::peer::rtc::RtcPeerFactory;
use beach_datachannel::signaling::{SignalingClient, websocket};
use beach_datachannel::telemetry::logging;
use beach_datachannel::{Role, Session, SessionHandle, TerminalSurface};

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Start,
    Receive,
    Stop,
    Send(String),
    Help,
    Quit,
    Unknown(String),
}

fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim_start();
    let (word, rest) = line
        .split_once(char::is_whitespace)
        .unwrap_or((line.trim_end(), ""));
    let command = match word {
        "" => return None,
        "start" => Command::Start,
        "receive" => Command::Receive,
        "stop" => Command::Stop,
        "send" => Command::Send(rest.to_string()),
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    };
    Some(command)
}

fn print_help() {
    eprintln!("commands: start | receive | stop | send <text> | help | quit");
}

async fn read_commands(handle: SessionHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, "failed to read stdin");
                break;
            }
        };
        let Some(command) = parse_command(&line) else {
            continue;
        };
        let delivered = match command {
            Command::Start => handle.start(),
            Command::Receive => handle.start_as(Role::ReceiverOnly),
            Command::Stop => handle.stop(),
            Command::Send(text) => handle.send_data(text),
            Command::Help => {
                print_help();
                true
            }
            Command::Quit => break,
            Command::Unknown(word) => {
                eprintln!("unknown command: {word}");
                print_help();
                true
            }
        };
        if !delivered {
            break;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.logging.to_config()).context("failed to initialise logging")?;
    let config = cli.to_config().context("invalid configuration")?;

    info!(url = %config.signaling_url, role = ?config.role, "connecting to signaling server");
    let (sink, inbound) = websocket::connect(&config.signaling_url)
        .await
        .with_context(|| format!("failed to connect to {}", config.signaling_url))?;

    let (session, events) = Session::new(
        config.session_config(),
        SignalingClient::new(sink),
        Arc::new(RtcPeerFactory::new()),
        Box::new(TerminalSurface::stdout()),
    );
    let handle = session.handle();
    handle.pump_signaling(inbound);
    let session_task = tokio::spawn(session.run(events));

    print_help();
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                warn!(error = %err, "failed to listen for ctrl-c");
            }
            info!("interrupted");
        }
        _ = read_commands(handle.clone()) => {}
    }

    handle.shutdown();
    session_task.await.context("session task failed")?;
    Ok(())
}
