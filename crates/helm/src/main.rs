//! # helm
//!
//! Operator console for a game-playing agent. Connects to the agent's
//! websocket, prints thoughts, events and state changes as they arrive,
//! and reads operator commands from stdin.

#![deny(unsafe_code)]

mod console;

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use helm_client::{ClientConfig, CommandDispatcher, Session, Subscription};
use helm_settings::HelmSettings;
use tokio::io::{AsyncBufReadExt, BufReader};

use console::{OperatorCommand, parse_line};

/// helm operator console.
#[derive(Parser, Debug)]
#[command(name = "helm", about = "Operator console for a game-playing agent")]
struct Cli {
    /// Agent websocket endpoint (overrides settings).
    #[arg(long)]
    ws_url: Option<String>,

    /// Session start endpoint (overrides settings).
    #[arg(long)]
    start_url: Option<String>,

    /// Settings file (defaults to `~/.helm/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Request a new session once connected.
    #[arg(long)]
    start: bool,

    /// Log level: trace, debug, info, warn or error (overrides settings).
    #[arg(long)]
    log_level: Option<String>,
}

fn load_settings(args: &Cli) -> Result<HelmSettings> {
    let path = args
        .settings
        .clone()
        .unwrap_or_else(helm_settings::settings_path);
    let mut settings = helm_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;

    if let Some(url) = &args.ws_url {
        settings.server.ws_url.clone_from(url);
    }
    if let Some(url) = &args.start_url {
        settings.server.start_url.clone_from(url);
    }
    if let Some(level) = &args.log_level {
        settings.logging.level = helm_settings::loader::parse_log_level(level)
            .ok_or_else(|| anyhow!("invalid log level: {level}"))?;
    }
    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = load_settings(&args)?;
    helm_core::logging::init_subscriber(settings.logging.level.as_filter_str());

    let config = ClientConfig::from_settings(&settings);
    let session = Session::connect(&config).context("Failed to build session")?;
    tracing::info!(ws_url = %config.ws_url, "helm starting");

    let printer = tokio::spawn(print_updates(session.subscribe()));
    session.start().await;

    if args.start {
        let reader = session.subscribe();
        let dispatcher = session.dispatcher();
        drop(tokio::spawn(async move {
            let mut connection = reader.watch_connection();
            if connection.wait_for(|c| c.connected).await.is_ok() {
                dispatcher.start_session().await;
            }
        }));
    }

    println!("{}", console::HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                if !handle_line(&line, &session.dispatcher(), &session.subscribe()).await {
                    break;
                }
            }
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for ctrl-c")?;
                break;
            }
        }
    }

    tracing::info!("Shutting down...");
    session.shutdown().await;
    printer.abort();
    Ok(())
}

/// Run one operator line. Returns `false` when the console should exit.
async fn handle_line(line: &str, dispatcher: &CommandDispatcher, reader: &Subscription) -> bool {
    let command = match parse_line(line) {
        Ok(Some(command)) => command,
        Ok(None) => return true,
        Err(e) => {
            println!("{e}");
            println!("{}", console::HELP);
            return true;
        }
    };

    let sent = match command {
        OperatorCommand::Quit => return false,
        OperatorCommand::Status => {
            println!("{}", console::render_connection(&reader.connection()));
            println!("{}", console::render_engine(&reader.engine()));
            return true;
        }
        OperatorCommand::Start => {
            dispatcher.start_session().await;
            return true;
        }
        OperatorCommand::Pause => dispatcher.pause().await,
        OperatorCommand::Resume => dispatcher.resume().await,
        OperatorCommand::Speed(speed) => dispatcher.set_speed(speed).await,
    };
    if !sent {
        println!("not connected, command not sent");
    }
    true
}

/// Print every store change until the store goes away.
async fn print_updates(reader: Subscription) {
    let mut connection = reader.watch_connection();
    let mut engine = reader.watch_engine();
    let mut thoughts = reader.watch_thoughts();
    let mut events = reader.watch_events();
    let mut thoughts_seen = 0;
    let mut events_seen = 0;

    loop {
        tokio::select! {
            changed = connection.changed() => {
                if changed.is_err() { break; }
                println!("{}", console::render_connection(&connection.borrow_and_update()));
            }
            changed = engine.changed() => {
                if changed.is_err() { break; }
                println!("{}", console::render_engine(&engine.borrow_and_update()));
            }
            changed = thoughts.changed() => {
                if changed.is_err() { break; }
                let log = thoughts.borrow_and_update();
                for thought in log.since(thoughts_seen) {
                    println!("{}", console::render_thought(thought));
                }
                thoughts_seen = log.total_appended();
            }
            changed = events.changed() => {
                if changed.is_err() { break; }
                let log = events.borrow_and_update();
                for event in log.since(events_seen) {
                    println!("{}", console::render_event(event));
                }
                events_seen = log.total_appended();
            }
        }
    }
}
