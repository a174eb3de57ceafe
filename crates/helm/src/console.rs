//! Operator input parsing and line rendering.

use anyhow::{Result, anyhow, bail};
use helm_core::{ConnectionState, EngineState, EventRecord, Speed, ThoughtRecord};

/// One line of operator input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperatorCommand {
    /// Request a new session from the agent.
    Start,
    /// Pause the running session.
    Pause,
    /// Resume a paused session.
    Resume,
    /// Change emulator speed.
    Speed(Speed),
    /// Print connection and engine state.
    Status,
    /// Leave the console.
    Quit,
}

/// One-line usage shown at startup and after bad input.
pub const HELP: &str = "commands: start | pause | resume | speed <0|1|2|4> | status | quit";

/// Parse a line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<OperatorCommand>> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let command = match head.to_ascii_lowercase().as_str() {
        "start" => OperatorCommand::Start,
        "pause" => OperatorCommand::Pause,
        "resume" => OperatorCommand::Resume,
        "status" => OperatorCommand::Status,
        "quit" | "exit" => OperatorCommand::Quit,
        "speed" => {
            let raw = words.next().ok_or_else(|| anyhow!("speed needs a value"))?;
            let value: u8 = raw
                .parse()
                .map_err(|_| anyhow!("speed value must be a number (got {raw})"))?;
            OperatorCommand::Speed(Speed::try_from(value)?)
        }
        other => bail!("unknown command: {other}"),
    };
    if words.next().is_some() {
        bail!("too many arguments for {head}");
    }
    Ok(Some(command))
}

/// `timestamp [AGENT] action: reasoning`.
pub fn render_thought(thought: &ThoughtRecord) -> String {
    format!(
        "{} [{}] {}: {}",
        thought.timestamp, thought.agent_type, thought.action, thought.reasoning
    )
}

/// `timestamp <event_type> description`.
pub fn render_event(event: &EventRecord) -> String {
    format!("{} <{}> {}", event.timestamp, event.event_type, event.description)
}

/// Engine phase, active agent and speed on one line.
pub fn render_engine(engine: &EngineState) -> String {
    let agent = engine
        .current_agent
        .map_or_else(|| "-".to_owned(), |a| a.to_string());
    format!(
        "engine: {:?} agent={agent} speed={}",
        engine.phase(),
        engine.speed
    )
}

/// Connection status, with attempt and last error while down.
pub fn render_connection(state: &ConnectionState) -> String {
    if state.connected {
        return "connection: up".to_owned();
    }
    match &state.last_error {
        Some(error) => format!("connection: down (attempt {}, {error})", state.attempt),
        None => format!("connection: down (attempt {})", state.attempt),
    }
}
