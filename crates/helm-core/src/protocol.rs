//! Wire vocabulary for the agent channel.
//!
//! Inbound frames carry an [`Envelope`] whose `payload` is one of
//! [`EngineState`] (`state_snapshot`), [`ThoughtRecord`] (`thought`) or
//! [`EventRecord`] (`event`). Outbound frames are serialized [`Command`]s.
//! Field names match the agent's snake_case JSON.

use std::fmt;

use chrono::{DateTime, NaiveDateTime};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Envelope type for engine snapshots.
pub const STATE_SNAPSHOT: &str = "state_snapshot";
/// Envelope type for agent thoughts.
pub const THOUGHT: &str = "thought";
/// Envelope type for world events.
pub const EVENT: &str = "event";

// ─────────────────────────────────────────────────────────────────────────────
// Agent type
// ─────────────────────────────────────────────────────────────────────────────

/// The sub-agent currently in control of the game.
///
/// Unrecognized wire values decode to [`AgentType::Unknown`] instead of
/// failing, so a newer agent process does not break older consoles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentType {
    /// Top-level planner.
    Orchestrator,
    /// Overworld movement.
    Navigation,
    /// Battle decisions.
    Battle,
    /// Menu handling.
    Menu,
    /// Any agent type this build does not know about.
    #[serde(other)]
    Unknown,
}

impl AgentType {
    /// Wire name of the agent type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Orchestrator => "ORCHESTRATOR",
            Self::Navigation => "NAVIGATION",
            Self::Battle => "BATTLE",
            Self::Menu => "MENU",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Speed
// ─────────────────────────────────────────────────────────────────────────────

/// Rejected speed value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("speed must be one of 0, 1, 2, 4 (got {0})")]
pub struct InvalidSpeed(pub u8);

/// Emulator speed multiplier. Travels as the bare integer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Speed {
    /// No frame cap (`0`).
    Uncapped,
    /// Real time (`1`).
    #[default]
    Normal,
    /// Twice real time (`2`).
    Double,
    /// Four times real time (`4`).
    Quadruple,
}

impl Speed {
    /// Every accepted speed, in wire order.
    pub const ALL: [Speed; 4] = [Self::Uncapped, Self::Normal, Self::Double, Self::Quadruple];

    /// Integer value sent on the wire.
    pub fn value(self) -> u8 {
        match self {
            Self::Uncapped => 0,
            Self::Normal => 1,
            Self::Double => 2,
            Self::Quadruple => 4,
        }
    }
}

impl TryFrom<u8> for Speed {
    type Error = InvalidSpeed;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Uncapped),
            1 => Ok(Self::Normal),
            2 => Ok(Self::Double),
            4 => Ok(Self::Quadruple),
            other => Err(InvalidSpeed(other)),
        }
    }
}

impl From<Speed> for u8 {
    fn from(speed: Speed) -> Self {
        speed.value()
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uncapped => f.write_str("uncapped"),
            other => write!(f, "{}x", other.value()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine state
// ─────────────────────────────────────────────────────────────────────────────

/// Engine lifecycle as observed through snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnginePhase {
    /// No session has been started yet.
    NotStarted,
    /// The agent is playing.
    Running,
    /// The agent is paused.
    Paused,
}

/// Engine status, replaced wholesale by every `state_snapshot`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineState {
    /// Whether a session is running.
    pub running: bool,
    /// Whether the running session is paused.
    pub paused: bool,
    /// Agent currently in control, if any.
    #[serde(default)]
    pub current_agent: Option<AgentType>,
    /// Emulator speed.
    pub speed: Speed,
}

impl EngineState {
    /// Derive the observed lifecycle phase.
    pub fn phase(&self) -> EnginePhase {
        match (self.running, self.paused) {
            (false, _) => EnginePhase::NotStarted,
            (true, true) => EnginePhase::Paused,
            (true, false) => EnginePhase::Running,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Log records
// ─────────────────────────────────────────────────────────────────────────────

/// One reasoning step emitted by an agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThoughtRecord {
    /// Agent that produced the thought.
    pub agent_type: AgentType,
    /// Action chosen.
    pub action: String,
    /// Free-form reasoning text.
    pub reasoning: String,
    /// ISO-8601 timestamp as sent by the agent.
    #[serde(deserialize_with = "iso8601")]
    pub timestamp: String,
}

/// A discrete world event. `event_type` is an open set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Event kind, e.g. `battle_start`.
    pub event_type: String,
    /// Human-readable description.
    pub description: String,
    /// ISO-8601 timestamp as sent by the agent.
    #[serde(deserialize_with = "iso8601")]
    pub timestamp: String,
}

/// Whether `value` is an ISO-8601 timestamp, with or without an offset.
pub fn is_iso8601(value: &str) -> bool {
    DateTime::parse_from_rfc3339(value).is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
}

fn iso8601<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if is_iso8601(&raw) {
        Ok(raw)
    } else {
        Err(de::Error::custom(format!("timestamp is not ISO-8601: {raw}")))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Envelopes
// ─────────────────────────────────────────────────────────────────────────────

/// Discriminated inbound envelope. The payload is validated per `kind`.
#[derive(Clone, Debug, Deserialize)]
pub struct Envelope {
    /// Envelope discriminator.
    #[serde(rename = "type")]
    pub kind: String,
    /// Raw payload, `null` when absent.
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Operator command sent to the agent process.
///
/// Commands are level-setting: repeating one has no additional effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Pause the running session.
    Pause,
    /// Resume a paused session.
    Resume,
    /// Change emulator speed.
    SetSpeed {
        /// Target speed.
        value: Speed,
    },
}

impl Command {
    /// Short name used in logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::SetSpeed { .. } => "set_speed",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Connection state
// ─────────────────────────────────────────────────────────────────────────────

/// Liveness of the agent channel as seen by readers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionState {
    /// Whether the channel is open.
    pub connected: bool,
    /// Consecutive failed attempts since the last successful open.
    pub attempt: u32,
    /// Most recent transport error, cleared on a successful open.
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn agent_type_wire_names() {
        let parsed: AgentType = serde_json::from_value(json!("NAVIGATION")).unwrap();
        assert_eq!(parsed, AgentType::Navigation);
        assert_eq!(serde_json::to_value(AgentType::Battle).unwrap(), json!("BATTLE"));
    }

    #[test]
    fn unknown_agent_type_degrades() {
        let parsed: AgentType = serde_json::from_value(json!("FISHING")).unwrap();
        assert_eq!(parsed, AgentType::Unknown);
        assert_eq!(parsed.to_string(), "UNKNOWN");
    }

    #[test]
    fn speed_accepts_only_known_values() {
        for speed in Speed::ALL {
            let back: Speed = serde_json::from_value(json!(speed.value())).unwrap();
            assert_eq!(back, speed);
        }
        assert!(serde_json::from_value::<Speed>(json!(3)).is_err());
        assert!(serde_json::from_value::<Speed>(json!(-1)).is_err());
        assert_matches!(Speed::try_from(8), Err(InvalidSpeed(8)));
    }

    #[test]
    fn speed_display() {
        assert_eq!(Speed::Uncapped.to_string(), "uncapped");
        assert_eq!(Speed::Quadruple.to_string(), "4x");
    }

    #[test]
    fn engine_state_from_snapshot_payload() {
        let state: EngineState = serde_json::from_value(json!({
            "running": true,
            "paused": false,
            "current_agent": "NAVIGATION",
            "speed": 1
        }))
        .unwrap();
        assert_eq!(
            state,
            EngineState {
                running: true,
                paused: false,
                current_agent: Some(AgentType::Navigation),
                speed: Speed::Normal,
            }
        );
    }

    #[test]
    fn engine_state_null_agent() {
        let state: EngineState = serde_json::from_value(json!({
            "running": false,
            "paused": false,
            "current_agent": null,
            "speed": 0
        }))
        .unwrap();
        assert!(state.current_agent.is_none());
        assert_eq!(state.speed, Speed::Uncapped);
    }

    #[test]
    fn engine_state_requires_flags() {
        let result = serde_json::from_value::<EngineState>(json!({"speed": 1}));
        assert!(result.is_err());
    }

    #[test]
    fn engine_phase_derivation() {
        let mut state = EngineState::default();
        assert_eq!(state.phase(), EnginePhase::NotStarted);
        state.running = true;
        assert_eq!(state.phase(), EnginePhase::Running);
        state.paused = true;
        assert_eq!(state.phase(), EnginePhase::Paused);
    }

    #[test]
    fn thought_rejects_bad_timestamp() {
        let result = serde_json::from_value::<ThoughtRecord>(json!({
            "agent_type": "BATTLE",
            "action": "use_move",
            "reasoning": "super effective",
            "timestamp": "yesterday"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn iso8601_variants() {
        assert!(is_iso8601("2024-05-01T12:30:00Z"));
        assert!(is_iso8601("2024-05-01T12:30:00.123+02:00"));
        assert!(is_iso8601("2024-05-01T12:30:00.123456"));
        assert!(is_iso8601("2024-05-01T12:30:00"));
        assert!(!is_iso8601("2024-05-01"));
        assert!(!is_iso8601(""));
    }

    #[test]
    fn event_record_open_type() {
        let event: EventRecord = serde_json::from_value(json!({
            "event_type": "something_new",
            "description": "a new kind of event",
            "timestamp": "2024-05-01T12:30:00Z"
        }))
        .unwrap();
        assert_eq!(event.event_type, "something_new");
    }

    #[test]
    fn envelope_payload_defaults_to_null() {
        let envelope: Envelope = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(envelope.kind, "ping");
        assert!(envelope.payload.is_null());
    }

    #[test]
    fn command_wire_shape() {
        assert_eq!(
            serde_json::to_value(Command::Pause).unwrap(),
            json!({"type": "pause"})
        );
        assert_eq!(
            serde_json::to_value(Command::Resume).unwrap(),
            json!({"type": "resume"})
        );
        assert_eq!(
            serde_json::to_value(Command::SetSpeed { value: Speed::Quadruple }).unwrap(),
            json!({"type": "set_speed", "value": 4})
        );
    }

    #[test]
    fn connection_state_default_is_disconnected() {
        let state = ConnectionState::default();
        assert!(!state.connected);
        assert_eq!(state.attempt, 0);
        assert!(state.last_error.is_none());
    }
}
