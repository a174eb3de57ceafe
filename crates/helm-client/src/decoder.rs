//! Message decoder: inbound frame → typed store mutations.
//!
//! A frame carries one or more JSON envelopes separated by whitespace or
//! newlines. Each envelope is classified by its `type`:
//!
//! | type             | mutation                       |
//! |------------------|--------------------------------|
//! | `state_snapshot` | replace [`EngineState`]        |
//! | `thought`        | append to the thought log      |
//! | `event`          | append to the event log        |
//! | anything else    | ignored (logged at debug)      |
//!
//! Decoding never fails past this module. A structurally broken envelope
//! stops decoding of the rest of its frame, and an envelope whose payload
//! fails its schema is dropped on its own. Both are logged at warn.

use helm_core::protocol::{self, Envelope};
use helm_core::{EngineState, EventRecord, ThoughtRecord};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::DecodeError;
use crate::store::{Mutation, StoreWriter};

/// Longest frame excerpt included in drop logs.
const PREVIEW_CHARS: usize = 120;

/// Decode a single parsed envelope.
///
/// Returns `Ok(None)` for envelope types this build does not handle.
pub fn decode_envelope(value: Value) -> Result<Option<Mutation>, DecodeError> {
    let envelope: Envelope =
        serde_json::from_value(value).map_err(|e| DecodeError::UnknownShape(e.to_string()))?;

    let mutation = match envelope.kind.as_str() {
        protocol::STATE_SNAPSHOT => {
            let state = payload::<EngineState>(protocol::STATE_SNAPSHOT, envelope.payload)?;
            Mutation::ReplaceEngine(state)
        }
        protocol::THOUGHT => {
            let thought = payload::<ThoughtRecord>(protocol::THOUGHT, envelope.payload)?;
            Mutation::AppendThought(thought)
        }
        protocol::EVENT => {
            let event = payload::<EventRecord>(protocol::EVENT, envelope.payload)?;
            Mutation::AppendEvent(event)
        }
        other => {
            debug!(kind = other, "ignoring unknown envelope type");
            return Ok(None);
        }
    };
    Ok(Some(mutation))
}

fn payload<T: DeserializeOwned>(kind: &'static str, payload: Value) -> Result<T, DecodeError> {
    serde_json::from_value(payload).map_err(|source| DecodeError::InvalidPayload { kind, source })
}

/// Decode every envelope in `frame`, in order, dropping the invalid ones.
pub fn decode_frame(frame: &str) -> Vec<Mutation> {
    let mut mutations = Vec::new();
    for item in serde_json::Deserializer::from_str(frame).into_iter::<Value>() {
        let value = match item {
            Ok(value) => value,
            Err(e) => {
                log_drop(frame, &DecodeError::Json(e));
                break;
            }
        };
        match decode_envelope(value) {
            Ok(Some(mutation)) => mutations.push(mutation),
            Ok(None) => {}
            Err(e) => log_drop(frame, &e),
        }
    }
    mutations
}

/// Decode `frame` and apply each resulting mutation to the store in order.
///
/// Returns the number of mutations applied.
pub fn apply_frame(frame: &str, store: &StoreWriter) -> usize {
    let mutations = decode_frame(frame);
    let count = mutations.len();
    for mutation in mutations {
        let _ = store.apply(mutation);
    }
    count
}

fn log_drop(frame: &str, error: &DecodeError) {
    let preview: String = frame.chars().take(PREVIEW_CHARS).collect();
    warn!(error = %error, frame = %preview, "dropping inbound frame");
}
