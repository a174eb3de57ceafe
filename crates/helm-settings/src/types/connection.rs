//! Agent endpoint and reconnect settings.

use helm_core::AttemptPolicy;
use serde::{Deserialize, Serialize};

/// Where the agent process listens.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Persistent duplex channel.
    pub ws_url: String,
    /// One-shot session start endpoint.
    pub start_url: String,
    /// Timeout for the session start request in milliseconds.
    pub request_timeout_ms: u64,
    /// Upper bound on the websocket handshake in milliseconds. A handshake
    /// that takes longer counts as a failed attempt.
    pub connect_timeout_ms: u64,
    /// Capacity of the outbound frame queue feeding the socket writer.
    pub outbound_queue: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            ws_url: "ws://127.0.0.1:8000/ws".to_string(),
            start_url: "http://127.0.0.1:8000/api/start".to_string(),
            request_timeout_ms: 10_000,
            connect_timeout_ms: 10_000,
            outbound_queue: 32,
        }
    }
}

/// Reconnect backoff settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconnectSettings {
    /// Delay before the first retry in milliseconds.
    pub base_delay_ms: u64,
    /// Cap on the un-jittered delay in milliseconds.
    pub max_delay_ms: u64,
    /// Fraction of the delay added as random jitter.
    pub jitter_factor: f64,
    /// Whether `start()` resets the attempt counter.
    pub attempt_policy: AttemptPolicy,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            jitter_factor: 0.2,
            attempt_policy: AttemptPolicy::ResetOnStart,
        }
    }
}
