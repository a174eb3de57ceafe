//! Runtime configuration for a client session.

use std::time::Duration;

use helm_core::bounded_log::DEFAULT_LOG_CAP;
use helm_core::{AttemptPolicy, BackoffPolicy};
use helm_settings::HelmSettings;

use crate::connection::ManagerConfig;

/// Everything a [`Session`](crate::Session) needs, in runtime types.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Persistent channel endpoint.
    pub ws_url: String,
    /// One-shot session start endpoint.
    pub start_url: String,
    /// Upper bound on the websocket handshake.
    pub connect_timeout: Duration,
    /// Timeout for the start request.
    pub request_timeout: Duration,
    /// Outbound frame queue capacity per link.
    pub outbound_queue: usize,
    /// Reconnect delays.
    pub backoff: BackoffPolicy,
    /// Attempt counter behavior across stop/start.
    pub attempt_policy: AttemptPolicy,
    /// Thought log capacity.
    pub thought_cap: usize,
    /// Event log capacity.
    pub event_cap: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_settings(&HelmSettings::default())
    }
}

impl ClientConfig {
    /// Convert loaded settings.
    pub fn from_settings(settings: &HelmSettings) -> Self {
        let reconnect = &settings.reconnect;
        Self {
            ws_url: settings.server.ws_url.clone(),
            start_url: settings.server.start_url.clone(),
            connect_timeout: Duration::from_millis(settings.server.connect_timeout_ms),
            request_timeout: Duration::from_millis(settings.server.request_timeout_ms),
            outbound_queue: settings.server.outbound_queue.max(1),
            backoff: BackoffPolicy {
                base_delay: Duration::from_millis(reconnect.base_delay_ms),
                max_delay: Duration::from_millis(reconnect.max_delay_ms),
                jitter_factor: reconnect.jitter_factor,
            },
            attempt_policy: reconnect.attempt_policy,
            thought_cap: non_zero_cap(settings.logs.thought_cap),
            event_cap: non_zero_cap(settings.logs.event_cap),
        }
    }

    /// Connection manager slice of the config.
    pub fn manager(&self) -> ManagerConfig {
        ManagerConfig {
            url: self.ws_url.clone(),
            backoff: self.backoff,
            attempt_policy: self.attempt_policy,
        }
    }
}

fn non_zero_cap(cap: usize) -> usize {
    if cap == 0 { DEFAULT_LOG_CAP } else { cap }
}
