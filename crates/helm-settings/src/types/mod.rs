//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a partial
//! settings file only needs the keys it changes.

mod connection;
mod logs;

pub use connection::*;
pub use logs::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings for the helm console.
///
/// ```json
/// {
///   "server": { "wsUrl": "ws://10.0.0.5:8000/ws" },
///   "reconnect": { "maxDelayMs": 16000 },
///   "logs": { "thoughtCap": 500 }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HelmSettings {
    /// Agent endpoints.
    pub server: ServerSettings,
    /// Reconnect backoff.
    pub reconnect: ReconnectSettings,
    /// Bounded log capacities.
    pub logs: LogCapSettings,
    /// Console logging.
    pub logging: LoggingSettings,
}

impl HelmSettings {
    /// Reject values the client cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.server.ws_url.is_empty() {
            return Err(SettingsError::InvalidValue("wsUrl must not be empty".into()));
        }
        if self.server.connect_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "connectTimeoutMs must be at least 1".into(),
            ));
        }
        if self.reconnect.base_delay_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "baseDelayMs must be at least 1".into(),
            ));
        }
        if self.reconnect.base_delay_ms > self.reconnect.max_delay_ms {
            return Err(SettingsError::InvalidValue(format!(
                "baseDelayMs ({}) exceeds maxDelayMs ({})",
                self.reconnect.base_delay_ms, self.reconnect.max_delay_ms
            )));
        }
        if !(0.0..=1.0).contains(&self.reconnect.jitter_factor) {
            return Err(SettingsError::InvalidValue(format!(
                "jitterFactor must be within 0.0..=1.0 (got {})",
                self.reconnect.jitter_factor
            )));
        }
        if self.logs.thought_cap == 0 || self.logs.event_cap == 0 {
            return Err(SettingsError::InvalidValue(
                "log caps must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
