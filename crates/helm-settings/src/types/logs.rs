//! Bounded log capacities and console logging.

use helm_core::bounded_log::DEFAULT_LOG_CAP;
use serde::{Deserialize, Serialize};

/// Capacities of the two bounded logs.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogCapSettings {
    /// Maximum retained thoughts.
    pub thought_cap: usize,
    /// Maximum retained events.
    pub event_cap: usize,
}

impl Default for LogCapSettings {
    fn default() -> Self {
        Self {
            thought_cap: DEFAULT_LOG_CAP,
            event_cap: DEFAULT_LOG_CAP,
        }
    }
}

/// Console log level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose.
    Trace,
    /// Debug output.
    Debug,
    /// Default.
    #[default]
    Info,
    /// Warnings and errors only.
    Warn,
    /// Errors only.
    Error,
}

impl LogLevel {
    /// Convert to a tracing filter string.
    pub fn as_filter_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level written to stderr.
    pub level: LogLevel,
}
