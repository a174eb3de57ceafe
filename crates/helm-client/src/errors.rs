//! Error types for the synchronization core.
//!
//! None of these escape the component that produces them: decode errors
//! are logged and the frame dropped, transport errors feed the reconnect
//! machine, and session-start errors are logged by the dispatcher.

use thiserror::Error;

/// Why an inbound frame (or one envelope within it) was dropped.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The frame is not well-formed JSON.
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    /// Well-formed JSON that is not a `{type, payload}` envelope.
    #[error("frame is not an envelope: {0}")]
    UnknownShape(String),

    /// The payload does not match the schema of its declared type.
    #[error("invalid {kind} payload: {source}")]
    InvalidPayload {
        /// Declared envelope type.
        kind: &'static str,
        /// Underlying schema error.
        #[source]
        source: serde_json::Error,
    },
}

/// Failures of the persistent channel.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Could not open the channel.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The remote side closed the channel.
    #[error("{}", closed_message(.0.as_deref()))]
    Closed(Option<String>),

    /// Reading or writing an open channel failed.
    #[error("transport error: {0}")]
    Io(String),
}

fn closed_message(reason: Option<&str>) -> String {
    match reason {
        Some(reason) if !reason.is_empty() => format!("connection closed: {reason}"),
        _ => "connection closed".to_owned(),
    }
}

/// Failures of the one-shot start-session request.
#[derive(Debug, Error)]
pub enum SessionStartError {
    /// The request could not be sent or timed out.
    #[error("start request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The agent answered with a non-success status.
    #[error("start request rejected with HTTP {0}")]
    Status(u16),
}
