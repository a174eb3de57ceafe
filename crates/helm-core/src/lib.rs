//! # helm-core
//!
//! Foundation types shared by every helm crate:
//!
//! - **Protocol**: inbound [`Envelope`](protocol::Envelope), the three payload
//!   shapes, outbound [`Command`](protocol::Command), and the
//!   [`ConnectionState`](protocol::ConnectionState) liveness record
//! - **Bounded logs**: [`BoundedLog`] with FIFO eviction
//! - **Backoff**: [`BackoffPolicy`] for reconnect delays
//! - **Logging**: `tracing` subscriber bootstrap and log capture for tests

#![deny(unsafe_code)]

pub mod backoff;
pub mod bounded_log;
pub mod logging;
pub mod protocol;

pub use backoff::{AttemptPolicy, BackoffPolicy};
pub use bounded_log::BoundedLog;
pub use protocol::{
    AgentType, Command, ConnectionState, EnginePhase, EngineState, Envelope, EventRecord,
    InvalidSpeed, Speed, ThoughtRecord,
};
