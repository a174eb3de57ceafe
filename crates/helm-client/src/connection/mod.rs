//! Connection Manager: lifecycle of the persistent channel to the agent.
//!
//! - [`machine`]: the pure state machine (phases, attempt counter, backoff)
//! - [`manager`]: the task that drives it and owns the store writer
//! - [`transport`]: the [`Connector`] seam and the websocket implementation

pub mod machine;
pub mod manager;
pub mod transport;

pub use machine::{ConnectionMachine, Phase};
pub use manager::{ConnectionHandle, ConnectionManager, ManagerConfig};
pub use transport::{Connector, Inbound, Link, WsConnector};
