//! # helm-client
//!
//! Keeps a local copy of a remote agent's state in sync over one
//! long-lived duplex channel, and carries operator commands back.
//!
//! Data flows one way through the crate:
//!
//! ```text
//! transport → connection manager → decoder → store → subscriptions
//! operator  → dispatcher → connection manager → transport
//! ```
//!
//! - [`decoder`]: inbound frame → typed mutations, never fails outward
//! - [`store`]: single-writer state with per-slice change notification
//! - [`connection`]: lifecycle state machine, reconnect backoff, websocket
//! - [`dispatcher`]: liveness-gated commands and the one-shot start request
//! - [`session`]: wires the above together

#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod decoder;
pub mod dispatcher;
pub mod errors;
pub mod session;
pub mod starter;
pub mod store;

pub use config::ClientConfig;
pub use connection::{ConnectionHandle, Connector, WsConnector};
pub use dispatcher::CommandDispatcher;
pub use errors::{DecodeError, SessionStartError, TransportError};
pub use session::Session;
pub use starter::{HttpSessionStarter, SessionStarter};
pub use store::{Mutation, StoreWriter, Subscription};
