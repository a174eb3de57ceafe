//! Command Dispatcher: operator intents → outbound frames.
//!
//! Commands are gated on liveness. While the store reports the channel as
//! down a command is refused without touching the transport, and nothing
//! is queued for later: a stale pause or speed change must not replay
//! after a reconnect. The engine state only changes when the agent
//! acknowledges with a `state_snapshot`.

use std::sync::Arc;

use helm_core::{Command, Speed};
use tracing::{debug, info, warn};

use crate::connection::ConnectionHandle;
use crate::starter::SessionStarter;
use crate::store::Subscription;

/// Translates operator intents into protocol frames.
#[derive(Clone)]
pub struct CommandDispatcher {
    connection: ConnectionHandle,
    state: Subscription,
    starter: Arc<dyn SessionStarter>,
}

impl std::fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("connected", &self.state.is_connected())
            .finish_non_exhaustive()
    }
}

impl CommandDispatcher {
    /// Dispatcher sending through `connection`, gated on `state`.
    pub fn new(
        connection: ConnectionHandle,
        state: Subscription,
        starter: Arc<dyn SessionStarter>,
    ) -> Self {
        Self {
            connection,
            state,
            starter,
        }
    }

    /// Ask the agent to pause. Returns whether the frame was sent.
    pub async fn pause(&self) -> bool {
        self.dispatch(Command::Pause).await
    }

    /// Ask the agent to resume. Returns whether the frame was sent.
    pub async fn resume(&self) -> bool {
        self.dispatch(Command::Resume).await
    }

    /// Ask the agent to change speed. Returns whether the frame was sent.
    pub async fn set_speed(&self, speed: Speed) -> bool {
        self.dispatch(Command::SetSpeed { value: speed }).await
    }

    /// Fire the one-shot start request. The outcome is only logged.
    pub async fn start_session(&self) {
        match self.starter.start().await {
            Ok(()) => info!("session start requested"),
            Err(e) => warn!(error = %e, "session start failed"),
        }
    }

    async fn dispatch(&self, command: Command) -> bool {
        if !self.state.is_connected() {
            debug!(command = command.name(), "not connected, command refused");
            return false;
        }
        let frame = match serde_json::to_string(&command) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(command = command.name(), error = %e, "failed to encode command");
                return false;
            }
        };
        let sent = self.connection.send(frame).await;
        if sent {
            debug!(command = command.name(), "command sent");
        } else {
            debug!(command = command.name(), "command refused by transport");
        }
        sent
    }
}
