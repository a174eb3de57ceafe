//! Wiring of store, connection manager and dispatcher for one operator
//! session.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::ClientConfig;
use crate::connection::{ConnectionHandle, ConnectionManager, Connector, WsConnector};
use crate::dispatcher::CommandDispatcher;
use crate::errors::SessionStartError;
use crate::starter::{HttpSessionStarter, SessionStarter};
use crate::store::{self, Subscription};

/// A live operator session.
///
/// Dropping the session shuts the connection manager down.
pub struct Session {
    subscription: Subscription,
    connection: ConnectionHandle,
    dispatcher: CommandDispatcher,
    task: JoinHandle<()>,
}

impl Session {
    /// Session over the websocket transport and HTTP start request.
    pub fn connect(config: &ClientConfig) -> Result<Self, SessionStartError> {
        let connector = Arc::new(WsConnector::new(
            config.outbound_queue,
            config.connect_timeout,
        ));
        let starter = Arc::new(HttpSessionStarter::new(
            config.start_url.clone(),
            config.request_timeout,
        )?);
        Ok(Self::with_parts(config, connector, starter))
    }

    /// Session over caller-supplied transport and starter.
    pub fn with_parts(
        config: &ClientConfig,
        connector: Arc<dyn Connector>,
        starter: Arc<dyn SessionStarter>,
    ) -> Self {
        let (writer, subscription) = store::channel(config.thought_cap, config.event_cap);
        let (connection, task) = ConnectionManager::spawn(config.manager(), connector, writer);
        let dispatcher = CommandDispatcher::new(connection.clone(), subscription.clone(), starter);
        Self {
            subscription,
            connection,
            dispatcher,
            task,
        }
    }

    /// Read-only view of the store.
    pub fn subscribe(&self) -> Subscription {
        self.subscription.clone()
    }

    /// Command dispatcher for this session.
    pub fn dispatcher(&self) -> CommandDispatcher {
        self.dispatcher.clone()
    }

    /// Open the persistent channel.
    pub async fn start(&self) {
        self.connection.start().await;
    }

    /// Close the channel and cancel any pending reconnect.
    pub async fn stop(&self) {
        self.connection.stop().await;
    }

    /// Stop the channel, end the manager task and wait for it.
    ///
    /// Dispatcher clones outlive the session but refuse every command.
    pub async fn shutdown(mut self) {
        self.connection.shutdown().await;
        if let Err(e) = (&mut self.task).await {
            debug!(error = %e, "connection manager task ended abnormally");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.task.is_finished() && !self.connection.request_shutdown() {
            self.task.abort();
        }
    }
}
