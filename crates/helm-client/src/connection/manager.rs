//! Async driver for the connection lifecycle.
//!
//! One task owns the [`ConnectionMachine`], the [`StoreWriter`], the
//! current [`Link`], any in-flight connect and the backoff timer. Operator
//! calls arrive over a control channel, so every state change (and every
//! store mutation) happens on this task, one at a time. Each inbound frame
//! is decoded and applied in full before the next wake is handled.

use std::future::{self, Future};
use std::pin::Pin;
use std::sync::Arc;

use helm_core::{AttemptPolicy, BackoffPolicy};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Sleep};
use tracing::{debug, info, warn};

use super::machine::{ConnectionMachine, Phase};
use super::transport::{Connector, Inbound, Link};
use crate::decoder;
use crate::errors::TransportError;
use crate::store::StoreWriter;

type PendingConnect = Pin<Box<dyn Future<Output = Result<Link, TransportError>> + Send>>;

/// Queue depth for operator control messages.
const CONTROL_QUEUE: usize = 32;

/// Parameters for a [`ConnectionManager`].
#[derive(Clone, Debug)]
pub struct ManagerConfig {
    /// Channel endpoint.
    pub url: String,
    /// Reconnect delays.
    pub backoff: BackoffPolicy,
    /// Attempt counter behavior across stop/start.
    pub attempt_policy: AttemptPolicy,
}

enum Control {
    Start,
    Stop,
    Shutdown,
    Send {
        frame: String,
        reply: oneshot::Sender<bool>,
    },
}

/// Cloneable handle to a running connection manager.
#[derive(Clone, Debug)]
pub struct ConnectionHandle {
    control: mpsc::Sender<Control>,
}

impl std::fmt::Debug for Control {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => f.write_str("Start"),
            Self::Stop => f.write_str("Stop"),
            Self::Shutdown => f.write_str("Shutdown"),
            Self::Send { .. } => f.write_str("Send"),
        }
    }
}

impl ConnectionHandle {
    /// Open the channel unless it is already open or opening.
    pub async fn start(&self) {
        let _ = self.control.send(Control::Start).await;
    }

    /// Tear the channel down and cancel any pending retry.
    pub async fn stop(&self) {
        let _ = self.control.send(Control::Stop).await;
    }

    /// Stop and end the manager task. Later calls on any handle are no-ops
    /// and `send` returns `false`.
    pub async fn shutdown(&self) {
        let _ = self.control.send(Control::Shutdown).await;
    }

    /// Non-blocking [`shutdown`](Self::shutdown) for use from `Drop`.
    /// Returns `false` if the request could not be queued.
    pub fn request_shutdown(&self) -> bool {
        self.control.try_send(Control::Shutdown).is_ok()
    }

    /// Transmit a frame. Returns `false` without queuing anything when the
    /// channel is not open.
    pub async fn send(&self, frame: String) -> bool {
        let (reply, rx) = oneshot::channel();
        if self.control.send(Control::Send { frame, reply }).await.is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Whether the manager task is still running.
    pub fn is_alive(&self) -> bool {
        !self.control.is_closed()
    }
}

/// Owner of the transport lifecycle. Spawned as a task; drive it through
/// the returned [`ConnectionHandle`].
pub struct ConnectionManager {
    machine: ConnectionMachine,
    connector: Arc<dyn Connector>,
    url: String,
    store: StoreWriter,
    link: Option<Link>,
    pending: Option<PendingConnect>,
    retry: Option<Pin<Box<Sleep>>>,
}

/// What woke the manager.
enum Wake {
    Control(Option<Control>),
    Opened(Result<Link, TransportError>),
    Inbound(Inbound),
    RetryDue,
}

impl ConnectionManager {
    /// Spawn the manager task. It exits on [`ConnectionHandle::shutdown`]
    /// or once every handle is dropped.
    pub fn spawn(
        config: ManagerConfig,
        connector: Arc<dyn Connector>,
        store: StoreWriter,
    ) -> (ConnectionHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(CONTROL_QUEUE);
        let manager = Self {
            machine: ConnectionMachine::new(config.backoff, config.attempt_policy),
            connector,
            url: config.url,
            store,
            link: None,
            pending: None,
            retry: None,
        };
        let task = tokio::spawn(manager.run(rx));
        (ConnectionHandle { control: tx }, task)
    }

    async fn run(mut self, mut control: mpsc::Receiver<Control>) {
        self.publish();
        loop {
            let wake = tokio::select! {
                msg = control.recv() => Wake::Control(msg),
                result = next_open(&mut self.pending) => Wake::Opened(result),
                inbound = next_inbound(&mut self.link) => Wake::Inbound(inbound),
                () = retry_elapsed(&mut self.retry) => Wake::RetryDue,
            };

            match wake {
                Wake::Control(None) => {
                    self.stop();
                    debug!("all connection handles dropped, manager exiting");
                    return;
                }
                Wake::Control(Some(Control::Start)) => self.start(),
                Wake::Control(Some(Control::Stop)) => self.stop(),
                Wake::Control(Some(Control::Shutdown)) => {
                    self.stop();
                    debug!("connection manager shut down");
                    return;
                }
                Wake::Control(Some(Control::Send { frame, reply })) => {
                    let _ = reply.send(self.send(frame));
                }
                Wake::Opened(result) => {
                    self.pending = None;
                    match result {
                        Ok(link) => self.opened(link),
                        Err(e) => self.failed(&e),
                    }
                }
                Wake::Inbound(Inbound::Frame(frame)) => {
                    let _ = decoder::apply_frame(&frame, &self.store);
                }
                Wake::Inbound(Inbound::Closed(e)) => {
                    self.link = None;
                    self.failed(&e);
                }
                Wake::RetryDue => {
                    self.retry = None;
                    if self.machine.retry_due() {
                        self.begin_connect();
                    }
                }
            }
        }
    }

    fn start(&mut self) {
        if self.machine.start() {
            self.retry = None;
            self.begin_connect();
        }
    }

    fn stop(&mut self) {
        if !self.machine.stop() {
            return;
        }
        self.pending = None;
        self.retry = None;
        if let Some(link) = self.link.take() {
            link.close();
        }
        info!("connection stopped");
        self.publish();
    }

    fn send(&self, frame: String) -> bool {
        if self.machine.phase() != Phase::Connected {
            return false;
        }
        self.link.as_ref().is_some_and(|link| link.try_send(frame))
    }

    fn begin_connect(&mut self) {
        let connector = Arc::clone(&self.connector);
        let url = self.url.clone();
        info!(url = %self.url, attempt = self.machine.attempt(), "connecting");
        self.pending = Some(Box::pin(async move { connector.connect(&url).await }));
        self.publish();
    }

    fn opened(&mut self, link: Link) {
        if !self.machine.opened() {
            debug!("discarding stale connection");
            link.close();
            return;
        }
        self.link = Some(link);
        info!(url = %self.url, "connected");
        self.publish();
    }

    fn failed(&mut self, error: &TransportError) {
        let Some(delay) = self.machine.failed(error.to_string()) else {
            debug!(error = %error, "ignoring transport failure");
            return;
        };
        warn!(
            error = %error,
            attempt = self.machine.attempt(),
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "connection lost, retrying"
        );
        self.retry = Some(Box::pin(time::sleep(delay)));
        self.publish();
    }

    fn publish(&self) {
        let _ = self.store.set_connection(self.machine.snapshot());
    }
}

async fn next_open(pending: &mut Option<PendingConnect>) -> Result<Link, TransportError> {
    match pending {
        Some(fut) => fut.as_mut().await,
        None => future::pending().await,
    }
}

async fn next_inbound(link: &mut Option<Link>) -> Inbound {
    match link {
        Some(link) => link.recv().await,
        None => future::pending().await,
    }
}

async fn retry_elapsed(retry: &mut Option<Pin<Box<Sleep>>>) {
    match retry {
        Some(sleep) => sleep.as_mut().await,
        None => future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{self, Subscription};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    /// Longer than any backoff used below.
    const FOREVER: Duration = Duration::from_secs(3600);

    /// Remote end of a mock link.
    struct Remote {
        outbound: mpsc::Receiver<String>,
        inbound: mpsc::Sender<Inbound>,
        cancel: CancellationToken,
    }

    /// Connector that replays scripted outcomes and hands the remote ends
    /// of successful links to the test.
    struct MockConnector {
        script: Mutex<VecDeque<bool>>,
        remotes: mpsc::UnboundedSender<Remote>,
        calls: Mutex<u32>,
    }

    impl MockConnector {
        fn new(script: &[bool]) -> (Arc<Self>, mpsc::UnboundedReceiver<Remote>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let connector = Arc::new(Self {
                script: Mutex::new(script.iter().copied().collect()),
                remotes: tx,
                calls: Mutex::new(0),
            });
            (connector, rx)
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        async fn connect(&self, _url: &str) -> Result<Link, TransportError> {
            *self.calls.lock().unwrap() += 1;
            let succeed = self.script.lock().unwrap().pop_front().unwrap_or(false);
            if !succeed {
                return Err(TransportError::Connect("refused".into()));
            }
            let (out_tx, out_rx) = mpsc::channel(8);
            let (in_tx, in_rx) = mpsc::channel(8);
            let cancel = CancellationToken::new();
            let _ = self.remotes.send(Remote {
                outbound: out_rx,
                inbound: in_tx,
                cancel: cancel.clone(),
            });
            Ok(Link::new(out_tx, in_rx, cancel))
        }
    }

    fn config(base_secs: u64, max_secs: u64) -> ManagerConfig {
        ManagerConfig {
            url: "ws://agent.test/ws".into(),
            backoff: BackoffPolicy::fixed(
                Duration::from_secs(base_secs),
                Duration::from_secs(max_secs),
            ),
            attempt_policy: AttemptPolicy::ResetOnStart,
        }
    }

    fn spawn_with(
        connector: Arc<MockConnector>,
        config: ManagerConfig,
    ) -> (ConnectionHandle, Subscription) {
        let (writer, reader) = store::channel(4, 4);
        let (handle, _task) = ConnectionManager::spawn(config, connector, writer);
        (handle, reader)
    }

    /// Let the manager task drain everything that is ready.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn start_connects_and_publishes() {
        let (connector, mut remotes) = MockConnector::new(&[true]);
        let (handle, reader) = spawn_with(connector, config(1, 16));
        assert!(!reader.is_connected());

        handle.start().await;
        settle().await;

        assert!(remotes.recv().await.is_some());
        let state = reader.connection();
        assert!(state.connected);
        assert_eq!(state.attempt, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn start_twice_opens_once() {
        let (connector, _remotes) = MockConnector::new(&[true, true]);
        let (handle, _reader) = spawn_with(Arc::clone(&connector), config(1, 16));
        handle.start().await;
        handle.start().await;
        settle().await;
        handle.start().await;
        settle().await;
        assert_eq!(connector.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn inbound_frames_reach_store_in_order() {
        let (connector, mut remotes) = MockConnector::new(&[true]);
        let (handle, reader) = spawn_with(connector, config(1, 16));
        handle.start().await;
        settle().await;
        let remote = remotes.recv().await.unwrap();

        for action in ["a", "garbage", "b"] {
            let frame = if action == "garbage" {
                "{nope".to_owned()
            } else {
                serde_json::json!({
                    "type": "thought",
                    "payload": {
                        "agent_type": "MENU",
                        "action": action,
                        "reasoning": "",
                        "timestamp": "2024-05-01T00:00:00Z"
                    }
                })
                .to_string()
            };
            remote.inbound.send(Inbound::Frame(frame)).await.unwrap();
        }
        settle().await;

        let actions: Vec<String> = reader.thoughts().into_iter().map(|t| t.action).collect();
        assert_eq!(actions, vec!["a", "b"]);
        assert!(reader.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn send_only_when_connected() {
        let (connector, mut remotes) = MockConnector::new(&[true]);
        let (handle, _reader) = spawn_with(connector, config(1, 16));

        assert!(!handle.send("early".into()).await);

        handle.start().await;
        settle().await;
        let mut remote = remotes.recv().await.unwrap();
        assert!(handle.send(r#"{"type":"pause"}"#.into()).await);
        assert_eq!(remote.outbound.recv().await.unwrap(), r#"{"type":"pause"}"#);

        handle.stop().await;
        assert!(!handle.send("late".into()).await);
        // The link was dropped on stop; nothing else was queued.
        assert!(remote.outbound.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn failures_back_off_exponentially() {
        let (connector, _remotes) = MockConnector::new(&[false, false, false, false, true]);
        let (handle, reader) = spawn_with(Arc::clone(&connector), config(1, 4));

        handle.start().await;
        settle().await;
        assert_eq!(connector.calls(), 1);
        assert_eq!(reader.connection().attempt, 1);
        assert_eq!(reader.connection().last_error.as_deref(), Some("connect failed: refused"));

        // Expected waits: 1s, 2s, 4s, then capped at 4s.
        for (wait, expected_calls) in [(1, 2), (2, 3), (4, 4), (4, 5)] {
            time::advance(Duration::from_millis(wait * 1000 - 1)).await;
            settle().await;
            assert_eq!(connector.calls(), expected_calls - 1, "fired early");
            time::advance(Duration::from_millis(1)).await;
            settle().await;
            assert_eq!(connector.calls(), expected_calls);
        }

        let state = reader.connection();
        assert!(state.connected);
        assert_eq!(state.attempt, 0);
        assert!(state.last_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn remote_close_triggers_reconnect() {
        let (connector, mut remotes) = MockConnector::new(&[true, true]);
        let (handle, reader) = spawn_with(Arc::clone(&connector), config(2, 30));
        handle.start().await;
        settle().await;
        let remote = remotes.recv().await.unwrap();

        remote
            .inbound
            .send(Inbound::Closed(TransportError::Closed(Some("bye".into()))))
            .await
            .unwrap();
        settle().await;
        let state = reader.connection();
        assert!(!state.connected);
        assert_eq!(state.attempt, 1);
        assert_eq!(state.last_error.as_deref(), Some("connection closed: bye"));

        time::advance(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(connector.calls(), 2);
        assert!(reader.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_retry_timer() {
        let (connector, _remotes) = MockConnector::new(&[false]);
        let (handle, reader) = spawn_with(Arc::clone(&connector), config(1, 16));
        handle.start().await;
        settle().await;
        assert_eq!(connector.calls(), 1);

        handle.stop().await;
        settle().await;
        let stopped = reader.connection();

        time::advance(FOREVER).await;
        settle().await;
        assert_eq!(connector.calls(), 1);
        assert_eq!(reader.connection(), stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn late_error_after_stop_is_ignored() {
        let (connector, mut remotes) = MockConnector::new(&[true]);
        let (handle, reader) = spawn_with(Arc::clone(&connector), config(1, 16));
        handle.start().await;
        settle().await;
        let remote = remotes.recv().await.unwrap();

        handle.stop().await;
        settle().await;
        assert!(remote.cancel.is_cancelled());
        let stopped = reader.connection();
        assert!(!stopped.connected);

        // The closed link's error arrives after teardown.
        let _ = remote
            .inbound
            .send(Inbound::Closed(TransportError::Io("reset".into())))
            .await;
        time::advance(FOREVER).await;
        settle().await;

        assert_eq!(reader.connection(), stopped);
        assert_eq!(connector.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_after_stop_reconnects() {
        let (connector, _remotes) = MockConnector::new(&[false, true]);
        let (handle, reader) = spawn_with(Arc::clone(&connector), config(1, 16));
        handle.start().await;
        settle().await;
        assert_eq!(reader.connection().attempt, 1);

        handle.stop().await;
        handle.start().await;
        settle().await;
        assert_eq!(connector.calls(), 2);
        assert!(reader.is_connected());
        assert_eq!(reader.connection().attempt, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_ends_task_for_all_handles() {
        let (connector, _remotes) = MockConnector::new(&[true]);
        let (writer, reader) = store::channel(1, 1);
        let (handle, task) = ConnectionManager::spawn(config(1, 16), connector, writer);
        let other = handle.clone();
        handle.start().await;
        handle.shutdown().await;
        task.await.unwrap();
        assert!(!other.is_alive());
        assert!(!other.send("x".into()).await);
        assert!(!reader.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn manager_exits_when_handles_dropped() {
        let (connector, _remotes) = MockConnector::new(&[]);
        let (writer, _reader) = store::channel(1, 1);
        let (handle, task) = ConnectionManager::spawn(config(1, 16), connector, writer);
        drop(handle);
        task.await.unwrap();
    }
}
