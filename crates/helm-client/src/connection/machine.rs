//! Transport lifecycle as a pure state machine.
//!
//! ```text
//!            start()             opened()
//! Disconnected ──────► Connecting ──────► Connected
//!      ▲                   │                  │
//!      │  retry_due()      │ failed()         │ failed()
//!      └───────────────────┴──────────────────┘
//!                 (backoff delay scheduled)
//!
//! any ── stop() ──► Closing ── start() ──► Connecting
//! ```
//!
//! The machine performs no I/O. The driver in [`super::manager`] feeds it
//! transport outcomes and acts on what it returns, which keeps retry and
//! teardown behavior testable without a live transport.

use std::time::Duration;

use helm_core::{AttemptPolicy, BackoffPolicy, ConnectionState};

/// Lifecycle phase of the persistent channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Not connected. A retry may be scheduled.
    Disconnected,
    /// An open is in flight.
    Connecting,
    /// The channel is open.
    Connected,
    /// The operator asked for teardown; nothing reconnects until `start()`.
    Closing,
}

/// Connection lifecycle with backoff bookkeeping.
#[derive(Debug)]
pub struct ConnectionMachine {
    phase: Phase,
    attempt: u32,
    last_error: Option<String>,
    retry_scheduled: bool,
    backoff: BackoffPolicy,
    attempt_policy: AttemptPolicy,
}

impl ConnectionMachine {
    /// Fresh machine in [`Phase::Disconnected`] with no retry pending.
    pub fn new(backoff: BackoffPolicy, attempt_policy: AttemptPolicy) -> Self {
        Self {
            phase: Phase::Disconnected,
            attempt: 0,
            last_error: None,
            retry_scheduled: false,
            backoff,
            attempt_policy,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Consecutive failures since the last successful open.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Whether a backoff retry is pending.
    pub fn retry_scheduled(&self) -> bool {
        self.retry_scheduled
    }

    /// Operator start. Returns `true` when the driver should open the
    /// channel now.
    ///
    /// No-op while connecting, connected, or waiting on a scheduled retry.
    pub fn start(&mut self) -> bool {
        match self.phase {
            Phase::Connecting | Phase::Connected => false,
            Phase::Disconnected if self.retry_scheduled => false,
            Phase::Disconnected | Phase::Closing => {
                if self.attempt_policy == AttemptPolicy::ResetOnStart {
                    self.attempt = 0;
                }
                self.phase = Phase::Connecting;
                true
            }
        }
    }

    /// Operator teardown. Returns `false` if already closing.
    pub fn stop(&mut self) -> bool {
        if self.phase == Phase::Closing {
            return false;
        }
        self.phase = Phase::Closing;
        self.retry_scheduled = false;
        true
    }

    /// The channel opened. Returns `false` for a stale open (the machine
    /// is not connecting), which the driver must close.
    pub fn opened(&mut self) -> bool {
        if self.phase != Phase::Connecting {
            return false;
        }
        self.phase = Phase::Connected;
        self.attempt = 0;
        self.last_error = None;
        true
    }

    /// The channel failed to open or closed. Returns the delay before the
    /// next attempt, or `None` when the failure is ignored (closing, or no
    /// attempt in flight).
    pub fn failed(&mut self, error: impl Into<String>) -> Option<Duration> {
        if !matches!(self.phase, Phase::Connecting | Phase::Connected) {
            return None;
        }
        let delay = self.backoff.delay_for_attempt(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        self.last_error = Some(error.into());
        self.phase = Phase::Disconnected;
        self.retry_scheduled = true;
        Some(delay)
    }

    /// The backoff timer fired. Returns `true` when the driver should open
    /// the channel now.
    pub fn retry_due(&mut self) -> bool {
        if self.phase != Phase::Disconnected || !self.retry_scheduled {
            return false;
        }
        self.retry_scheduled = false;
        self.phase = Phase::Connecting;
        true
    }

    /// Liveness record published to readers.
    pub fn snapshot(&self) -> ConnectionState {
        ConnectionState {
            connected: self.phase == Phase::Connected,
            attempt: self.attempt,
            last_error: self.last_error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> ConnectionMachine {
        ConnectionMachine::new(
            BackoffPolicy::fixed(Duration::from_secs(1), Duration::from_secs(16)),
            AttemptPolicy::ResetOnStart,
        )
    }

    #[test]
    fn start_is_idempotent() {
        let mut m = machine();
        assert!(m.start());
        assert_eq!(m.phase(), Phase::Connecting);
        assert!(!m.start());
        assert!(m.opened());
        assert!(!m.start());
        assert_eq!(m.phase(), Phase::Connected);
    }

    #[test]
    fn open_sets_connected_and_resets_attempt() {
        let mut m = machine();
        let _ = m.start();
        let _ = m.failed("refused");
        assert!(m.retry_due());
        let _ = m.failed("refused");
        assert!(m.retry_due());
        assert_eq!(m.attempt(), 2);
        assert!(m.opened());
        let snap = m.snapshot();
        assert!(snap.connected);
        assert_eq!(snap.attempt, 0);
        assert!(snap.last_error.is_none());
    }

    #[test]
    fn consecutive_failures_back_off_then_hold() {
        let mut m = machine();
        let _ = m.start();
        let mut delays = Vec::new();
        let mut attempts = Vec::new();
        for _ in 0..6 {
            let delay = m.failed("refused").unwrap();
            delays.push(delay.as_secs());
            attempts.push(m.attempt());
            assert!(!m.snapshot().connected);
            assert!(m.retry_due());
        }
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 16]);
        assert_eq!(attempts, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn failure_records_last_error() {
        let mut m = machine();
        let _ = m.start();
        let _ = m.failed("connection refused");
        let snap = m.snapshot();
        assert_eq!(snap.last_error.as_deref(), Some("connection refused"));
        assert_eq!(snap.attempt, 1);
        assert_eq!(m.phase(), Phase::Disconnected);
        assert!(m.retry_scheduled());
    }

    #[test]
    fn failure_after_stop_is_ignored() {
        let mut m = machine();
        let _ = m.start();
        assert!(m.opened());
        assert!(m.stop());
        let before = m.snapshot();
        assert!(m.failed("late close").is_none());
        assert!(!m.retry_due());
        assert_eq!(m.snapshot(), before);
        assert_eq!(m.phase(), Phase::Closing);
    }

    #[test]
    fn stop_cancels_scheduled_retry() {
        let mut m = machine();
        let _ = m.start();
        let _ = m.failed("refused");
        assert!(m.stop());
        assert!(!m.retry_scheduled());
        assert!(!m.retry_due());
        assert!(!m.stop());
    }

    #[test]
    fn stale_open_rejected() {
        let mut m = machine();
        assert!(!m.opened());
        let _ = m.start();
        let _ = m.stop();
        assert!(!m.opened());
        assert!(!m.snapshot().connected);
    }

    #[test]
    fn start_while_retry_pending_is_noop() {
        let mut m = machine();
        let _ = m.start();
        let _ = m.failed("refused");
        assert!(!m.start());
        assert_eq!(m.attempt(), 1);
    }

    #[test]
    fn restart_resets_attempt_by_default() {
        let mut m = machine();
        let _ = m.start();
        let _ = m.failed("refused");
        let _ = m.retry_due();
        let _ = m.failed("refused");
        let _ = m.stop();
        assert!(m.start());
        assert_eq!(m.attempt(), 0);
    }

    #[test]
    fn persist_policy_keeps_attempt_across_restart() {
        let mut m = ConnectionMachine::new(
            BackoffPolicy::fixed(Duration::from_secs(1), Duration::from_secs(16)),
            AttemptPolicy::Persist,
        );
        let _ = m.start();
        let _ = m.failed("refused");
        let _ = m.retry_due();
        let _ = m.failed("refused");
        let _ = m.stop();
        assert!(m.start());
        assert_eq!(m.attempt(), 2);
        assert_eq!(m.failed("refused"), Some(Duration::from_secs(4)));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Clone, Copy, Debug)]
        enum Input {
            Start,
            Stop,
            Opened,
            Failed,
            RetryDue,
        }

        fn input() -> impl Strategy<Value = Input> {
            prop_oneof![
                Just(Input::Start),
                Just(Input::Stop),
                Just(Input::Opened),
                Just(Input::Failed),
                Just(Input::RetryDue),
            ]
        }

        proptest! {
            #[test]
            fn closing_is_sticky_until_start(inputs in proptest::collection::vec(input(), 0..48)) {
                let mut m = machine();
                for i in inputs {
                    let was_closing = m.phase() == Phase::Closing;
                    let before = m.snapshot();
                    match i {
                        Input::Start => { let _ = m.start(); }
                        Input::Stop => { let _ = m.stop(); }
                        Input::Opened => { let _ = m.opened(); }
                        Input::Failed => { let _ = m.failed("x"); }
                        Input::RetryDue => { let _ = m.retry_due(); }
                    }
                    if was_closing && !matches!(i, Input::Start) {
                        prop_assert_eq!(m.phase(), Phase::Closing);
                        prop_assert_eq!(m.snapshot(), before);
                    }
                    prop_assert_eq!(m.snapshot().connected, m.phase() == Phase::Connected);
                }
            }
        }
    }
}
