//! Canonical state store with slice-scoped subscriptions.
//!
//! The store holds four slices: connection liveness, engine state, the
//! thought log and the event log. Each slice lives in its own
//! [`tokio::sync::watch`] channel, so a mutation wakes only the readers of
//! the slice it touched, and every reader sees either the value before or
//! the value after a mutation, never a mix.
//!
//! [`StoreWriter`] is the only way to mutate and is not `Clone`: the
//! connection manager owns it, which gives the store a single writer.
//! [`Subscription`] is the cheap, clonable read side.

use helm_core::{BoundedLog, ConnectionState, EngineState, EventRecord, ThoughtRecord};
use tokio::sync::watch;
use tracing::trace;

/// A decoded change to the store.
#[derive(Clone, Debug, PartialEq)]
pub enum Mutation {
    /// Replace the engine state wholesale.
    ReplaceEngine(EngineState),
    /// Append to the thought log.
    AppendThought(ThoughtRecord),
    /// Append to the event log.
    AppendEvent(EventRecord),
}

/// Create an empty store with the given log capacities.
pub fn channel(thought_cap: usize, event_cap: usize) -> (StoreWriter, Subscription) {
    let (connection, _) = watch::channel(ConnectionState::default());
    let (engine, _) = watch::channel(EngineState::default());
    let (thoughts, _) = watch::channel(BoundedLog::new(thought_cap));
    let (events, _) = watch::channel(BoundedLog::new(event_cap));
    let writer = StoreWriter {
        connection,
        engine,
        thoughts,
        events,
    };
    let reader = writer.subscribe();
    (writer, reader)
}

// ─────────────────────────────────────────────────────────────────────────────
// Writer
// ─────────────────────────────────────────────────────────────────────────────

/// Exclusive write access to the store.
#[derive(Debug)]
pub struct StoreWriter {
    connection: watch::Sender<ConnectionState>,
    engine: watch::Sender<EngineState>,
    thoughts: watch::Sender<BoundedLog<ThoughtRecord>>,
    events: watch::Sender<BoundedLog<EventRecord>>,
}

impl StoreWriter {
    /// Replace the engine state. Returns `false` (and notifies nobody) when
    /// the new state equals the current one.
    pub fn replace_engine(&self, state: EngineState) -> bool {
        let changed = self.engine.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        trace!(changed, "engine snapshot applied");
        changed
    }

    /// Append a thought, evicting the oldest once the log is full.
    pub fn append_thought(&self, thought: ThoughtRecord) {
        self.thoughts.send_modify(|log| log.push(thought));
    }

    /// Append an event, evicting the oldest once the log is full.
    pub fn append_event(&self, event: EventRecord) {
        self.events.send_modify(|log| log.push(event));
    }

    /// Publish connection liveness. Returns `false` when unchanged.
    pub fn set_connection(&self, state: ConnectionState) -> bool {
        self.connection.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        })
    }

    /// Apply a decoded mutation. Returns whether the store changed.
    pub fn apply(&self, mutation: Mutation) -> bool {
        match mutation {
            Mutation::ReplaceEngine(state) => self.replace_engine(state),
            Mutation::AppendThought(thought) => {
                self.append_thought(thought);
                true
            }
            Mutation::AppendEvent(event) => {
                self.append_event(event);
                true
            }
        }
    }

    /// New read handle.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            connection: self.connection.subscribe(),
            engine: self.engine.subscribe(),
            thoughts: self.thoughts.subscribe(),
            events: self.events.subscribe(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Subscription
// ─────────────────────────────────────────────────────────────────────────────

/// Read-only view of the store.
///
/// The accessors return copies of the current value. The `watch_*`
/// methods hand out a receiver for one slice; awaiting
/// [`watch::Receiver::changed`] on it wakes only when that slice changes.
#[derive(Clone, Debug)]
pub struct Subscription {
    connection: watch::Receiver<ConnectionState>,
    engine: watch::Receiver<EngineState>,
    thoughts: watch::Receiver<BoundedLog<ThoughtRecord>>,
    events: watch::Receiver<BoundedLog<EventRecord>>,
}

impl Subscription {
    /// Current connection liveness.
    pub fn connection(&self) -> ConnectionState {
        self.connection.borrow().clone()
    }

    /// Whether the channel is currently open.
    pub fn is_connected(&self) -> bool {
        self.connection.borrow().connected
    }

    /// Current engine state.
    pub fn engine(&self) -> EngineState {
        self.engine.borrow().clone()
    }

    /// Retained thoughts, oldest first.
    pub fn thoughts(&self) -> Vec<ThoughtRecord> {
        self.thoughts.borrow().to_vec()
    }

    /// Retained events, oldest first.
    pub fn events(&self) -> Vec<EventRecord> {
        self.events.borrow().to_vec()
    }

    /// Receiver for the connection slice.
    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.clone()
    }

    /// Receiver for the engine slice.
    pub fn watch_engine(&self) -> watch::Receiver<EngineState> {
        self.engine.clone()
    }

    /// Receiver for the thought log.
    pub fn watch_thoughts(&self) -> watch::Receiver<BoundedLog<ThoughtRecord>> {
        self.thoughts.clone()
    }

    /// Receiver for the event log.
    pub fn watch_events(&self) -> watch::Receiver<BoundedLog<EventRecord>> {
        self.events.clone()
    }
}
