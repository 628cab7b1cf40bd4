//! Progress and diagnostic events.
//!
//! The engine reports cache use, provider outcomes, destination conflicts
//! and executor progress on a broadcast channel. Subscribers are optional;
//! sending never blocks and slow subscribers lose the oldest events.

use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::broadcast;

/// Default number of buffered events per subscriber.
pub const DEFAULT_CAPACITY: usize = 256;

/// Outcome of one provider search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SearchOutcome {
    Success { count: usize },
    Timeout,
    Error { message: String },
}

/// Engine event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    CacheHit {
        query: String,
    },
    CacheMiss {
        query: String,
    },
    ProviderSearch {
        provider: String,
        query: String,
        outcome: SearchOutcome,
    },
    DestinationConflict {
        wanted: PathBuf,
        chosen: PathBuf,
    },
    DuplicateSkipped {
        source: PathBuf,
        existing: PathBuf,
    },
    OperationStarted {
        plan_id: String,
        index: usize,
        source: PathBuf,
    },
    OperationSucceeded {
        plan_id: String,
        index: usize,
        destination: PathBuf,
    },
    OperationSkipped {
        plan_id: String,
        index: usize,
    },
    OperationFailed {
        plan_id: String,
        index: usize,
        reason: String,
    },
    PlanCancelled {
        plan_id: String,
        resume_from: usize,
    },
}

/// Broadcast bus for engine events.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a bus buffering `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring the case where nobody listens.
    pub fn emit(&self, event: Event) {
        let _ = self.tx.send(event);
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
