//! Operational event reporting.
//!
//! The dispatcher and lifecycle controller report noteworthy per-request
//! failures through an [`EventSink`]. Sinks are fire-and-forget: they must not
//! block and cannot fail the request that produced the event.

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::observability::metrics;

/// Kinds of events the server reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A connection was aborted because it outlived the drain timeout.
    ForcedTermination,
    /// A handler returned an error or panicked.
    HandlerError,
    /// A handler exceeded its execution timeout.
    HandlerTimeout,
    /// No worker slot became free within the acquire timeout.
    PoolSaturated,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ForcedTermination => "forced_termination",
            EventKind::HandlerError => "handler_error",
            EventKind::HandlerTimeout => "handler_timeout",
            EventKind::PoolSaturated => "pool_saturated",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reported event with free-form string metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub metadata: Vec<(&'static str, String)>,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            metadata: Vec::new(),
        }
    }

    /// Attach a metadata field.
    pub fn with(mut self, key: &'static str, value: impl ToString) -> Self {
        self.metadata.push((key, value.to_string()));
        self
    }

    /// Look up the first metadata value recorded under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// External observability collaborator.
pub trait EventSink: Send + Sync + fmt::Debug {
    fn log_event(&self, event: Event);
}

/// Default sink: structured log line plus an event counter.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn log_event(&self, event: Event) {
        metrics::record_event(event.kind);

        let fields = event
            .metadata
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ");

        match event.kind {
            EventKind::HandlerError | EventKind::ForcedTermination => {
                tracing::error!(kind = %event.kind, %fields, "Server event");
            }
            EventKind::HandlerTimeout | EventKind::PoolSaturated => {
                tracing::warn!(kind = %event.kind, %fields, "Server event");
            }
        }
    }
}

/// Sink that keeps every event in memory. Used by tests and embedders that
/// want to inspect what happened.
#[derive(Debug, Default, Clone)]
pub struct RecordingEventSink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Number of recorded events of `kind`.
    pub fn count(&self, kind: EventKind) -> usize {
        self.events().iter().filter(|e| e.kind == kind).count()
    }
}

impl EventSink for RecordingEventSink {
    fn log_event(&self, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
