//! Connection draining for graceful shutdown.

use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::task::JoinSet;

use crate::net::ConnectionTracker;
use crate::observability::{Event, EventKind, EventSink};

/// Outcome of a shutdown sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Connections that finished on their own during the drain.
    pub drained: usize,
    /// Connections aborted after the drain timeout.
    pub forced: usize,
    /// Time spent draining, including forced termination.
    pub elapsed: Duration,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.forced == 0
    }
}

/// Wait up to `drain_timeout` for every connection task to finish, then abort
/// the rest.
///
/// Each aborted connection is reported as a `ForcedTermination` event.
/// Aborting a connection drops its dispatch future, which releases the
/// worker slot it held and aborts its handler.
pub async fn drain_connections(
    mut connections: JoinSet<()>,
    tracker: &ConnectionTracker,
    drain_timeout: Duration,
    events: &dyn EventSink,
) -> ShutdownReport {
    let started = Instant::now();
    let mut drained = 0;

    let deadline = tokio::time::sleep(drain_timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            joined = connections.join_next() => match joined {
                Some(_) => drained += 1,
                None => break,
            },
            _ = &mut deadline => break,
        }
    }

    let forced = connections.len();
    if forced > 0 {
        for id in tracker.active_ids() {
            events.log_event(
                Event::new(EventKind::ForcedTermination)
                    .with("connection_id", id)
                    .with("drain_timeout_ms", drain_timeout.as_millis()),
            );
        }
        connections.abort_all();
        while connections.join_next().await.is_some() {}
    }

    let report = ShutdownReport {
        drained,
        forced,
        elapsed: started.elapsed(),
    };
    tracing::info!(
        drained = report.drained,
        forced = report.forced,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Connections drained"
    );
    report
}
