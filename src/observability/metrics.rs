//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dispatchd_requests_total` (counter): requests by method, status
//! - `dispatchd_request_duration_seconds` (histogram): latency distribution
//! - `dispatchd_events_total` (counter): reported events by kind
//! - `dispatchd_connections_accepted_total` (counter): accepted connections
//!
//! Updates go through the `metrics` facade and are no-ops until a recorder
//! is installed, so library users and tests pay nothing for them.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::observability::events::EventKind;

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "dispatchd_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("dispatchd_request_duration_seconds")
        .record(start.elapsed().as_secs_f64());
}

pub fn record_event(kind: EventKind) {
    metrics::counter!("dispatchd_events_total", "kind" => kind.as_str()).increment(1);
}

pub fn record_connection_accepted() {
    metrics::counter!("dispatchd_connections_accepted_total").increment(1);
}


#[cfg(test)]
mod tests {
    use super::testing::CapturingRecorder;
    use super::*;

    #[test]
    fn events_are_counted_by_kind() {
        let recorder = CapturingRecorder::default();
        metrics::with_local_recorder(&recorder, || {
            record_event(EventKind::HandlerTimeout);
            record_event(EventKind::HandlerTimeout);
            record_event(EventKind::PoolSaturated);
        });

        let total = |kind: EventKind| {
            recorder.counter_total("dispatchd_events_total", &[("kind", kind.as_str())])
        };
        assert_eq!(total(EventKind::HandlerTimeout), 2);
        assert_eq!(total(EventKind::PoolSaturated), 1);
        assert_eq!(total(EventKind::ForcedTermination), 0);
    }
}
