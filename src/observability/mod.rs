//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!     → events.rs (ForcedTermination, HandlerError, HandlerTimeout,
//!                  PoolSaturated reported to an EventSink)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape, optional)
//!     → Custom EventSink supplied by the embedder
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every log line of a request
//! - Metrics are cheap (no-ops until a recorder is installed)
//! - Event sinks are fire-and-forget; they never fail a request

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{Event, EventKind, EventSink, RecordingEventSink, TracingEventSink};
