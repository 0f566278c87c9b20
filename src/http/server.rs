//! HTTP server setup and lifecycle control.
//!
//! # Responsibilities
//! - Collect routes before start
//! - Bind the acceptor and run the accept loop
//! - Serve each connection with hyper's HTTP/1.1 implementation
//! - Coordinate graceful shutdown: stop accepting, drain, force-terminate

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Method;
use hyper_util::rt::{TokioIo, TokioTimer};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::Instrument;

use crate::config::ServerConfig;
use crate::http::dispatcher::Dispatcher;
use crate::http::handler::Handler;
use crate::http::request::{Request, RequestError, RequestId};
use crate::http::response::Response;
use crate::lifecycle::{drain_connections, shutdown_signal, Lifecycle, ServerState, ShutdownReport};
use crate::net::{Accepted, Acceptor, ConnectionGuard, ConnectionId, ConnectionTracker, ListenerError};
use crate::observability::{metrics, EventSink, TracingEventSink};
use crate::routing::{RouteError, RouteTable};
use crate::worker::WorkerPool;

/// Pause after a failed accept (e.g. file descriptor exhaustion).
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Per-connection limits on how a request is read.
#[derive(Debug, Clone, Copy)]
struct Intake {
    max_body_bytes: usize,
    read_timeout: Duration,
}

/// Errors that stop the server from starting.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid listen address: {0}")]
    InvalidAddress(#[from] std::net::AddrParseError),
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("server cannot start from state {0}")]
    InvalidState(ServerState),
    #[error("failed to wait for shutdown signal: {0}")]
    Signal(#[source] std::io::Error),
}

/// Live counters shared by the server, its handle and status handlers.
#[derive(Debug, Clone)]
pub struct ServerStats {
    lifecycle: Lifecycle,
    pool: WorkerPool,
    tracker: ConnectionTracker,
    accepted: Arc<AtomicU64>,
}

/// Point-in-time view of [`ServerStats`].
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub state: ServerState,
    pub accepted_connections: u64,
    pub active_connections: usize,
    pub workers: WorkerSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerSnapshot {
    pub capacity: usize,
    pub in_use: usize,
    pub acquired_total: u64,
    pub saturated_total: u64,
}

impl ServerStats {
    pub fn state(&self) -> ServerState {
        self.lifecycle.state()
    }

    pub fn accepted_connections(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn active_connections(&self) -> usize {
        self.tracker.active_count()
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            state: self.state(),
            accepted_connections: self.accepted_connections(),
            active_connections: self.active_connections(),
            workers: WorkerSnapshot {
                capacity: self.pool.capacity(),
                in_use: self.pool.in_use(),
                acquired_total: self.pool.acquired_total(),
                saturated_total: self.pool.saturated_total(),
            },
        }
    }
}

/// A server that has not started yet. Routes can only be registered here.
pub struct HttpServer {
    config: ServerConfig,
    routes: RouteTable,
    stats: ServerStats,
    events: Arc<dyn EventSink>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServerConfig) -> Self {
        let pool = WorkerPool::new(
            config.workers.effective_capacity(),
            config.workers.acquire_timeout(),
        );
        let stats = ServerStats {
            lifecycle: Lifecycle::new(),
            pool,
            tracker: ConnectionTracker::new(),
            accepted: Arc::new(AtomicU64::new(0)),
        };

        Self {
            config,
            routes: RouteTable::new(),
            stats,
            events: Arc::new(TracingEventSink),
        }
    }

    /// Replace the observability collaborator that receives server events.
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Register a handler for `method` and `pattern`.
    ///
    /// Patterns are exact paths (`/users`) or trailing wildcards (`/api/*`).
    pub fn register_route<H: Handler>(
        &mut self,
        method: Method,
        pattern: &str,
        handler: H,
    ) -> Result<(), RouteError> {
        self.routes.register(method, pattern, handler)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    /// Bind the listener, move to Running and start accepting.
    pub async fn start(self) -> Result<ServerHandle, ServerError> {
        let Self {
            config,
            routes,
            stats,
            events,
        } = self;

        let state = stats.lifecycle.state();
        if state != ServerState::Starting {
            return Err(ServerError::InvalidState(state));
        }

        let addr = config.listener.socket_addr()?;
        let acceptor =
            Acceptor::listen(addr, stats.lifecycle.clone(), Arc::clone(&stats.accepted)).await?;
        let local_addr = acceptor.local_addr();

        let dispatcher = Dispatcher::new(
            Arc::new(routes),
            stats.pool.clone(),
            config.timeouts.handler(),
            Arc::clone(&events),
        );

        if !stats
            .lifecycle
            .transition(ServerState::Starting, ServerState::Running)
        {
            return Err(ServerError::InvalidState(stats.lifecycle.state()));
        }

        tracing::info!(
            address = %local_addr,
            workers = stats.pool.capacity(),
            routes = dispatcher.routes().len(),
            handler_timeout_ms = dispatcher.handler_timeout().as_millis() as u64,
            request_read_timeout_ms = config.timeouts.request_read_ms,
            "HTTP server started"
        );

        for route in dispatcher.routes().iter() {
            tracing::info!(method = %route.method(), pattern = %route.pattern(), "Serving route");
        }

        let accept_task = tokio::spawn(accept_loop(
            acceptor,
            dispatcher,
            stats.tracker.clone(),
            stats.lifecycle.clone(),
            Intake {
                max_body_bytes: config.limits.max_body_bytes,
                read_timeout: config.timeouts.request_read(),
            },
        ));

        Ok(ServerHandle {
            shared: Arc::new(Shared {
                local_addr,
                drain_timeout: config.timeouts.drain(),
                stats,
                events,
                accept_task: Mutex::new(Some(accept_task)),
                report: Mutex::new(None),
            }),
        })
    }

    /// Start, run until SIGINT/SIGTERM, then shut down with the configured
    /// drain timeout.
    pub async fn run_until_signal(self) -> Result<ShutdownReport, ServerError> {
        let handle = self.start().await?;

        let signal = shutdown_signal().await.map_err(ServerError::Signal);
        match &signal {
            Ok(name) => tracing::info!(signal = name, "Shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "Signal handler failed; shutting down"),
        }

        let report = handle.shutdown(handle.drain_timeout()).await;
        signal.map(|_| report)
    }
}

struct Shared {
    local_addr: SocketAddr,
    drain_timeout: Duration,
    stats: ServerStats,
    events: Arc<dyn EventSink>,
    accept_task: Mutex<Option<JoinHandle<JoinSet<()>>>>,
    report: Mutex<Option<ShutdownReport>>,
}

/// Handle to a running server. Cheap to clone.
#[derive(Clone)]
pub struct ServerHandle {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle")
            .field("local_addr", &self.shared.local_addr)
            .field("state", &self.state())
            .finish()
    }
}

impl ServerHandle {
    /// Address the server is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.shared.local_addr
    }

    pub fn state(&self) -> ServerState {
        self.shared.stats.state()
    }

    pub fn stats(&self) -> &ServerStats {
        &self.shared.stats
    }

    /// Configured drain timeout.
    pub fn drain_timeout(&self) -> Duration {
        self.shared.drain_timeout
    }

    /// Gracefully shut the server down.
    ///
    /// Stops accepting immediately, lets in-flight connections finish for up
    /// to `drain_timeout`, then aborts whatever is left. Calling this again
    /// (concurrently or later) waits for the first call's outcome.
    pub async fn shutdown(&self, drain_timeout: Duration) -> ShutdownReport {
        let lifecycle = &self.shared.stats.lifecycle;
        if !lifecycle.transition(ServerState::Running, ServerState::Draining) {
            tracing::debug!(state = %lifecycle.state(), "Shutdown already in progress");
            return self.stopped().await;
        }

        tracing::info!(
            drain_timeout_ms = drain_timeout.as_millis() as u64,
            active_connections = self.shared.stats.active_connections(),
            "Draining connections"
        );

        let accept_task = self
            .shared
            .accept_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let connections = match accept_task {
            Some(task) => task.await.unwrap_or_else(|e| {
                tracing::error!(error = %e, "Accept loop failed");
                JoinSet::new()
            }),
            None => JoinSet::new(),
        };

        let report = drain_connections(
            connections,
            &self.shared.stats.tracker,
            drain_timeout,
            self.shared.events.as_ref(),
        )
        .await;

        self.shared.stats.pool.close();
        *self
            .shared
            .report
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(report.clone());
        lifecycle.transition(ServerState::Draining, ServerState::Stopped);

        tracing::info!("HTTP server stopped");
        report
    }

    /// Wait until the server is Stopped and return the shutdown outcome.
    pub async fn stopped(&self) -> ShutdownReport {
        self.shared
            .stats
            .lifecycle
            .wait_for(ServerState::Stopped)
            .await;
        self.shared
            .report
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .unwrap_or(ShutdownReport {
                drained: 0,
                forced: 0,
                elapsed: Duration::ZERO,
            })
    }
}

/// Accept connections until the server leaves Running. Returns the
/// connection tasks still in flight.
async fn accept_loop(
    acceptor: Acceptor,
    dispatcher: Dispatcher,
    tracker: ConnectionTracker,
    lifecycle: Lifecycle,
    intake: Intake,
) -> JoinSet<()> {
    let mut connections = JoinSet::new();
    let mut state_rx = lifecycle.subscribe();

    loop {
        tokio::select! {
            biased;

            changed = state_rx.changed() => {
                if changed.is_err() || !state_rx.borrow_and_update().is_accepting() {
                    break;
                }
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            accepted = acceptor.accept() => match accepted {
                Ok(conn) => {
                    let guard = tracker.track(conn.id);
                    connections.spawn(serve_connection(
                        conn,
                        dispatcher.clone(),
                        intake,
                        lifecycle.subscribe(),
                        guard,
                    ));
                }
                Err(ListenerError::AcceptAfterShutdown(state)) => {
                    tracing::warn!(state = %state, "Accept attempted after shutdown; ignoring");
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }
    }

    let accepted_total = acceptor.accepted_total();
    drop(acceptor);
    tracing::info!(
        accepted_total,
        in_flight = connections.len(),
        "Stopped accepting connections"
    );
    connections
}

/// Serve one connection until the client closes it or the server drains.
async fn serve_connection(
    accepted: Accepted,
    dispatcher: Dispatcher,
    intake: Intake,
    mut state_rx: watch::Receiver<ServerState>,
    guard: ConnectionGuard,
) {
    let Accepted {
        stream,
        peer_addr,
        id,
    } = accepted;

    let service = service_fn(move |req| {
        let dispatcher = dispatcher.clone();
        async move {
            Ok::<_, Infallible>(handle_request(&dispatcher, req, intake, id).await)
        }
    });

    // Without a timer hyper never enforces the header read timeout.
    let conn = http1::Builder::new()
        .timer(TokioTimer::new())
        .header_read_timeout(intake.read_timeout)
        .serve_connection(TokioIo::new(stream), service);
    let mut conn = std::pin::pin!(conn);

    // Finish the request in progress, then close instead of keeping alive.
    let mut draining = !state_rx.borrow_and_update().is_accepting();
    if draining {
        conn.as_mut().graceful_shutdown();
    }

    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(connection_id = %id, peer_addr = %peer_addr, error = %e, "Connection error");
                }
                break;
            }
            changed = state_rx.changed(), if !draining => {
                if changed.is_err() || !state_rx.borrow_and_update().is_accepting() {
                    draining = true;
                    conn.as_mut().graceful_shutdown();
                }
            }
        }
    }

    drop(guard);
}

async fn handle_request(
    dispatcher: &Dispatcher,
    req: hyper::Request<Incoming>,
    intake: Intake,
    connection_id: ConnectionId,
) -> hyper::Response<Full<Bytes>> {
    let started = Instant::now();
    let method = req.method().clone();

    let read = Request::from_hyper(req, intake.max_body_bytes, intake.read_timeout);
    let request = match read.await {
        Ok(request) => request,
        Err(e) => {
            let request_id = RequestId::generate();
            tracing::warn!(
                request_id = %request_id,
                connection_id = %connection_id,
                error = %e,
                "Rejecting unreadable request"
            );
            return reject(&e, &method, started).into_hyper(&request_id);
        }
    };

    let request_id = request.id().clone();
    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        connection_id = %connection_id,
        method = %request.method(),
        path = %request.path(),
    );

    dispatcher
        .dispatch(request)
        .instrument(span)
        .await
        .into_hyper(&request_id)
}

/// Response for a request that could not be read. Counted like any other
/// completed request.
fn reject(error: &RequestError, method: &Method, started: Instant) -> Response {
    let response = match error {
        RequestError::BodyTooLarge { .. } => Response::payload_too_large(),
        RequestError::ReadTimeout { .. } => Response::request_timeout(),
        RequestError::Body(_) => Response::bad_request(),
    };
    metrics::record_request(method.as_str(), response.status().as_u16(), started);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::metrics::testing::CapturingRecorder;
    use hyper::StatusCode;

    #[test]
    fn rejected_requests_are_counted() {
        let recorder = CapturingRecorder::default();

        let statuses = ::metrics::with_local_recorder(&recorder, || {
            [
                RequestError::BodyTooLarge { limit: 4 },
                RequestError::ReadTimeout {
                    timeout: Duration::from_millis(10),
                },
                RequestError::Body("connection reset".into()),
            ]
            .iter()
            .map(|e| reject(e, &Method::POST, Instant::now()).status())
            .collect::<Vec<_>>()
        });

        assert_eq!(
            statuses,
            vec![
                StatusCode::PAYLOAD_TOO_LARGE,
                StatusCode::REQUEST_TIMEOUT,
                StatusCode::BAD_REQUEST
            ]
        );
        for status in ["413", "408", "400"] {
            assert_eq!(
                recorder.counter_total(
                    "dispatchd_requests_total",
                    &[("method", "POST"), ("status", status)]
                ),
                1,
                "status {status}"
            );
        }
    }

    #[tokio::test]
    async fn start_keeps_config_and_rejects_bad_host() {
        let mut config = ServerConfig::default();
        config.listener.host = "not-an-ip".into();
        let server = HttpServer::new(config);
        assert_eq!(server.config().listener.host, "not-an-ip");

        let err = server.start().await.unwrap_err();
        assert!(matches!(err, ServerError::InvalidAddress(_)));
    }
}
