//! Request dispatch.
//!
//! # Responsibilities
//! - Look up the route for a request (404 without touching the pool)
//! - Borrow a worker slot for the handler's run (503 when saturated)
//! - Run the handler in its own task under the handler timeout
//! - Turn every per-request failure into a response
//!
//! # Outcomes
//! ```text
//! handler returns Ok      → its response, slot released
//! handler returns Err     → 500, slot released, HandlerError event
//! handler panics          → 500, slot released, HandlerError event
//! handler exceeds timeout → handler aborted, slot released, 504,
//!                           HandlerTimeout event
//! no slot within timeout  → 503, PoolSaturated event
//! pool closed (draining)  → 503
//! ```
//!
//! # Design Decisions
//! - Handlers run in separate tasks so a panic cannot unwind into the
//!   connection task
//! - The handler task is aborted when the dispatch future is dropped, so a
//!   forcibly terminated connection takes its handler with it
//! - Cancellation is cooperative: an aborted handler stops at its next await

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use crate::http::handler::HandlerResult;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::observability::{metrics, Event, EventKind, EventSink};
use crate::routing::RouteTable;
use crate::worker::{PoolError, WorkerPool};

/// Routes requests to handlers under the worker pool and handler timeout.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    routes: Arc<RouteTable>,
    pool: WorkerPool,
    handler_timeout: Duration,
    events: Arc<dyn EventSink>,
}

impl Dispatcher {
    pub fn new(
        routes: Arc<RouteTable>,
        pool: WorkerPool,
        handler_timeout: Duration,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            routes,
            pool,
            handler_timeout,
            events,
        }
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn handler_timeout(&self) -> Duration {
        self.handler_timeout
    }

    /// Dispatch one request. Never fails; errors become responses.
    pub async fn dispatch(&self, request: Request) -> Response {
        let received_at = request.received_at();
        let method = request.method().clone();

        let response = self.route_and_run(request).await;

        tracing::debug!(
            status = response.status().as_u16(),
            elapsed_ms = received_at.elapsed().as_millis() as u64,
            "Request completed"
        );
        metrics::record_request(method.as_str(), response.status().as_u16(), received_at);
        response
    }

    async fn route_and_run(&self, request: Request) -> Response {
        let Some(route) = self.routes.lookup(request.method(), request.path()) else {
            tracing::debug!(path = %request.path(), "No route matched");
            return Response::not_found();
        };

        let slot = match self.pool.acquire().await {
            Ok(slot) => slot,
            Err(PoolError::Saturated { waited }) => {
                self.events.log_event(
                    Event::new(EventKind::PoolSaturated)
                        .with("request_id", request.id())
                        .with("path", request.path())
                        .with("waited_ms", waited.as_millis())
                        .with("capacity", self.pool.capacity()),
                );
                return Response::service_unavailable();
            }
            Err(PoolError::Closed) => {
                tracing::debug!(path = %request.path(), "Worker pool closed; rejecting request");
                return Response::service_unavailable();
            }
        };

        let request_id = request.id().clone();
        let path = request.path().to_string();
        let handler = Arc::clone(route.handler());
        let started = Instant::now();

        let mut task = HandlerTask(tokio::spawn(async move { handler.call(request).await }));
        let outcome = tokio::time::timeout(self.handler_timeout, &mut task.0).await;

        match outcome {
            Ok(Ok(Ok(response))) => {
                self.pool.release(&slot);
                response
            }
            Ok(Ok(Err(error))) => {
                self.pool.release(&slot);
                self.events.log_event(
                    Event::new(EventKind::HandlerError)
                        .with("request_id", &request_id)
                        .with("path", &path)
                        .with("error", error.detail()),
                );
                Response::internal_error()
            }
            Ok(Err(join_error)) => {
                self.pool.release(&slot);
                let detail = if join_error.is_panic() {
                    format!("handler panicked: {}", panic_message(join_error.into_panic()))
                } else {
                    "handler task cancelled".to_string()
                };
                self.events.log_event(
                    Event::new(EventKind::HandlerError)
                        .with("request_id", &request_id)
                        .with("path", &path)
                        .with("error", detail),
                );
                Response::internal_error()
            }
            Err(_elapsed) => {
                // Abort first so the late result can never be observed.
                task.0.abort();
                self.pool.release(&slot);
                self.events.log_event(
                    Event::new(EventKind::HandlerTimeout)
                        .with("request_id", &request_id)
                        .with("path", &path)
                        .with("timeout_ms", self.handler_timeout.as_millis())
                        .with("elapsed_ms", started.elapsed().as_millis()),
                );
                Response::gateway_timeout()
            }
        }
    }
}

/// Aborts the handler task when dropped.
struct HandlerTask(JoinHandle<HandlerResult>);

impl Drop for HandlerTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
