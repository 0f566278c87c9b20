//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dispatchd::config::ServerConfig;
use dispatchd::http::{HandlerResult, HttpServer, Request, Response, ServerHandle};
use dispatchd::observability::RecordingEventSink;
use hyper::StatusCode;

/// Config bound to an ephemeral loopback port.
pub fn test_config(workers: usize, handler_ms: u64) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.host = "127.0.0.1".into();
    config.listener.port = 0;
    config.workers.capacity = workers;
    config.workers.acquire_timeout_ms = 200;
    config.timeouts.handler_ms = handler_ms;
    config.timeouts.drain_ms = 2_000;
    config
}

/// Server wired to an in-memory event sink.
pub fn test_server(config: ServerConfig) -> (HttpServer, RecordingEventSink) {
    let events = RecordingEventSink::new();
    let server = HttpServer::new(config).with_event_sink(Arc::new(events.clone()));
    (server, events)
}

pub async fn start(server: HttpServer) -> ServerHandle {
    server.start().await.expect("server failed to start")
}

/// Handler that sleeps, then answers 200 with `body`.
pub fn sleeping(
    delay: Duration,
    body: &'static str,
) -> impl Fn(Request) -> std::pin::Pin<Box<dyn Future<Output = HandlerResult> + Send>>
       + Send
       + Sync
       + 'static {
    move |_req: Request| {
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            HandlerResult::Ok(Response::text(StatusCode::OK, body))
        })
    }
}

/// Handler that answers 200 with `body` immediately.
pub fn fixed(
    body: &'static str,
) -> impl Fn(Request) -> std::pin::Pin<Box<dyn Future<Output = HandlerResult> + Send>>
       + Send
       + Sync
       + 'static {
    sleeping(Duration::ZERO, body)
}

/// Client that opens a fresh connection per request.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

pub fn url(handle: &ServerHandle, path: &str) -> String {
    format!("http://{}{}", handle.local_addr(), path)
}

/// Poll `check` every few milliseconds until it holds or `within` passes.
pub async fn wait_until(within: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}

/// Await every spawned task, in order.
pub async fn join_all<T>(handles: Vec<tokio::task::JoinHandle<T>>) -> Vec<T> {
    let mut out = Vec::with_capacity(handles.len());
    for handle in handles {
        out.push(handle.await.unwrap());
    }
    out
}
