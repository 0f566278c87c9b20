//! TCP connection acceptor.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Accept incoming TCP connections while the server is Running
//! - Refuse to accept once the server is Draining or Stopped
//! - Count every accepted connection

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};

use crate::lifecycle::{Lifecycle, ServerState};
use crate::net::connection::ConnectionId;
use crate::observability::metrics;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// Failed to accept connection.
    #[error("failed to accept: {0}")]
    Accept(#[source] std::io::Error),
    /// `accept` called after the server left the Running state.
    #[error("accept called after shutdown (state: {0})")]
    AcceptAfterShutdown(ServerState),
}

/// An accepted connection.
#[derive(Debug)]
pub struct Accepted {
    pub stream: TcpStream,
    pub peer_addr: SocketAddr,
    pub id: ConnectionId,
}

/// Accepts connections only while the lifecycle is Running.
#[derive(Debug)]
pub struct Acceptor {
    inner: TcpListener,
    local_addr: SocketAddr,
    lifecycle: Lifecycle,
    accepted: Arc<AtomicU64>,
}

impl Acceptor {
    /// Bind to `addr`. Every accepted connection increments `accepted`.
    pub async fn listen(
        addr: SocketAddr,
        lifecycle: Lifecycle,
        accepted: Arc<AtomicU64>,
    ) -> Result<Self, ListenerError> {
        let bind_err = |source| ListenerError::Bind { addr, source };

        let listener = TcpListener::bind(addr).await.map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;

        tracing::info!(address = %local_addr, "Listener bound");

        Ok(Self {
            inner: listener,
            local_addr,
            lifecycle,
            accepted,
        })
    }

    /// Accept the next connection.
    ///
    /// Fails with [`ListenerError::AcceptAfterShutdown`] once the server is
    /// Draining. A connection that arrives while the state changes is
    /// dropped unserved.
    pub async fn accept(&self) -> Result<Accepted, ListenerError> {
        self.ensure_accepting()?;

        let (stream, peer_addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        if let Err(e) = self.ensure_accepting() {
            tracing::debug!(peer_addr = %peer_addr, "Dropping connection that raced shutdown");
            drop(stream);
            return Err(e);
        }

        let total = self.accepted.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::record_connection_accepted();
        let id = ConnectionId::new();

        tracing::debug!(
            connection_id = %id,
            peer_addr = %peer_addr,
            accepted_total = total,
            "Connection accepted"
        );

        Ok(Accepted {
            stream,
            peer_addr,
            id,
        })
    }

    fn ensure_accepting(&self) -> Result<(), ListenerError> {
        let state = self.lifecycle.state();
        if state.is_accepting() {
            Ok(())
        } else {
            Err(ListenerError::AcceptAfterShutdown(state))
        }
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Total connections accepted so far.
    pub fn accepted_total(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn accepts_and_counts_while_running() {
        let lifecycle = Lifecycle::new();
        lifecycle.transition(ServerState::Starting, ServerState::Running);
        let acceptor = Acceptor::listen(loopback(), lifecycle, Arc::default()).await.unwrap();
        let addr = acceptor.local_addr();

        let client = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let accepted = acceptor.accept().await.unwrap();
        let _client = client.await.unwrap();

        assert_eq!(accepted.peer_addr.ip(), addr.ip());
        assert_eq!(acceptor.accepted_total(), 1);
    }

    #[tokio::test]
    async fn accept_after_shutdown_fails() {
        let lifecycle = Lifecycle::new();
        lifecycle.transition(ServerState::Starting, ServerState::Running);
        let acceptor = Acceptor::listen(loopback(), lifecycle.clone(), Arc::default()).await.unwrap();

        lifecycle.transition(ServerState::Running, ServerState::Draining);

        let err = acceptor.accept().await.unwrap_err();
        assert!(matches!(
            err,
            ListenerError::AcceptAfterShutdown(ServerState::Draining)
        ));
        assert_eq!(acceptor.accepted_total(), 0);
    }

    #[tokio::test]
    async fn bind_conflict_is_bind_error() {
        let lifecycle = Lifecycle::new();
        let first = Acceptor::listen(loopback(), lifecycle.clone(), Arc::default()).await.unwrap();

        let err = Acceptor::listen(first.local_addr(), lifecycle, Arc::default()).await.unwrap_err();
        assert!(matches!(err, ListenerError::Bind { .. }));
    }
}
